use anyhow::Result;
use docqa_rag::{QaSession, SourceFile};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use crate::render;

const HELP: &str = "\
Type a question, or one of:
  :load <path>...  ingest more files
  :settings        show the session settings
  :clear           discard every stored chunk
  :quit            exit";

enum Command<'a> {
    Ask(&'a str),
    Load(Vec<&'a str>),
    Settings,
    Clear,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse(line: &str) -> Command<'_> {
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Ask(line);
    };
    let mut words = rest.split_whitespace();
    match words.next() {
        Some("load") => Command::Load(words.collect()),
        Some("settings") => Command::Settings,
        Some("clear") => Command::Clear,
        Some("help") => Command::Help,
        Some("quit" | "q" | "exit") => Command::Quit,
        _ => Command::Unknown(line),
    }
}

/// Read questions until `:quit` or end of input.
pub async fn run(session: &QaSession) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("{HELP}");

    loop {
        let line = match editor.readline("question> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match parse(line) {
            Command::Ask(question) => match session.ask(question).await {
                Ok(outcome) => println!("{}", render::outcome(&outcome)),
                Err(e) => println!("{}", render::ask_error(&e)),
            },
            Command::Load(paths) if paths.is_empty() => println!("usage: :load <path>..."),
            Command::Load(paths) => {
                let mut files = Vec::with_capacity(paths.len());
                for path in paths {
                    match SourceFile::read(path) {
                        Ok(file) => files.push(file),
                        Err(e) => {
                            warn!(path, error = %e, "could not read file");
                            println!("✗ {e}");
                        }
                    }
                }
                let report = session.ingest_files(&files).await;
                println!("{}", render::ingest_report(&report));
            }
            Command::Settings => {
                for (key, value) in session.config().to_key_values()? {
                    println!("{key} = {value}");
                }
            }
            Command::Clear => {
                session.clear().await?;
                println!("Cleared. Use :load to ingest documents again.");
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Unknown(command) => println!("unknown command {command}, try :help"),
        }
    }
    Ok(())
}
