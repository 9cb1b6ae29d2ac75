//! Plain-text rendering of ingestion reports and answers.

use std::fmt::Write;

use docqa_rag::{DocQaError, IngestReport, QueryOutcome};

/// One line per stored or failed document, then a totals line.
pub fn ingest_report(report: &IngestReport) -> String {
    let mut out = String::new();
    for doc in &report.documents {
        let _ = write!(out, "✓ {}: {} chunks stored", doc.name, doc.stored);
        if !doc.dropped.is_empty() {
            let _ = write!(out, ", {} dropped", doc.dropped.len());
        }
        out.push('\n');
        for dropped in &doc.dropped {
            let _ = writeln!(out, "    chunk {}: {}", dropped.index, dropped.reason);
        }
    }
    for failure in &report.failures {
        let _ = writeln!(out, "✗ {}: {}", failure.name, failure.reason);
    }
    let _ = write!(
        out,
        "{} document(s) processed, {} chunk(s) stored",
        report.documents.len(),
        report.stored_chunks()
    );
    out
}

/// The answer with its confidence, highlighted context and sources, or the
/// low-confidence notice.
pub fn outcome(outcome: &QueryOutcome) -> String {
    let mut out = String::new();
    match outcome {
        QueryOutcome::Answered(answered) => {
            let _ = writeln!(out, "Answer: {}", answered.answer.text);
            let _ = writeln!(out, "Confidence: {:.2}", answered.answer.score);
            match &answered.highlight {
                Some(highlight) => {
                    let _ = writeln!(out, "Context: ...{}...", highlight.snippet);
                }
                None => out.push_str("Context: answer not found verbatim in the retrieved text\n"),
            }
            let sources: Vec<String> = answered.sources.iter().map(|s| s.id.to_string()).collect();
            let _ = write!(out, "Sources: {}", sources.join(", "));
            if !answered.degraded.is_empty() {
                let _ = write!(out, "\n({} chunk(s) could not be scored)", answered.degraded.len());
            }
        }
        QueryOutcome::LowConfidence { score, threshold, notice, .. } => {
            let _ = write!(out, "{notice}\n(confidence {score:.2} is below {threshold:.2})");
        }
    }
    out
}

/// A user-facing line for errors from [`QaSession::ask`](docqa_rag::QaSession::ask).
pub fn ask_error(error: &DocQaError) -> String {
    match error.precondition() {
        Some(missing) => {
            let mut message = missing.to_string();
            if let Some(first) = message.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            message
        }
        None => format!("Error: {error}"),
    }
}
