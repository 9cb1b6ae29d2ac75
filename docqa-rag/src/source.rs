//! Turning uploaded files into document text.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::document::Document;
use crate::error::{DocQaError, Result};

/// A file handed to the session for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// The file name, used as the document id.
    pub name: String,
    /// The raw file contents.
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Create a source file from a name and its contents.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }

    /// Read a file from disk, naming it after its file name.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = std::fs::read(path).map_err(|e| DocQaError::Ingestion {
            document: name.clone(),
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Ok(Self { name, bytes })
    }

    /// The lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name).extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Extracts the text of an uploaded file.
///
/// Extraction failures and files without text are reported as
/// [`DocQaError::Ingestion`] so only that file is skipped.
pub trait TextExtractor: Send + Sync {
    /// Extract the text of `file`.
    fn extract(&self, file: &SourceFile) -> Result<Document>;
}

/// Reads UTF-8 text files with an allow-listed extension.
#[derive(Debug, Clone)]
pub struct PlainTextExtractor {
    extensions: Vec<String>,
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self { extensions: vec!["txt".to_string(), "md".to_string()] }
    }
}

impl PlainTextExtractor {
    /// Create an extractor accepting `.txt` and `.md` files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted extensions (without the leading dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, file: &SourceFile) -> Result<Document> {
        let fail = |message: String| DocQaError::Ingestion { document: file.name.clone(), message };

        let supported = file.extension().is_some_and(|ext| self.extensions.contains(&ext));
        if !supported {
            return Err(fail(format!("unsupported file type for {}", file.name)));
        }

        let text = std::str::from_utf8(&file.bytes)
            .map_err(|e| fail(format!("file is not valid UTF-8: {e}")))?;
        if text.trim().is_empty() {
            return Err(fail(format!("no text could be extracted from {}", file.name)));
        }

        Ok(Document::new(file.name.clone(), text))
    }
}

/// Hands each file to the extractor registered for its extension.
///
/// The default set reads `.txt` and `.md` as plain text and, with the `pdf`
/// feature, `.pdf` through [`PdfTextExtractor`](crate::pdf::PdfTextExtractor).
#[derive(Clone)]
pub struct ExtractorSet {
    by_extension: IndexMap<String, Arc<dyn TextExtractor>>,
}

impl Default for ExtractorSet {
    fn default() -> Self {
        let plain: Arc<dyn TextExtractor> = Arc::new(PlainTextExtractor::new());
        let set = Self::empty().with("txt", Arc::clone(&plain)).with("md", plain);
        #[cfg(feature = "pdf")]
        let set = set.with("pdf", Arc::new(crate::pdf::PdfTextExtractor::new()));
        set
    }
}

impl ExtractorSet {
    /// The default set of extractors.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set that accepts nothing.
    pub fn empty() -> Self {
        Self { by_extension: IndexMap::new() }
    }

    /// Route `extension` (without the leading dot) to `extractor`, replacing
    /// any earlier registration.
    pub fn with(mut self, extension: impl Into<String>, extractor: Arc<dyn TextExtractor>) -> Self {
        let extension = extension.into().trim_start_matches('.').to_ascii_lowercase();
        self.by_extension.insert(extension, extractor);
        self
    }

    /// The accepted extensions, in registration order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.by_extension.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ExtractorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorSet").field("extensions", &self.by_extension.keys()).finish()
    }
}

impl TextExtractor for ExtractorSet {
    fn extract(&self, file: &SourceFile) -> Result<Document> {
        match file.extension().and_then(|ext| self.by_extension.get(&ext)) {
            Some(extractor) => extractor.extract(file),
            None => Err(DocQaError::Ingestion {
                document: file.name.clone(),
                message: format!("unsupported file type for {}", file.name),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_utf8_text() {
        let doc = PlainTextExtractor::new()
            .extract(&SourceFile::new("notes.TXT", "hello"))
            .unwrap();
        assert_eq!(doc, Document::new("notes.TXT", "hello"));
    }

    #[test]
    fn rejects_unsupported_extensions() {
        let err = PlainTextExtractor::new().extract(&SourceFile::new("scan.pdf", "x")).unwrap_err();
        assert!(matches!(err, DocQaError::Ingestion { document, .. } if document == "scan.pdf"));
    }

    #[test]
    fn rejects_blank_and_binary_files() {
        let extractor = PlainTextExtractor::new();
        assert!(extractor.extract(&SourceFile::new("blank.txt", " \n\t")).is_err());
        assert!(extractor.extract(&SourceFile::new("bin.txt", vec![0xff, 0xfe, 0x00])).is_err());
    }

    #[test]
    fn custom_extensions() {
        let extractor = PlainTextExtractor::new().with_extensions([".csv"]);
        assert!(extractor.extract(&SourceFile::new("data.csv", "a,b")).is_ok());
        assert!(extractor.extract(&SourceFile::new("notes.txt", "a")).is_err());
    }

    #[test]
    fn extractor_set_routes_by_extension() {
        let set = ExtractorSet::empty()
            .with(".CSV", Arc::new(PlainTextExtractor::new().with_extensions(["csv"])));
        assert_eq!(set.extensions().collect::<Vec<_>>(), vec!["csv"]);
        assert_eq!(set.extract(&SourceFile::new("a.csv", "x,y")).unwrap().text, "x,y");

        let err = set.extract(&SourceFile::new("notes", "text")).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn default_set_reads_plain_text() {
        let set = ExtractorSet::new();
        assert!(set.extract(&SourceFile::new("notes.md", "# title")).is_ok());
        assert!(set.extract(&SourceFile::new("slides.docx", "x")).is_err());
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn default_set_routes_pdf_files() {
        assert!(ExtractorSet::new().extensions().any(|ext| ext == "pdf"));
        let err = ExtractorSet::new().extract(&SourceFile::new("broken.pdf", "not a pdf")).unwrap_err();
        assert!(err.to_string().contains("failed to parse PDF"));
    }
}
