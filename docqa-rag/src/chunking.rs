//! Text chunking strategies.
//!
//! [`ChunkingStrategy`] is a closed set of strategies, each carrying its own
//! parameters, dispatched through a single [`ChunkingStrategy::chunk`] entry point:
//!
//! - `FixedWithOverlap`: fixed character windows advancing by `chunk_size - overlap`
//! - `FixedWithoutOverlap`: contiguous, non-overlapping tiling
//! - `Semantic`: delegated to a [`TextSplitter`], by default [`RecursiveSplitter`]
//!
//! All sizes and offsets are counted in characters, not bytes.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::ChunkSpan;
use crate::error::{DocQaError, Result};

/// Splits text into pieces without tracking their positions.
///
/// This is the seam for semantic chunking: the fixed strategies are
/// implemented here, anything smarter plugs in behind this trait.
pub trait TextSplitter: Send + Sync {
    /// Split `text` into ordered pieces. Empty text yields no pieces.
    fn split(&self, text: &str) -> Result<Vec<String>>;
}

/// The name of a chunking strategy, as stored in settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategyKind {
    /// Fixed-size chunks with overlap.
    FixedWithOverlap,
    /// Fixed-size chunks without overlap.
    FixedWithoutOverlap,
    /// Recursive separator-based splitting.
    Semantic,
}

impl ChunkingStrategyKind {
    /// All strategy kinds, in the order they are offered to users.
    pub const ALL: [ChunkingStrategyKind; 3] =
        [Self::FixedWithOverlap, Self::FixedWithoutOverlap, Self::Semantic];

    /// The machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedWithOverlap => "fixed_with_overlap",
            Self::FixedWithoutOverlap => "fixed_without_overlap",
            Self::Semantic => "semantic",
        }
    }

    /// The human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FixedWithOverlap => "Fixed Size with Overlap",
            Self::FixedWithoutOverlap => "Fixed Size without Overlap",
            Self::Semantic => "Semantic Chunking",
        }
    }
}

impl fmt::Display for ChunkingStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkingStrategyKind {
    type Err = DocQaError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str().eq_ignore_ascii_case(wanted) || kind.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| DocQaError::Config(format!("unknown chunking strategy '{s}'")))
    }
}

/// A chunking strategy together with its parameters.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::ChunkingStrategy;
///
/// let strategy = ChunkingStrategy::FixedWithOverlap { chunk_size: 1000, overlap: 200 };
/// let spans = strategy.chunk(&text)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Windows of `chunk_size` characters whose starts advance by `chunk_size - overlap`.
    FixedWithOverlap {
        /// Maximum characters per chunk.
        chunk_size: usize,
        /// Characters shared between consecutive chunks.
        overlap: usize,
    },
    /// Contiguous windows of `chunk_size` characters.
    FixedWithoutOverlap {
        /// Maximum characters per chunk.
        chunk_size: usize,
    },
    /// Paragraph, sentence, then word splitting via [`RecursiveSplitter`].
    Semantic {
        /// Maximum characters per chunk.
        chunk_size: usize,
        /// Characters carried over between consecutive chunks.
        chunk_overlap: usize,
    },
}

impl ChunkingStrategy {
    /// The strategy name.
    pub fn kind(&self) -> ChunkingStrategyKind {
        match self {
            Self::FixedWithOverlap { .. } => ChunkingStrategyKind::FixedWithOverlap,
            Self::FixedWithoutOverlap { .. } => ChunkingStrategyKind::FixedWithoutOverlap,
            Self::Semantic { .. } => ChunkingStrategyKind::Semantic,
        }
    }

    /// Check that the parameters cannot produce an endless loop.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Chunking`] if `chunk_size` is zero or the overlap
    /// is not smaller than `chunk_size`.
    pub fn validate(&self) -> Result<()> {
        let (chunk_size, overlap) = match *self {
            Self::FixedWithOverlap { chunk_size, overlap } => (chunk_size, overlap),
            Self::FixedWithoutOverlap { chunk_size } => (chunk_size, 0),
            Self::Semantic { chunk_size, chunk_overlap } => (chunk_size, chunk_overlap),
        };
        if chunk_size == 0 {
            return Err(DocQaError::Chunking("chunk_size must be greater than zero".to_string()));
        }
        if overlap >= chunk_size {
            return Err(DocQaError::Chunking(format!(
                "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(())
    }

    /// Split `text` into ordered chunk spans.
    ///
    /// Empty text yields an empty `Vec`. The position of a span in the result
    /// is its chunk sequence index.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Chunking`] if the parameters are invalid.
    pub fn chunk(&self, text: &str) -> Result<Vec<ChunkSpan>> {
        match *self {
            Self::Semantic { chunk_size, chunk_overlap } => {
                self.chunk_with(text, &RecursiveSplitter::new(chunk_size, chunk_overlap))
            }
            _ => self.chunk_with(text, &NoSplitter),
        }
    }

    /// Like [`chunk`](Self::chunk), but semantic chunking is delegated to `splitter`.
    ///
    /// The fixed strategies ignore `splitter`.
    pub fn chunk_with(&self, text: &str, splitter: &dyn TextSplitter) -> Result<Vec<ChunkSpan>> {
        self.validate()?;
        if text.is_empty() {
            return Ok(Vec::new());
        }

        match *self {
            Self::FixedWithOverlap { chunk_size, overlap } => {
                Ok(fixed_spans(text, chunk_size, chunk_size - overlap))
            }
            Self::FixedWithoutOverlap { chunk_size } => Ok(fixed_spans(text, chunk_size, chunk_size)),
            Self::Semantic { .. } => Ok(splitter
                .split(text)?
                .into_iter()
                .map(|text| ChunkSpan { text, start: None, end: None })
                .collect()),
        }
    }
}

/// Placeholder handed to `chunk_with` by the fixed strategies.
struct NoSplitter;

impl TextSplitter for NoSplitter {
    fn split(&self, _text: &str) -> Result<Vec<String>> {
        Err(DocQaError::Chunking("no text splitter configured".to_string()))
    }
}

/// Byte offset of every char boundary, including the end of the string.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Character windows `[start, start + chunk_size)` with `start` advancing by `step`.
///
/// `step` must be non-zero.
fn fixed_spans(text: &str, chunk_size: usize, step: usize) -> Vec<ChunkSpan> {
    debug_assert!(step > 0);
    let boundaries = char_boundaries(text);
    let len = boundaries.len() - 1;
    let mut spans = Vec::with_capacity(len.div_ceil(step));
    let mut start = 0;

    while start < len {
        let end = (start + chunk_size).min(len);
        spans.push(ChunkSpan {
            text: text[boundaries[start]..boundaries[end]].to_string(),
            start: Some(start),
            end: Some(end),
        });
        start += step;
    }

    spans
}

/// Splits text hierarchically: paragraphs → sentences → words → characters.
///
/// Segments are merged greedily up to `chunk_size` characters. When a chunk is
/// emitted, trailing segments totalling at most `chunk_overlap` characters are
/// carried into the next chunk. A segment that alone exceeds `chunk_size` is
/// split with the next separator, and finally by character windows.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{RecursiveSplitter, TextSplitter};
///
/// let splitter = RecursiveSplitter::new(500, 50);
/// let pieces = splitter.split(&text)?;
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Separators tried in order.
    pub const DEFAULT_SEPARATORS: [&'static str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

    /// Create a new `RecursiveSplitter`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters carried over between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: Self::DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the separator hierarchy. Empty separators are dropped.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect();
        self
    }

    fn split_level(&self, text: &str, level: usize) -> Vec<String> {
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }
        let Some(separator) = self.separators.get(level) else {
            let step = self.chunk_size - self.chunk_overlap;
            return fixed_spans(text, self.chunk_size, step).into_iter().map(|s| s.text).collect();
        };

        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut window_len = 0;

        for segment in split_keeping_separator(text, separator) {
            let segment_len = char_len(segment);

            if segment_len > self.chunk_size {
                if !window.is_empty() {
                    chunks.push(window.iter().copied().collect::<String>());
                    window.clear();
                    window_len = 0;
                }
                chunks.extend(self.split_level(segment, level + 1));
                continue;
            }

            if window_len + segment_len > self.chunk_size && !window.is_empty() {
                chunks.push(window.iter().copied().collect::<String>());
                while let Some(front) = window.front() {
                    if window_len <= self.chunk_overlap && window_len + segment_len <= self.chunk_size
                    {
                        break;
                    }
                    window_len -= char_len(front);
                    window.pop_front();
                }
            }

            window.push_back(segment);
            window_len += segment_len;
        }

        if !window.is_empty() {
            chunks.push(window.iter().copied().collect::<String>());
        }

        chunks
    }
}

impl TextSplitter for RecursiveSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(DocQaError::Chunking(format!(
                "invalid splitter parameters: chunk_size={}, chunk_overlap={}",
                self.chunk_size, self.chunk_overlap
            )));
        }

        Ok(self
            .split_level(text, 0)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect())
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return vec![text];
    }

    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(spans: &[ChunkSpan]) -> Vec<&str> {
        spans.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn fixed_with_overlap_reports_offsets() {
        let strategy = ChunkingStrategy::FixedWithOverlap { chunk_size: 4, overlap: 1 };
        let spans = strategy.chunk("abcdefghij").unwrap();
        assert_eq!(texts(&spans), vec!["abcd", "defg", "ghij", "j"]);
        assert_eq!(spans[1].start, Some(3));
        assert_eq!(spans[1].end, Some(7));
        assert_eq!(spans[3].end, Some(10));
    }

    #[test]
    fn fixed_without_overlap_tiles() {
        let strategy = ChunkingStrategy::FixedWithoutOverlap { chunk_size: 3 };
        let spans = strategy.chunk("abcdefg").unwrap();
        assert_eq!(texts(&spans), vec!["abc", "def", "g"]);
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let strategy = ChunkingStrategy::FixedWithoutOverlap { chunk_size: 2 };
        let spans = strategy.chunk("héllo wörld").unwrap();
        let joined: String = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, "héllo wörld");
        assert_eq!(spans[0].text, "hé");
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let strategy = ChunkingStrategy::FixedWithOverlap { chunk_size: 5, overlap: 5 };
        assert!(matches!(strategy.chunk("some text"), Err(DocQaError::Chunking(_))));
        let strategy = ChunkingStrategy::FixedWithOverlap { chunk_size: 5, overlap: 9 };
        assert!(matches!(strategy.chunk(""), Err(DocQaError::Chunking(_))));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let strategy = ChunkingStrategy::FixedWithoutOverlap { chunk_size: 0 };
        assert!(strategy.chunk("abc").is_err());
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        for strategy in [
            ChunkingStrategy::FixedWithOverlap { chunk_size: 10, overlap: 2 },
            ChunkingStrategy::FixedWithoutOverlap { chunk_size: 10 },
            ChunkingStrategy::Semantic { chunk_size: 10, chunk_overlap: 2 },
        ] {
            assert!(strategy.chunk("").unwrap().is_empty());
        }
    }

    #[test]
    fn semantic_chunks_have_no_offsets() {
        let strategy = ChunkingStrategy::Semantic { chunk_size: 30, chunk_overlap: 0 };
        let text = "First paragraph here.\n\nSecond paragraph is here too.";
        let spans = strategy.chunk(text).unwrap();
        assert_eq!(texts(&spans), vec!["First paragraph here.", "Second paragraph is here too."]);
        assert!(spans.iter().all(|s| s.start.is_none() && s.end.is_none()));
    }

    #[test]
    fn recursive_splitter_respects_chunk_size() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let pieces = RecursiveSplitter::new(15, 0).split(text).unwrap();
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| p.chars().count() <= 15));
        assert_eq!(pieces.join(" "), text);
    }

    #[test]
    fn recursive_splitter_carries_overlap() {
        let text = "aaa bbb ccc ddd eee";
        let pieces = RecursiveSplitter::new(8, 4).split(text).unwrap();
        assert_eq!(pieces, vec!["aaa bbb", "bbb ccc", "ccc ddd", "ddd eee"]);
    }

    #[test]
    fn recursive_splitter_falls_back_to_characters() {
        let pieces = RecursiveSplitter::new(4, 0).split("abcdefghij").unwrap();
        assert_eq!(pieces, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn strategy_kind_parses_names_and_labels() {
        assert_eq!(
            "fixed_with_overlap".parse::<ChunkingStrategyKind>().unwrap(),
            ChunkingStrategyKind::FixedWithOverlap
        );
        assert_eq!(
            "Fixed Size without Overlap".parse::<ChunkingStrategyKind>().unwrap(),
            ChunkingStrategyKind::FixedWithoutOverlap
        );
        assert!("sliding".parse::<ChunkingStrategyKind>().is_err());
    }

    #[test]
    fn empty_separators_are_ignored() {
        let splitter = RecursiveSplitter::new(5, 0).with_separators([""]);
        assert_eq!(splitter.split("abcdefghijklmnop").unwrap(), vec!["abcde", "fghij", "klmno", "p"]);

        let splitter = RecursiveSplitter::new(6, 0).with_separators(["", " "]);
        assert_eq!(splitter.split("one two three").unwrap(), vec!["one", "two", "three"]);
    }

    #[test]
    fn empty_separator_yields_the_whole_text() {
        assert_eq!(split_keeping_separator("abc", ""), vec!["abc"]);
    }
}
