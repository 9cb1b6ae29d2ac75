//! Locating an answer inside its context and marking it.

use serde::{Deserialize, Serialize};

/// Strings wrapped around the matched answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightMarkers {
    /// Inserted before the answer.
    pub open: String,
    /// Inserted after the answer.
    pub close: String,
}

impl Default for HighlightMarkers {
    fn default() -> Self {
        Self { open: "<mark>".to_string(), close: "</mark>".to_string() }
    }
}

/// A context snippet around the answer, with the answer marked.
///
/// All offsets are character positions in the context string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// The window text with the matched answer wrapped in markers.
    pub snippet: String,
    /// First character of the window.
    pub window_start: usize,
    /// One past the last character of the window.
    pub window_end: usize,
    /// First character of the matched answer.
    pub match_start: usize,
    /// One past the last character of the matched answer.
    pub match_end: usize,
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Find the first case-insensitive occurrence of `answer` in `context`.
///
/// Returns the `(start, end)` character range of the match.
pub fn find_ignore_case(context: &str, answer: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = answer.chars().collect();
    if needle.is_empty() {
        return None;
    }
    let haystack: Vec<char> = context.chars().collect();
    if needle.len() > haystack.len() {
        return None;
    }

    (0..=haystack.len() - needle.len())
        .find(|&start| {
            haystack[start..start + needle.len()]
                .iter()
                .zip(&needle)
                .all(|(a, b)| chars_eq_ignore_case(*a, *b))
        })
        .map(|start| (start, start + needle.len()))
}

/// Build a [`Highlight`] for `answer`, keeping `window` characters on each side.
///
/// The window is clamped to the context bounds. The marked text is the
/// context's own spelling of the match. Returns `None` when the answer does
/// not occur in the context.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::highlight::{highlight, HighlightMarkers};
///
/// let h = highlight("The answer is 42.", "42", 5, &HighlightMarkers::default()).unwrap();
/// assert_eq!(h.snippet, "r is <mark>42</mark>.");
/// ```
pub fn highlight(
    context: &str,
    answer: &str,
    window: usize,
    markers: &HighlightMarkers,
) -> Option<Highlight> {
    let (match_start, match_end) = find_ignore_case(context, answer)?;
    let chars: Vec<char> = context.chars().collect();
    let window_start = match_start.saturating_sub(window);
    let window_end = (match_end + window).min(chars.len());

    let mut snippet = String::with_capacity(
        (window_end - window_start) * 4 + markers.open.len() + markers.close.len(),
    );
    snippet.extend(&chars[window_start..match_start]);
    snippet.push_str(&markers.open);
    snippet.extend(&chars[match_start..match_end]);
    snippet.push_str(&markers.close);
    snippet.extend(&chars[match_end..window_end]);

    Some(Highlight { snippet, window_start, window_end, match_start, match_end })
}
