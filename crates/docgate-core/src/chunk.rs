//! Boundary-aware text chunker with overlap.
//!
//! Splits text into [`Chunk`]s of at most `size` characters, preferring to
//! cut at the largest structural boundary that fits inside the window.
//!
//! # Algorithm
//!
//! 1. Open a window of `size` characters at the current start offset.
//! 2. If the window reaches the end of the text, emit it and stop.
//! 3. Otherwise search the window for the last paragraph break (`\n\n`),
//!    then line break, then sentence end (`. `, `! `, `? `), then space.
//!    The first separator kind that yields a cut past `start + overlap`
//!    wins; without one, cut hard at the window end.
//! 4. Start the next window `overlap` characters before the cut, nudged
//!    forward to the next word start when one exists inside the overlap.
//!
//! Offsets count Unicode scalar values, so a cut never lands inside a
//! multi-byte character. Every character of the input belongs to at least
//! one chunk.
//!
//! # Example
//!
//! ```rust
//! use docgate_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("doc-1", "Hello world.\n\nSecond paragraph.", 20, 0).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].text, "Hello world.\n\n");
//! ```

use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

#[derive(Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

impl Boundary {
    /// Whether a cut placed just before `chars[pos]` ends on this boundary.
    fn ends_at(self, chars: &[char], pos: usize) -> bool {
        match self {
            Boundary::Paragraph => pos >= 2 && chars[pos - 1] == '\n' && chars[pos - 2] == '\n',
            Boundary::Line => pos >= 1 && chars[pos - 1] == '\n',
            Boundary::Sentence => {
                pos >= 2
                    && chars[pos - 1].is_whitespace()
                    && matches!(chars[pos - 2], '.' | '!' | '?')
            }
            Boundary::Word => pos >= 1 && chars[pos - 1] == ' ',
        }
    }
}

/// Validate chunking parameters: `size > 0` and `overlap < size`.
pub fn validate_params(size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::InvalidArgument(
            "chunk size must be greater than zero".to_string(),
        ));
    }
    if overlap >= size {
        return Err(Error::InvalidArgument(format!(
            "chunk overlap ({overlap}) must be less than chunk size ({size})"
        )));
    }
    Ok(())
}

/// Split a document into chunks.
pub fn chunk_document(doc: &Document, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    chunk_text(&doc.id, &doc.text, size, overlap)
}

/// Split `text` into overlapping chunks of at most `size` characters.
///
/// Returns an empty vector for empty or whitespace-only text.
///
/// # Errors
///
/// [`Error::InvalidArgument`] when `size == 0` or `overlap >= size`.
pub fn chunk_text(document_id: &str, text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    validate_params(size, overlap)?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < n {
        let window_end = (start + size).min(n);
        let end = if window_end == n {
            n
        } else {
            find_cut(&chars, start, window_end, overlap)
        };

        let piece: String = chars[start..end].iter().collect();
        chunks.push(Chunk::new(document_id, chunks.len(), start, end, &piece));

        if end == n {
            break;
        }
        start = next_start(&chars, start, end, overlap);
    }

    Ok(chunks)
}

/// Pick the cut position for the window `[start, window_end)`.
fn find_cut(chars: &[char], start: usize, window_end: usize, overlap: usize) -> usize {
    // A cut at or before `start + overlap` would not advance the next window.
    let min_cut = start + overlap + 1;
    for boundary in BOUNDARIES {
        let mut pos = window_end;
        while pos >= min_cut {
            if boundary.ends_at(chars, pos) {
                return pos;
            }
            pos -= 1;
        }
    }
    window_end
}

fn next_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }
    let candidate = end - overlap;
    let word_start = (candidate..end).find(|&i| i > 0 && chars[i - 1].is_whitespace() && !chars[i].is_whitespace());
    let next = word_start.unwrap_or(candidate);
    next.max(start + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(text: &str, chunks: &[Chunk], size: usize, overlap: usize) {
        let chars: Vec<char> = text.chars().collect();
        let mut covered = vec![false; chars.len()];
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(c.char_len() <= size, "chunk {} has {} chars", i, c.char_len());
            let expected: String = chars[c.start..c.end].iter().collect();
            assert_eq!(c.text, expected);
            for flag in covered.iter_mut().take(c.end).skip(c.start) {
                *flag = true;
            }
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].start <= pair[0].end, "gap between chunks");
            assert!(pair[0].end - pair[1].start <= overlap, "overlap too large");
            assert!(pair[1].start > pair[0].start, "no progress");
        }
        assert!(covered.iter().all(|c| *c), "uncovered characters");
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("doc1", "Hello, world!", 200, 20).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].end, 13);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("doc1", "", 10, 0).unwrap().is_empty());
        assert!(chunk_text("doc1", "  \n\n ", 10, 0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            chunk_text("doc1", "abc", 0, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            chunk_text("doc1", "abc", 5, 5),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            chunk_text("doc1", "abc", 5, 9),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let text = "First para here.\n\nSecond one. With two sentences.";
        let chunks = chunk_text("doc1", text, 30, 0).unwrap();
        assert_eq!(chunks[0].text, "First para here.\n\n");
        assert_covers(text, &chunks, 30, 0);
    }

    #[test]
    fn test_prefers_sentence_over_word() {
        let text = "One two three. Four five six seven eight";
        let chunks = chunk_text("doc1", text, 25, 0).unwrap();
        assert_eq!(chunks[0].text, "One two three. ");
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "a".repeat(50);
        let chunks = chunk_text("doc1", &text, 10, 3).unwrap();
        assert!(chunks.len() > 5);
        assert_covers(&text, &chunks, 10, 3);
    }

    #[test]
    fn test_overlap_starts_at_word() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = chunk_text("doc1", text, 20, 8).unwrap();
        assert_covers(text, &chunks, 20, 8);
        for c in chunks.iter().skip(1) {
            let first = c.text.chars().next().unwrap();
            assert!(!first.is_whitespace());
        }
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = chunk_text("doc1", text, 7, 2).unwrap();
        assert_covers(text, &chunks, 7, 2);
    }

    #[test]
    fn test_coverage_across_parameters() {
        let texts = [
            "Ottawa is the capital of Canada.",
            "Text: hello there Start: 0.0\nText: general kenobi Start: 1.5\nText: you are a bold one Start: 3.2\n",
            "Para one has words.\n\nPara two! Has more words? Yes.\n\n\n\nTrailing   spaces   here   ",
            "nospacesatallinthisverylongtokenthatkeepsgoing",
        ];
        for text in texts {
            for size in 1..=24 {
                for overlap in 0..size {
                    let chunks = chunk_text("doc", text, size, overlap).unwrap();
                    assert!(!chunks.is_empty());
                    assert_covers(text, &chunks, size, overlap);
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let c1 = chunk_text("doc1", text, 8, 2).unwrap();
        let c2 = chunk_text("doc1", text, 8, 2).unwrap();
        assert_eq!(c1, c2);
    }
}
