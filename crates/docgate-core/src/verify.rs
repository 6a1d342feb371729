//! Answer verification and report parsing.
//!
//! The verifier asks the model for a fixed four-field layout:
//!
//! ```text
//! Supported: YES/NO
//! Unsupported Claims: [items]
//! Contradictions: [items]
//! Relevant: YES/NO
//! ```
//!
//! Parsing is tolerant of casing, whitespace, markdown emphasis and bullets,
//! but never guesses. A reply without `Supported` and `Relevant` fails with
//! [`Error::UnparsableVerification`] carrying the raw text.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::completion::{complete_with_retry, strip_think, CompletionOptions, CompletionProvider};
use crate::error::{Error, Result};
use crate::models::{Answer, VerificationReport};
use crate::prompts::{self, PASSAGE_SEPARATOR};

/// Checks a drafted answer against its context.
pub struct Verifier {
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
}

impl Verifier {
    pub fn new(provider: Arc<dyn CompletionProvider>, options: CompletionOptions) -> Self {
        Self { provider, options }
    }

    /// Verify `answer` against the context it was drafted from.
    pub async fn verify(&self, question: &str, answer: &Answer) -> Result<VerificationReport> {
        let context = answer
            .context
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR);

        let prompt = prompts::verify(question, &answer.text, &context);
        let raw = complete_with_retry(self.provider.as_ref(), &prompt, &self.options).await?;
        let report = parse_verification(&raw)?;
        debug!(
            supported = report.supported,
            relevant = report.relevant,
            unsupported = report.unsupported_claims.len(),
            contradictions = report.contradictions.len(),
            "verification parsed"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Supported,
    UnsupportedClaims,
    Contradictions,
    Relevant,
}

impl Field {
    fn from_key(key: &str) -> Option<Self> {
        let key = key
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        match key.as_str() {
            "supported" => Some(Field::Supported),
            "unsupported claims" | "unsupported claim" => Some(Field::UnsupportedClaims),
            "contradictions" | "contradiction" => Some(Field::Contradictions),
            "relevant" => Some(Field::Relevant),
            _ => None,
        }
    }
}

/// Strip markdown emphasis and leading bullet markers from a line.
fn clean_line(line: &str) -> String {
    let line = line.replace("**", "").replace("__", "");
    let mut s = line.trim();
    loop {
        let before = s;
        s = s
            .trim_start_matches(['-', '*', '•', '>'])
            .trim_start();
        let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && s[digits..].starts_with(['.', ')']) {
            s = s[digits + 1..].trim_start();
        }
        if s == before {
            break;
        }
    }
    s.to_string()
}

/// `Some((field, value))` when `line` starts a known field.
fn split_field(line: &str) -> Option<(Field, String)> {
    let (key, value) = line.split_once(':')?;
    let field = Field::from_key(key)?;
    Some((field, value.trim().to_string()))
}

/// Exactly one of YES/NO/TRUE/FALSE. Anything else, including the
/// `YES/NO` placeholder, leaves the field unset.
fn parse_flag(value: &str) -> Option<bool> {
    let word = value
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '.' | '"' | '\''))
        .to_uppercase();
    match word.as_str() {
        "YES" | "TRUE" => Some(true),
        "NO" | "FALSE" => Some(false),
        _ => None,
    }
}

fn is_empty_marker(item: &str) -> bool {
    matches!(
        item.to_lowercase().as_str(),
        "" | "none" | "n/a" | "na" | "nil" | "[]" | "-" | "no" | "none." | "nothing"
            // placeholder from the requested layout
            | "items"
    )
}

fn push_items(value: &str, out: &mut BTreeSet<String>) {
    let value = value.trim();
    let bracketed = value.starts_with('[') && value.ends_with(']');
    let inner = if bracketed {
        &value[1..value.len() - 1]
    } else {
        value
    };

    let parts: Vec<&str> = if inner.contains(';') {
        inner.split(';').collect()
    } else if bracketed {
        inner.split(',').collect()
    } else {
        vec![inner]
    };

    for part in parts {
        let item = part
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'')
            .trim();
        if !is_empty_marker(item) {
            out.insert(item.to_string());
        }
    }
}

/// Parse a verifier reply into a [`VerificationReport`].
pub fn parse_verification(raw: &str) -> Result<VerificationReport> {
    let text = strip_think(raw);

    let mut supported = None;
    let mut relevant = None;
    let mut unsupported = BTreeSet::new();
    let mut contradictions = BTreeSet::new();
    let mut current: Option<Field> = None;

    for line in text.lines() {
        let cleaned = clean_line(line);
        if cleaned.is_empty() {
            continue;
        }

        if let Some((field, value)) = split_field(&cleaned) {
            current = Some(field);
            match field {
                Field::Supported => supported = supported.or(parse_flag(&value)),
                Field::Relevant => relevant = relevant.or(parse_flag(&value)),
                Field::UnsupportedClaims => push_items(&value, &mut unsupported),
                Field::Contradictions => push_items(&value, &mut contradictions),
            }
            continue;
        }

        // Continuation lines belong to the most recent list field.
        match current {
            Some(Field::UnsupportedClaims) => push_items(&cleaned, &mut unsupported),
            Some(Field::Contradictions) => push_items(&cleaned, &mut contradictions),
            _ => {}
        }
    }

    match (supported, relevant) {
        (Some(supported), Some(relevant)) => Ok(VerificationReport {
            supported,
            unsupported_claims: unsupported,
            contradictions,
            relevant,
        }),
        _ => Err(Error::UnparsableVerification {
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_layout() {
        let report = parse_verification(
            "Supported: YES\nUnsupported Claims: []\nContradictions: []\nRelevant: YES",
        )
        .unwrap();
        assert!(report.supported);
        assert!(report.relevant);
        assert!(report.unsupported_claims.is_empty());
        assert!(report.contradictions.is_empty());
        assert!(report.is_acceptable());
    }

    #[test]
    fn test_parse_tolerates_markdown_and_casing() {
        let raw = "<think>checking</think>\n\
                   - **supported:** no\n\
                   - **Unsupported  Claims:** [Toronto is the capital, it has 9 million people]\n\
                   - **contradictions:** None\n\
                   - **RELEVANT:** Yes.";
        let report = parse_verification(raw).unwrap();
        assert!(!report.supported);
        assert!(report.relevant);
        assert_eq!(report.unsupported_claims.len(), 2);
        assert!(report.unsupported_claims.contains("Toronto is the capital"));
        assert!(report.contradictions.is_empty());
        assert!(!report.is_acceptable());
    }

    #[test]
    fn test_parse_bullet_lists_and_semicolons() {
        let raw = "Supported: NO\n\
                   Unsupported Claims:\n\
                   * founded in 1850\n\
                   * largest city\n\
                   Contradictions: population is 2M; river is the Thames\n\
                   Relevant: NO";
        let report = parse_verification(raw).unwrap();
        assert_eq!(
            report.unsupported_claims.iter().cloned().collect::<Vec<_>>(),
            vec!["founded in 1850", "largest city"]
        );
        assert_eq!(report.contradictions.len(), 2);
        assert!(report.contradictions.contains("river is the Thames"));
        assert!(!report.relevant);
    }

    #[test]
    fn test_missing_fields_is_unparsable() {
        let err = parse_verification("The answer looks right to me.").unwrap_err();
        match err {
            Error::UnparsableVerification { raw } => {
                assert_eq!(raw, "The answer looks right to me.")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_verification("Supported: YES\nContradictions: []").is_err());
        assert!(parse_verification("Supported: maybe\nRelevant: YES").is_err());
        assert!(parse_verification("Supported: YES or NO\nRelevant: YES").is_err());
        assert!(parse_verification("Supported: yes, mostly\nRelevant: YES").is_err());
    }

    #[test]
    fn test_unsupported_claims_key_is_not_supported() {
        let report =
            parse_verification("Unsupported Claims: [x]\nSupported: YES\nRelevant: YES").unwrap();
        assert!(report.supported);
        assert!(report.unsupported_claims.contains("x"));
    }

    #[test]
    fn test_echoed_layout_is_unparsable() {
        let echo = "Supported: YES/NO\nUnsupported Claims: [items]\nContradictions: [items]\nRelevant: YES/NO";
        match parse_verification(echo) {
            Err(Error::UnparsableVerification { raw }) => assert_eq!(raw, echo),
            other => panic!("expected unparsable, got {:?}", other),
        }
    }

    #[test]
    fn test_flag_accepts_only_exact_words() {
        assert_eq!(parse_flag(" **Yes.** "), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("YES/NO"), None);
        assert_eq!(parse_flag("NO - unsupported"), None);
        let mut items = BTreeSet::new();
        push_items("[items]", &mut items);
        assert!(items.is_empty());
    }
}
