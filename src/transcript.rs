//! Video transcripts as a document source.
//!
//! A transcript file is a JSON array of `{ "text": ..., "start": ... }`
//! segments. Before chunking, segments are flattened into one line each:
//!
//! ```text
//! Text: never gonna give you up Start: 43.2
//! ```
//!
//! Entries missing either field are skipped.

use anyhow::{Context, Result};
use docgate_core::models::Document;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static VIDEO_ID: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"https://www\.youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})").ok()
});

/// One timed line of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    /// Offset into the video, in seconds.
    pub start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Extract the 11-character video id from a watch URL.
pub fn video_id(url: &str) -> Option<String> {
    VIDEO_ID
        .as_ref()?
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse segments from JSON, skipping malformed entries.
pub fn parse_segments(json: &str) -> Result<Vec<Segment>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(json).context("Transcript must be a JSON array of segments")?;
    let total = values.len();
    let segments: Vec<Segment> = values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if segments.len() < total {
        tracing::warn!(
            skipped = total - segments.len(),
            "skipped transcript entries without text/start"
        );
    }
    Ok(segments)
}

pub fn load_segments(path: &Path) -> Result<Vec<Segment>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
    parse_segments(&content)
}

/// Flatten segments into `Text: ... Start: ...` lines.
pub fn format_transcript(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| format!("Text: {} Start: {:?}\n", s.text, s.start))
        .collect()
}

/// The formatted transcript as a single document.
pub fn to_document(source_id: &str, segments: &[Segment]) -> Document {
    Document::new(source_id, format_transcript(segments))
}
