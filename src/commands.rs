//! CLI command implementations.

use anyhow::{bail, Context, Result};
use docgate_core::chunk::chunk_text;
use docgate_core::pipeline::{Mode, Outcome, PipelineRun};
use docgate_core::summarize::Summarizer;
use std::path::Path;

use crate::config::Config;
use crate::session::{Providers, Session};
use crate::sources::load_documents;
use crate::transcript;

/// Print the chunk boundaries of a file. Needs no providers.
pub fn run_chunk(path: &Path, size: usize, overlap: usize) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let chunks = chunk_text(&id, &text, size, overlap)?;

    println!("{:<6} {:>8} {:>8}  TEXT", "INDEX", "START", "END");
    for chunk in &chunks {
        println!(
            "{:<6} {:>8} {:>8}  {}",
            chunk.index,
            chunk.start,
            chunk.end,
            preview(&chunk.text, 60)
        );
    }
    println!("{} chunks", chunks.len());
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    path: &Path,
    question: &str,
    k: Option<usize>,
    lenient: bool,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(k) = k {
        config.retrieval.k = k;
    }
    if lenient {
        config.pipeline.mode = Mode::Lenient;
    }
    crate::config::validate(&config)?;

    let documents = load_documents(path, &config.sources)?;
    if documents.is_empty() {
        bail!("No documents found under {}", path.display());
    }

    let providers = Providers::from_config(&config)?;
    let session = Session::build(&config, &providers, documents).await?;
    let run = session.ask(question).await?;
    print_run(&run);
    Ok(())
}

/// Summarize a transcript (`.json`) or a plain text file.
pub async fn run_summarize(config: &Config, path: &Path) -> Result<()> {
    let text = if path.extension().is_some_and(|e| e == "json") {
        transcript::format_transcript(&transcript::load_segments(path)?)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    let provider = crate::completion::create_provider(&config.completion)?;
    let summarizer = Summarizer::new(provider, config.completion.options());
    println!("{}", summarizer.summarize(&text).await?);
    Ok(())
}

pub fn run_video_id(url: &str) -> Result<()> {
    match transcript::video_id(url) {
        Some(id) => {
            println!("{}", id);
            Ok(())
        }
        None => bail!("No video id found in URL: {}", url),
    }
}

fn print_run(run: &PipelineRun) {
    let states: Vec<String> = run
        .states
        .iter()
        .map(|s| format!("{:?}", s).to_uppercase())
        .collect();
    println!("states: {}", states.join(" -> "));
    if let Some(label) = run.label {
        println!("relevance: {}", label);
    }

    match &run.outcome {
        Outcome::Accepted { answer, .. } => {
            println!("outcome: accepted");
            println!("\n{}", answer.text);
        }
        Outcome::Rejected { answer, report } => {
            println!("outcome: rejected (supported={}, relevant={})", report.supported, report.relevant);
            println!("\n{}", answer.text);
            for claim in &report.unsupported_claims {
                println!("  unsupported: {}", claim);
            }
            for c in &report.contradictions {
                println!("  contradiction: {}", c);
            }
        }
        Outcome::Unverified { answer } => {
            println!("outcome: unverified (confidence: {:?})", answer.confidence);
            println!("\n{}", answer.text);
        }
        Outcome::Refused { reason } => {
            println!("outcome: refused ({:?})", reason);
        }
    }

    if let Some(answer) = run.outcome.answer() {
        println!("\nsources:");
        for chunk in &answer.context {
            println!("  {} [{}..{}]", chunk.document_id, chunk.start, chunk.end);
        }
    }
}

fn preview(text: &str, max: usize) -> String {
    let one_line = text.replace('\n', "\\n");
    if one_line.chars().count() <= max {
        one_line
    } else {
        let cut: String = one_line.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("a\nb", 10), "a\\nb");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
