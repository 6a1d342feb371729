//! Local document sources.
//!
//! A source path is either a single file or a directory walked recursively
//! with include/exclude globs. Each file becomes one [`Document`] whose id
//! is its path relative to the root.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use docgate_core::models::Document;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::SourcesConfig;

pub fn load_documents(path: &Path, config: &SourcesConfig) -> Result<Vec<Document>> {
    if !path.exists() {
        bail!("Source path does not exist: {}", path.display());
    }
    if path.is_file() {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        return Ok(vec![file_to_document(path, &id)?]);
    }
    scan_directory(path, config)
}

pub fn scan_directory(root: &Path, config: &SourcesConfig) -> Result<Vec<Document>> {
    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut docs = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        docs.push(file_to_document(path, &rel_str)?);
    }

    // Sort for deterministic ordering
    docs.sort_by(|a, b| a.id.cmp(&b.id));

    tracing::debug!(root = %root.display(), documents = docs.len(), "scanned sources");
    Ok(docs)
}

fn file_to_document(path: &Path, id: &str) -> Result<Document> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let modified: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))?;

    Ok(Document::with_id(
        id,
        format!("file://{}", path.display()),
        text,
        modified,
    ))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_applies_globs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("docs/nested")).unwrap();
        fs::create_dir_all(tmp.path().join("node_modules")).unwrap();
        fs::write(tmp.path().join("docs/a.md"), "alpha").unwrap();
        fs::write(tmp.path().join("docs/nested/b.txt"), "beta").unwrap();
        fs::write(tmp.path().join("docs/skip.rs"), "fn main() {}").unwrap();
        fs::write(tmp.path().join("node_modules/c.md"), "vendored").unwrap();
        fs::write(tmp.path().join("draft.md"), "draft").unwrap();

        let config = SourcesConfig {
            exclude_globs: vec!["draft.md".to_string()],
            ..SourcesConfig::default()
        };
        let docs = scan_directory(tmp.path(), &config).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["docs/a.md", "docs/nested/b.txt"]);
        assert_eq!(docs[0].text, "alpha");
        assert!(docs[0].source_id().unwrap().starts_with("file://"));
    }

    #[test]
    fn test_single_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("notes.rs");
        fs::write(&file, "any extension is fine").unwrap();
        let docs = load_documents(&file, &SourcesConfig::default()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "notes.rs");
    }

    #[test]
    fn test_missing_path() {
        let tmp = TempDir::new().unwrap();
        assert!(load_documents(&tmp.path().join("nope"), &SourcesConfig::default()).is_err());
    }
}
