use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A raw `(document_id, text)` pair handed to ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub document_id: String,
    pub text: String,
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Load every `.txt`/`.md` file under `root`, sorted by path.
///
/// The document id is the path relative to `root` with `/` separators, so it
/// stays stable across machines. Invalid UTF-8 is decoded lossily.
pub fn load_text_documents(root: &Path) -> Result<Vec<SourceDocument>> {
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }
    let files = list_text_files(root);
    if files.is_empty() {
        warn!("No text files found under {}", root.display());
        return Ok(vec![]);
    }
    let mut docs = Vec::with_capacity(files.len());
    for path in &files {
        let text = read_file_content(path)?;
        docs.push(SourceDocument { document_id: document_id_for(root, path), text });
    }
    info!("Loaded {} documents from {}", docs.len(), root.display());
    Ok(docs)
}

fn read_file_content(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn document_id_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn list_text_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}
