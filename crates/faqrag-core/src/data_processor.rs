//! Plain-text chunker used by callers to feed `Engine::ingest`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_words: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_words: 300, overlap_percent: 0.2 }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self {
        Self { chunking_config }
    }

    /// Chunk a single file, or every `.txt`/`.md` file under a directory in
    /// path order.
    pub fn process_path(&self, path: &Path) -> Result<Vec<String>> {
        let files = if path.is_dir() {
            list_text_files(path)
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(Error::InvalidInput(format!("no such file or directory: {}", path.display())));
        };

        let mut chunks = Vec::new();
        for file in &files {
            let content = read_file_content(file)?;
            let before = chunks.len();
            chunks.extend(self.chunk_text(&content));
            tracing::debug!(file = %file.display(), chunks = chunks.len() - before, "chunked file");
        }
        tracing::info!(files = files.len(), chunks = chunks.len(), "processed source text");
        Ok(chunks)
    }

    /// Split on blank lines; paragraphs longer than `max_words` become
    /// overlapping word windows.
    pub fn chunk_text(&self, content: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for paragraph in content.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            if paragraph.split_whitespace().count() <= self.chunking_config.max_words {
                chunks.push(paragraph.to_string());
            } else {
                chunks.extend(self.split_paragraph_with_overlap(paragraph));
            }
        }
        chunks
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let window = self.chunking_config.max_words.max(1);
        let overlap = ((window as f32 * self.chunking_config.overlap_percent) as usize).min(window - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + window).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap;
        }
        chunks
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(file_path)
                .map_err(|e| Error::InvalidInput(format!("{}: {}", file_path.display(), e)))?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }
}

fn list_text_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("txt") | Some("md")))
        .collect();
    files.sort();
    files
}
