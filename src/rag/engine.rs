//! Corpus loading and chunking for the market-data index.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::config::RagSettings;

/// A text chunk with source information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// The text content
    pub text: String,
    /// Source file, relative to the corpus directory
    pub source: String,
    /// Character offset in original document
    pub start_offset: usize,
    pub chunk_index: usize,
}

#[derive(Debug, Clone)]
pub struct RagEngine {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RagEngine {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    pub fn from_settings(settings: &RagSettings) -> Self {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    /// Splits every document of the corpus, in path order.
    pub fn collect_from_documents(&self, documents: &[(String, String)]) -> Vec<TextChunk> {
        documents
            .iter()
            .flat_map(|(source, text)| self.split_into_chunks(text, source))
            .collect()
    }

    /// Split text into overlapping chunks.
    pub fn split_into_chunks(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let chunk_size = self.chunk_size;
        let overlap = self.chunk_overlap;

        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        if total_chars == 0 {
            return chunks;
        }

        let step = chunk_size.saturating_sub(overlap).max(1);
        let mut start = 0;
        let mut chunk_index = 0;

        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let chunk_text: String = chars[start..end].iter().collect();

            let final_text = if end < total_chars {
                find_sentence_boundary(&chunk_text)
            } else {
                chunk_text
            };

            let trimmed = final_text.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    source: source.to_string(),
                    start_offset: start,
                    chunk_index,
                });
                chunk_index += 1;
            }

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Reads the `.txt` / `.md` files under `dir`, sorted by path.
pub fn load_corpus(dir: &Path) -> std::io::Result<Vec<(String, String)>> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let text = fs::read_to_string(&path)?;
        let source = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        documents.push((source, text));
    }
    Ok(documents)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("txt") | Some("md")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

/// Cuts the chunk after the last sentence ending in its final fifth, if any.
fn find_sentence_boundary(text: &str) -> String {
    let sentence_endings = [". ", "! ", "? ", ".\n", "!\n", "?\n", "다. ", "다.\n"];

    let mut search_start = (text.len() * 80) / 100;
    while !text.is_char_boundary(search_start) {
        search_start += 1;
    }
    let search_text = &text[search_start..];

    for ending in sentence_endings.iter() {
        if let Some(pos) = search_text.rfind(ending) {
            let cut_pos = search_start + pos + ending.len();
            return text[..cut_pos].to_string();
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_overlap_and_cover_the_text() {
        let engine = RagEngine::new(100, 20);
        let text = "This is a test. ".repeat(20);

        let chunks = engine.split_into_chunks(&text, "test.txt");

        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[1].start_offset, 80);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 100));
        assert!(text.trim_end().ends_with(chunks.last().unwrap().text.as_str()));
    }

    #[test]
    fn sentence_boundary_is_safe_on_multibyte_text() {
        let engine = RagEngine::new(30, 5);
        let text = "에듀테크 시장은 빠르게 성장한다. 학습 플랫폼이 늘어난다. ".repeat(5);

        let chunks = engine.split_into_chunks(&text, "ko.md");

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
    }

    #[test]
    fn load_corpus_reads_text_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("nested/b.md"), "beta").unwrap();
        fs::write(dir.path().join("skip.pdf"), "binary").unwrap();

        let docs = load_corpus(dir.path()).unwrap();

        assert_eq!(
            docs,
            vec![
                ("a.txt".to_string(), "alpha".to_string()),
                ("nested/b.md".to_string(), "beta".to_string()),
            ]
        );
    }
}
