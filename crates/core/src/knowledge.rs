use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNTITLED_SECTION: &str = "Document";
pub const CONTEXT_HEADER: &str = "Contexto extraído da Base de Conhecimento:";
pub const NO_CONTEXT_FOUND: &str =
    "Nenhuma informação relevante encontrada na base de conhecimento.";
pub const SNIPPET_CHARS: usize = 240;

const STOPWORDS: &[&str] = &[
    "o", "a", "os", "as", "de", "da", "do", "e", "em", "para", "por", "um", "uma", "nao", "não",
    "com", "no", "na", "que",
];

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A titled section of the knowledge document. `score` is only meaningful on
/// search results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnowledgeChunk {
    pub title: String,
    pub content: String,
    pub score: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub title: String,
    pub snippet: String,
}

/// Keyword-overlap retriever over a single markdown document. Immutable once built.
#[derive(Clone, Debug)]
pub struct KnowledgeRetriever {
    source: String,
    full_text: String,
    chunks: Vec<KnowledgeChunk>,
}

impl KnowledgeRetriever {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|source| KnowledgeError::Read { path: path.to_path_buf(), source })?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::from_text(source, text))
    }

    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        let full_text = text.into();
        let chunks = split_by_headings(&full_text);
        Self { source: source.into(), full_text, chunks }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn chunks(&self) -> &[KnowledgeChunk] {
        &self.chunks
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Top `k` chunks with a positive score, best first. `k == 0` returns every hit.
    pub fn search(&self, query: &str, k: usize) -> Vec<KnowledgeChunk> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut results = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let haystack = format!("{} {}", chunk.title, chunk.content).to_lowercase();
                let score = tokens.iter().filter(|token| haystack.contains(token.as_str())).count();
                (score > 0).then(|| KnowledgeChunk { score, ..chunk.clone() })
            })
            .collect::<Vec<_>>();

        // stable: ties keep document order
        results.sort_by(|left, right| right.score.cmp(&left.score));

        if k > 0 {
            results.truncate(k);
        }
        results
    }

    /// Prompt-ready rendering of the best matches; never empty.
    pub fn search_as_text(&self, query: &str, k: usize) -> String {
        render_context(&self.search(query, k))
    }

    pub fn citations(&self, chunks: &[KnowledgeChunk]) -> Vec<Citation> {
        chunks
            .iter()
            .map(|chunk| Citation {
                source: self.source.clone(),
                title: chunk.title.clone(),
                snippet: snippet(&chunk.content, SNIPPET_CHARS),
            })
            .collect()
    }
}

pub fn render_context(chunks: &[KnowledgeChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT_FOUND.to_string();
    }

    let mut rendered = String::from(CONTEXT_HEADER);
    rendered.push('\n');
    for chunk in chunks {
        rendered.push_str(&format!("\n--- {} ---\n{}\n", chunk.title, chunk.content));
    }
    rendered
}

fn split_by_headings(text: &str) -> Vec<KnowledgeChunk> {
    let mut chunks = Vec::new();
    let mut title = UNTITLED_SECTION.to_string();
    let mut buffer: Vec<&str> = Vec::new();

    let mut flush = |title: &str, buffer: &mut Vec<&str>| {
        let content = buffer.join("\n").trim().to_string();
        if !content.is_empty() {
            chunks.push(KnowledgeChunk { title: title.to_string(), content, score: 0 });
        }
        buffer.clear();
    };

    for line in text.lines() {
        if let Some(heading) = parse_heading(line) {
            flush(&title, &mut buffer);
            title = heading.to_string();
            continue;
        }
        buffer.push(line);
    }
    flush(&title, &mut buffer);

    chunks
}

/// `   ## Title` -> `Title`. Up to three leading spaces, one to six hashes,
/// at least one whitespace character, then non-empty text.
fn parse_heading(line: &str) -> Option<&str> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }

    let rest = &line[indent..];
    let hashes = rest.len() - rest.trim_start_matches('#').len();
    if hashes == 0 || hashes > 6 {
        return None;
    }

    let after = &rest[hashes..];
    if !after.starts_with(char::is_whitespace) {
        return None;
    }

    let title = after.trim();
    (!title.is_empty()).then_some(title)
}

fn tokenize(text: &str) -> Vec<String> {
    let normalized = text
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch.is_whitespace() { ch } else { ' ' })
        .collect::<String>();

    let mut seen = HashSet::new();
    normalized
        .split_whitespace()
        .filter(|token| token.chars().count() >= 2 && !STOPWORDS.contains(token))
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}

fn snippet(content: &str, limit: usize) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    let mut cut = trimmed.chars().take(limit).collect::<String>();
    cut.push_str("...");
    cut
}
