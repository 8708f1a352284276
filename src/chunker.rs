//! Text chunking for embedding and retrieval.
//!
//! Splits converted page text into overlapping, bounded-size segments using
//! a recursive strategy: the coarsest separator (paragraph break) is tried
//! first, and any piece still exceeding the target size is subdivided with
//! progressively finer separators, down to individual characters. Adjacent
//! small pieces are merged back up to the target size, carrying a character
//! overlap between consecutive chunks so retrieval keeps cross-boundary
//! context.

use serde::{Deserialize, Serialize};

/// Metadata attached to every chunk produced from one source document.
///
/// Serializes to a flat JSON map suitable for vector index metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source page URL.
    pub source: String,
    /// Page title, empty when none was extracted.
    #[serde(default)]
    pub title: String,
    /// Crawl timestamp (RFC 3339).
    #[serde(default)]
    pub crawl_timestamp: String,
    /// Configured website name.
    #[serde(default)]
    pub website_name: String,
    /// Dense 0-based position of this chunk within its source document.
    #[serde(default)]
    pub chunk_index: usize,
    /// Total chunks produced from the source document.
    #[serde(default)]
    pub chunk_count: usize,
    /// First ~100 characters of the chunk, newlines collapsed to spaces.
    #[serde(default)]
    pub preview: String,
}

impl ChunkMetadata {
    /// Build the metadata template for one source document. The chunker
    /// fills in `chunk_index`, `chunk_count`, and `preview`.
    #[must_use]
    pub fn new(source: &str, title: &str, crawl_timestamp: &str, website_name: &str) -> Self {
        Self {
            source: source.to_string(),
            title: title.to_string(),
            crawl_timestamp: crawl_timestamp.to_string(),
            website_name: website_name.to_string(),
            chunk_index: 0,
            chunk_count: 0,
            preview: String::new(),
        }
    }
}

/// A bounded-length segment of extracted page text plus its metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// The chunk text, the unit of embedding and retrieval.
    pub text: String,
    /// Positional and source metadata.
    pub metadata: ChunkMetadata,
}

const PREVIEW_LENGTH: usize = 100;

/// Splits text into overlapping chunks with positional metadata.
#[derive(Clone, Debug)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

impl TextChunker {
    /// Create a chunker with the given target size and overlap (characters).
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: ["\n\n", "\n", " ", ""]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Split `text` into chunks, stamping each with the template metadata
    /// plus its index, the total count, and a short preview.
    ///
    /// Empty (or whitespace-only) input yields an empty Vec.
    #[must_use]
    pub fn chunk_text(&self, text: &str, template: &ChunkMetadata) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let pieces = self.split_text(text, &self.separators);
        let count = pieces.len();

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| {
                let mut metadata = template.clone();
                metadata.chunk_index = index;
                metadata.chunk_count = count;
                metadata.preview = preview_of(&piece);
                TextChunk {
                    text: piece,
                    metadata,
                }
            })
            .collect()
    }

    fn split_text(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Pick the first separator present in the text; the empty string
        // always matches and splits into individual characters.
        let mut separator = separators
            .last()
            .cloned()
            .unwrap_or_default();
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() || text.contains(candidate.as_str()) {
                separator = candidate.clone();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(|c| c.to_string()).collect()
        } else {
            text.split(separator.as_str())
                .map(str::to_string)
                .collect()
        };

        let mut chunks: Vec<String> = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in splits {
            if char_len(&piece) < self.chunk_size {
                good.push(piece);
            } else {
                if !good.is_empty() {
                    chunks.extend(self.merge_splits(&good, &separator));
                    good.clear();
                }
                if remaining.is_empty() {
                    chunks.push(piece);
                } else {
                    chunks.extend(self.split_text(&piece, remaining));
                }
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge_splits(&good, &separator));
        }
        chunks
    }

    /// Merge small pieces into chunks up to the target size, keeping a
    /// trailing window of pieces as overlap for the next chunk.
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs: Vec<String> = Vec::new();
        let mut window: Vec<&String> = Vec::new();
        let mut total = 0usize;

        for piece in splits {
            let piece_len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };
            if total + piece_len + joiner > self.chunk_size && !window.is_empty() {
                if let Some(doc) = join_trimmed(&window, separator) {
                    docs.push(doc);
                }
                // Shrink the window until the overlap budget fits the
                // incoming piece.
                while total > self.chunk_overlap
                    || (total + piece_len + if window.is_empty() { 0 } else { sep_len }
                        > self.chunk_size
                        && total > 0)
                {
                    let removed = window.remove(0);
                    total -= char_len(removed) + if window.is_empty() { 0 } else { sep_len };
                }
            }
            total += piece_len + if window.is_empty() { 0 } else { sep_len };
            window.push(piece);
        }

        if let Some(doc) = join_trimmed(&window, separator) {
            docs.push(doc);
        }
        docs
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_trimmed(pieces: &[&String], separator: &str) -> Option<String> {
    let joined = pieces
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn preview_of(text: &str) -> String {
    text.chars()
        .take(PREVIEW_LENGTH)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}
