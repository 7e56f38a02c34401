//! Boundary-aware text chunking.

use serde_json::Value;

use docqa_core::{Chunk, LoadedDocument};

/// Chunking settings.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Target chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 128,
        }
    }
}

/// Splits document text into overlapping chunks.
///
/// Cut points prefer paragraph breaks, then line breaks, then sentence
/// ends, then any whitespace, falling back to a hard cut when a window
/// contains none. Chunk ids are `{file_stem}_chunk_{seq:04}` and each
/// chunk records its character offset under `"start_index"`.
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split raw text into `(start_index, text)` pieces.
    ///
    /// Offsets are character offsets into the input. Pieces are trimmed
    /// of surrounding whitespace; all-whitespace windows are dropped.
    pub fn split_text(&self, text: &str) -> Vec<(usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        if n == 0 {
            return Vec::new();
        }

        let size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap.min(size.saturating_sub(1));

        let mut pieces = Vec::new();
        let mut start = 0usize;

        while start < n {
            let hard_end = (start + size).min(n);
            let end = if hard_end == n {
                n
            } else {
                let floor = (start + size / 2).max(start + 1);
                find_break(&chars, hard_end, floor)
            };

            let mut piece_start = start;
            let mut piece_end = end;
            while piece_start < piece_end && chars[piece_start].is_whitespace() {
                piece_start += 1;
            }
            while piece_end > piece_start && chars[piece_end - 1].is_whitespace() {
                piece_end -= 1;
            }
            if piece_start < piece_end {
                let piece: String = chars[piece_start..piece_end].iter().collect();
                pieces.push((piece_start, piece));
            }

            if end == n {
                break;
            }

            let mut next = end.saturating_sub(overlap).max(start + 1);
            // wind the overlap forward to the next word boundary
            while next < end && !chars[next - 1].is_whitespace() {
                next += 1;
            }
            start = next;
        }

        pieces
    }

    pub fn chunk_document(&self, document: &LoadedDocument) -> Vec<Chunk> {
        let stem = file_stem(&document.source);

        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(seq, (start, text))| {
                let mut chunk = Chunk::new(
                    format!("{stem}_chunk_{seq:04}"),
                    text,
                    document.source.clone(),
                    document.page,
                );
                chunk.metadata = document.metadata.clone();
                chunk
                    .metadata
                    .insert("start_index".to_string(), Value::from(start));
                chunk
            })
            .collect()
    }

    pub fn chunk_documents(&self, documents: &[LoadedDocument]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|document| self.chunk_document(document))
            .collect()
    }
}

/// Rightmost preferred cut in `(floor, hard_end]`, or `hard_end`.
fn find_break(chars: &[char], hard_end: usize, floor: usize) -> usize {
    for end in (floor..=hard_end).rev() {
        if end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n' {
            return end;
        }
    }
    for end in (floor..=hard_end).rev() {
        if chars[end - 1] == '\n' {
            return end;
        }
    }
    for end in (floor..=hard_end).rev() {
        if end >= 2 && chars[end - 1] == ' ' && matches!(chars[end - 2], '.' | '!' | '?') {
            return end;
        }
    }
    for end in (floor..=hard_end).rev() {
        if chars[end - 1].is_whitespace() {
            return end;
        }
    }
    hard_end
}

fn file_stem(source: &str) -> &str {
    match source.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_chunker() -> TextChunker {
        TextChunker::new(ChunkerConfig {
            chunk_size: 100,
            chunk_overlap: 20,
        })
    }

    fn prose(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {i} talks about topic {}.", i % 7))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_text_single_piece() {
        let chunker = small_chunker();
        let pieces = chunker.split_text("just a short note");

        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0], (0, "just a short note".to_string()));
    }

    #[test]
    fn test_empty_text_no_pieces() {
        let chunker = small_chunker();
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_pieces_respect_size_and_match_source() {
        let chunker = small_chunker();
        let text = prose(20);
        let chars: Vec<char> = text.chars().collect();

        let pieces = chunker.split_text(&text);
        assert!(pieces.len() > 1);

        for (start, piece) in &pieces {
            let piece_chars: Vec<char> = piece.chars().collect();
            assert!(piece_chars.len() <= 100);
            assert_eq!(&chars[*start..*start + piece_chars.len()], &piece_chars[..]);
        }
    }

    #[test]
    fn test_consecutive_pieces_overlap() {
        let chunker = small_chunker();
        let text = prose(20);
        let pieces = chunker.split_text(&text);

        for window in pieces.windows(2) {
            let (prev_start, prev_text) = &window[0];
            let (next_start, _) = &window[1];
            let prev_end = prev_start + prev_text.chars().count();

            assert!(next_start > prev_start);
            assert!(
                *next_start < prev_end,
                "piece at {next_start} does not overlap previous piece ending at {prev_end}"
            );
        }
    }

    #[test]
    fn test_paragraph_break_preferred() {
        let chunker = small_chunker();
        let first = "The opening paragraph stays together as one unbroken block of text.";
        let second = "The second paragraph continues with different material entirely.";
        let text = format!("{first}\n\n{second}");

        let pieces = chunker.split_text(&text);
        assert!(pieces.len() >= 2);
        assert_eq!(pieces[0].1, first);
    }

    #[test]
    fn test_hard_cut_without_whitespace() {
        let chunker = small_chunker();
        let text = "x".repeat(250);

        let pieces = chunker.split_text(&text);
        assert!(pieces.len() >= 3);
        assert_eq!(pieces[0].1.chars().count(), 100);
        assert_eq!(pieces[0].0, 0);
    }

    #[test]
    fn test_chunk_ids_and_metadata() {
        let chunker = small_chunker();
        let document = LoadedDocument::new("report.txt", prose(20));

        let chunks = chunker.chunk_document(&document);
        assert!(chunks.len() > 1);

        assert_eq!(chunks[0].id, "report_chunk_0000");
        assert_eq!(chunks[1].id, "report_chunk_0001");
        for chunk in &chunks {
            assert_eq!(chunk.source, "report.txt");
            assert_eq!(chunk.page, 1);
            assert!(chunk.metadata.contains_key("start_index"));
        }
    }

    #[test]
    fn test_chunk_documents_spans_sources() {
        let chunker = small_chunker();
        let documents = vec![
            LoadedDocument::new("a.txt", "alpha body text"),
            LoadedDocument::new("b.md", "beta body text"),
        ];

        let chunks = chunker.chunk_documents(&documents);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "a_chunk_0000");
        assert_eq!(chunks[1].id, "b_chunk_0000");
    }
}
