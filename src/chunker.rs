//! Break twins into overlapping chunks for retrieval indexing.
//!
//! Pure and deterministic: the same twin and configuration always yield
//! byte-identical chunk sequences. The walk is a fixed character window
//! of `max_chars`, advancing `max_chars - overlap_chars` per step, so
//! adjacent chunks share exactly `overlap_chars` characters; only the
//! final chunk may be shorter. Page provenance is tracked by mapping
//! each window back onto the twin's page boundaries.
//!
//! Tables get their own chunks after the text chunks, serialized as JSON
//! rows, since a table split mid-row embeds poorly.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::twin::Twin;

/// One retrieval chunk derived from a twin.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Chunk {
    /// `{document_id}_{chunk_index}`.
    pub chunk_id: String,
    pub document_id: String,
    pub source_key: String,
    pub filename: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Metadata every chunk must carry. A chunk missing any of these fields
/// is a defect, not an accepted variance.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChunkMetadata {
    pub library: String,
    pub path: String,
    pub content_version: String,
    pub file_type: String,
    /// Source pages the chunk's text spans; empty for table chunks
    /// without page attribution.
    pub page_numbers: Vec<u32>,
}

/// Chunk a twin's extracted text and tables.
///
/// `overlap_chars` must be strictly less than `max_chars`.
pub fn chunk_twin(twin: &Twin, max_chars: usize, overlap_chars: usize) -> Result<Vec<Chunk>> {
    if max_chars == 0 {
        return Err(Error::Chunking("max_chars must be > 0".to_string()));
    }
    if overlap_chars >= max_chars {
        return Err(Error::Chunking(
            "overlap_chars must be less than max_chars".to_string(),
        ));
    }

    let base = ChunkMetadata {
        library: twin.metadata.library.clone(),
        path: twin.metadata.path.clone(),
        content_version: twin.metadata.content_version.clone(),
        file_type: twin.file_type.clone(),
        page_numbers: Vec::new(),
    };

    let mut chunks: Vec<Chunk> = Vec::new();
    let push = |chunks: &mut Vec<Chunk>, text: String, page_numbers: Vec<u32>| {
        let index = chunks.len();
        chunks.push(Chunk {
            chunk_id: format!("{}_{}", twin.document_id, index),
            document_id: twin.document_id.clone(),
            source_key: twin.source_s3_key.clone(),
            filename: twin.filename.clone(),
            chunk_index: index,
            total_chunks: 0, // back-filled below
            text,
            metadata: ChunkMetadata {
                page_numbers,
                ..base.clone()
            },
        });
    };

    for (text, page_numbers) in windows(twin, max_chars, overlap_chars) {
        push(&mut chunks, text, page_numbers);
    }

    for table in &twin.tables {
        if table.rows.is_empty() {
            continue;
        }
        let text = serde_json::to_string(&table.rows)?;
        let page_numbers = table.page_number.into_iter().collect();
        push(&mut chunks, text, page_numbers);
    }

    let total = chunks.len();
    for chunk in &mut chunks {
        chunk.total_chunks = total;
    }
    Ok(chunks)
}

/// Fixed-stride window walk over the extracted text, annotated with the
/// pages each window spans.
fn windows(twin: &Twin, max_chars: usize, overlap_chars: usize) -> Vec<(String, Vec<u32>)> {
    let text = twin.extracted_text.as_str();
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char, so windows slice at char boundaries.
    let offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    let total = offsets.len();
    let page_ranges = page_char_ranges(twin, total);

    let step = max_chars - overlap_chars;
    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + max_chars).min(total);
        let byte_start = offsets[start];
        let byte_end = if end == total { text.len() } else { offsets[end] };

        let page_numbers: Vec<u32> = page_ranges
            .iter()
            .filter(|(s, e, _)| *s < end && *e > start)
            .map(|(_, _, n)| *n)
            .collect();

        out.push((text[byte_start..byte_end].to_string(), page_numbers));

        if end == total {
            break;
        }
        start += step;
    }
    out
}

/// Char ranges `[start, end)` each page's text occupies within the
/// concatenated extracted text, which joins non-empty pages with
/// `"\n\n"`. When the twin's text does not line up with its pages
/// (hand-edited artifact), provenance is dropped rather than guessed.
fn page_char_ranges(twin: &Twin, total_chars: usize) -> Vec<(usize, usize, u32)> {
    let mut ranges = Vec::new();
    let mut pos = 0usize;
    for page in &twin.pages {
        if page.text.is_empty() {
            continue;
        }
        if pos > 0 {
            pos += 2; // "\n\n" separator
        }
        let len = page.text.chars().count();
        ranges.push((pos, pos + len, page.page_number));
        pos += len;
    }
    if pos != total_chars {
        return Vec::new();
    }
    ranges
}

/// Write chunks as JSONL, one object per line. Returns the number of
/// chunks written.
pub fn export_jsonl<W: std::io::Write>(chunks: &[Chunk], writer: &mut W) -> Result<usize> {
    for chunk in chunks {
        serde_json::to_writer(&mut *writer, chunk)?;
        writer.write_all(b"\n")?;
    }
    Ok(chunks.len())
}
