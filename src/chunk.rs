//! Recursive character text splitter.
//!
//! Splits text into chunks of at most `chunk_size` characters, preferring
//! the coarsest boundary available: paragraphs (`\n\n`), then lines (`\n`),
//! then words (` `), and finally single characters. Consecutive chunks share
//! up to `chunk_overlap` characters of trailing context.
//!
//! Lengths are measured in `char`s so multi-byte text never splits inside a
//! code point.
//!
//! # Example
//!
//! ```rust
//! use panda_rag::chunk::split_text;
//!
//! let chunks = split_text("Hello world.\n\nSecond paragraph.", 1000, 100);
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph."]);
//! ```

use sha2::{Digest, Sha256};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Split `text` into chunks of at most `chunk_size` characters.
///
/// Returns trimmed, non-empty chunks in source order. Empty or
/// whitespace-only input yields no chunks.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let chunk_overlap = chunk_overlap.min(chunk_size - 1);
    split_recursive(text, &SEPARATORS, chunk_size, chunk_overlap)
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    // Pick the first separator present in the text; "" always matches.
    let idx = separators
        .iter()
        .position(|s| s.is_empty() || text.contains(s))
        .unwrap_or(separators.len() - 1);
    let separator = separators[idx];
    let finer = &separators[idx + 1..];

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|p| !p.is_empty()).collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, separator, chunk_size, chunk_overlap));
            pending.clear();
        }

        if finer.is_empty() {
            // Unreachable in practice: single characters always fit.
            chunks.push(piece.trim().to_string());
        } else {
            chunks.extend(split_recursive(piece, finer, chunk_size, chunk_overlap));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, separator, chunk_size, chunk_overlap));
    }

    chunks
}

/// Greedily join pieces (each already <= `chunk_size`) into chunks,
/// carrying a tail of up to `chunk_overlap` characters between chunks.
fn merge_pieces(
    pieces: &[&str],
    separator: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        let join_cost = if window.is_empty() { 0 } else { sep_len };

        if total + join_cost + len > chunk_size && !window.is_empty() {
            push_chunk(&mut chunks, &window.join(separator));

            // Drop from the front until the tail fits the overlap budget
            // and leaves room for the incoming piece.
            while !window.is_empty() {
                if total <= chunk_overlap && total + sep_len + len <= chunk_size {
                    break;
                }
                let removed = window.remove(0);
                total -= char_len(removed);
                if !window.is_empty() {
                    total -= sep_len;
                }
            }
        }

        if !window.is_empty() {
            total += sep_len;
        }
        window.push(piece);
        total += len;
    }

    if !window.is_empty() {
        push_chunk(&mut chunks, &window.join(separator));
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// SHA-256 hex digest of a chunk's text, used as a content fingerprint.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
