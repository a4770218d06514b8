//! Overlapping fixed-window chunker for ingested document text.
//!
//! Windows overlap so that context straddling a chunk boundary is never lost
//! to retrieval. Offsets are measured in characters, never raw bytes, so
//! multi-byte text cannot split mid-character.

/// Window size in characters.
pub const CHUNK_SIZE: usize = 512;
/// Characters shared between consecutive windows.
pub const CHUNK_OVERLAP: usize = 50;

/// Split `text` into overlapping windows. Whitespace-only windows are dropped.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    assert!(size > 0, "chunk size must be positive");
    assert!(overlap < size, "overlap must be smaller than chunk size");

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("hello world", CHUNK_SIZE, CHUNK_OVERLAP);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunk_text("", CHUNK_SIZE, CHUNK_OVERLAP).is_empty());
        assert!(chunk_text("   \n\t  ", CHUNK_SIZE, CHUNK_OVERLAP).is_empty());
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text: String = ('a'..='z').cycle().take(100).collect();
        let chunks = chunk_text(&text, 40, 10);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 10).collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn covers_full_text() {
        let text: String = ('a'..='z').cycle().take(1000).collect();
        let chunks = chunk_text(&text, 40, 10);

        // Every character position is inside at least one chunk
        let reassembled: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert!(reassembled >= 1000);
        assert!(text.ends_with(chunks.last().unwrap().as_str()));
    }

    #[test]
    fn multibyte_text_does_not_split_characters() {
        let text = "日本語のテキスト".repeat(100);
        let chunks = chunk_text(&text, 64, 8);
        // Would panic on a byte-offset implementation; also verify content survives
        assert!(chunks.iter().all(|c| c.chars().count() <= 64));
    }
}
