//! Word-boundary text chunker.
//!
//! Splits text into pieces small enough for an embedding model's input
//! window. The budget is `max_chunk_size * 4` characters (a conservative
//! four-chars-per-token estimate). Packing is greedy: words accumulate into
//! the current chunk until the next word would overflow the budget, at which
//! point the chunk closes and the word starts a new one. A single word
//! longer than the whole budget is emitted as its own chunk rather than
//! split. Whitespace inside chunks is normalized to single spaces.

/// Chars-per-token estimate matching the embedding model's tokenizer.
const CHARS_PER_TOKEN: usize = 4;

/// Split `text` into ordered chunks of at most `max_chunk_size * 4`
/// characters, breaking only at word boundaries. Deterministic; empty or
/// whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    let max_chars = max_chunk_size * CHARS_PER_TOKEN;

    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 6000);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_no_chunks() {
        assert!(chunk_text("", 6000).is_empty());
        assert!(chunk_text("   \n\t ", 6000).is_empty());
    }

    #[test]
    fn chunking_preserves_word_sequence() {
        let text = (0..500)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        // max_chunk_size=10 => 40-char budget, forces many chunks
        let chunks = chunk_text(&text, 10);
        assert!(chunks.len() > 1);

        let rejoined = chunks.join(" ");
        let original_words: Vec<&str> = text.split_whitespace().collect();
        let rejoined_words: Vec<&str> = rejoined.split_whitespace().collect();
        assert_eq!(original_words, rejoined_words);
    }

    #[test]
    fn chunks_respect_character_budget() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa".repeat(20);
        let chunks = chunk_text(&text, 8); // 32-char budget
        for chunk in &chunks {
            assert!(
                chunk.len() <= 32,
                "chunk exceeds budget: {} chars",
                chunk.len()
            );
        }
    }

    #[test]
    fn oversized_word_becomes_own_chunk() {
        let long_word = "x".repeat(100);
        let text = format!("small {} tail", long_word);
        let chunks = chunk_text(&text, 5); // 20-char budget
        assert!(chunks.contains(&long_word));
        // The oversized word is the only over-budget chunk
        for chunk in &chunks {
            if chunk.len() > 20 {
                assert_eq!(chunk, &long_word);
            }
        }
    }

    #[test]
    fn already_small_text_is_one_chunk_modulo_whitespace() {
        let text = "one  two\nthree\t four";
        let chunks = chunk_text(text, 6000);
        assert_eq!(chunks, vec!["one two three four".to_string()]);
    }

    #[test]
    fn deterministic() {
        let text = "the quick brown fox jumps over the lazy dog ".repeat(50);
        assert_eq!(chunk_text(&text, 12), chunk_text(&text, 12));
    }
}
