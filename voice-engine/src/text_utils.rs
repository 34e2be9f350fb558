//! Sentence-boundary splitting for streaming synthesis (§4.6).
//!
//! Splits at `. ! ? ;` and newline, preserving the punctuation, then
//! coalesces consecutive fragments shorter than `min_chunk_chars` with their
//! neighbour so short clauses don't produce prosodically choppy synthesis.

/// Split `text` into sentence-like chunks ready for sentence-at-a-time
/// synthesis.
#[must_use]
pub fn split_into_sentences(text: &str, min_chunk_chars: usize) -> Vec<String> {
    let mut raw = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?' | ';' | '\n') {
            push_trimmed(&mut raw, &current);
            current.clear();
        }
    }
    push_trimmed(&mut raw, &current);

    coalesce_short_fragments(raw, min_chunk_chars)
}

fn push_trimmed(out: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn coalesce_short_fragments(sentences: Vec<String>, min_chunk_chars: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for sentence in sentences {
        match out.last_mut() {
            Some(last) if last.chars().count() < min_chunk_chars => {
                last.push(' ');
                last.push_str(&sentence);
            }
            _ => out.push(sentence),
        }
    }

    // A trailing fragment with no successor to absorb it merges backward.
    if out.len() > 1 {
        if let Some(last_len) = out.last().map(|s| s.chars().count()) {
            if last_len < min_chunk_chars {
                let tail = out.pop().expect("checked len > 1");
                if let Some(prev) = out.last_mut() {
                    prev.push(' ');
                    prev.push_str(&tail);
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_punctuation_preserving_it() {
        let chunks = split_into_sentences("Hello there. How are you? Fine!", 0);
        assert_eq!(chunks, vec!["Hello there.", "How are you?", "Fine!"]);
    }

    #[test]
    fn splits_on_newline_and_semicolon() {
        let chunks = split_into_sentences("First line\nSecond; third", 0);
        assert_eq!(chunks, vec!["First line", "Second;", "third"]);
    }

    #[test]
    fn coalesces_short_fragments_with_following_neighbour() {
        let chunks = split_into_sentences("Ok. That's a much longer sentence here.", 20);
        assert_eq!(chunks, vec!["Ok. That's a much longer sentence here."]);
    }

    #[test]
    fn trailing_short_fragment_merges_backward() {
        let chunks = split_into_sentences("This is a long enough opening sentence. Ok.", 20);
        assert_eq!(
            chunks,
            vec!["This is a long enough opening sentence. Ok."]
        );
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_into_sentences("", 20).is_empty());
        assert!(split_into_sentences("   ", 20).is_empty());
    }
}
