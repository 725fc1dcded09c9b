//! Small text utilities shared across modules.
//!
//! Tokenization here is deliberately simple: lowercase word tokens for
//! alphabetic scripts, single-character tokens for CJK. Both the lexical
//! scorer and the deterministic mock models rely on it, so they agree on
//! what "overlap" means.

/// Splits text into lowercase tokens; CJK characters become unigrams.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    for ch in text.chars() {
        if is_cjk(ch) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(ch.to_string());
        } else if ch.is_alphanumeric() {
            word.extend(ch.to_lowercase());
        } else if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }

    tokens
}

/// Splits on CJK and ASCII sentence terminators, keeping non-empty parts.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if is_sentence_terminator(ch) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

/// CJK Unified Ideographs plus the common extension block.
pub fn is_cjk(ch: char) -> bool {
    matches!(ch, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

/// ASCII and CJK sentence-ending punctuation.
pub fn is_sentence_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '。' | '！' | '？')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_mixed_scripts() {
        let tokens = tokenize("Neural networks, 机器学习!");
        assert_eq!(tokens, vec!["neural", "networks", "机", "器", "学", "习"]);
    }

    #[test]
    fn splits_sentences_on_cjk_and_ascii_terminators() {
        let sentences = split_sentences("First. 第二句。Third?");
        assert_eq!(sentences, vec!["First.", "第二句。", "Third?"]);
    }

    #[test]
    fn trailing_text_without_terminator_is_kept() {
        let sentences = split_sentences("no terminator here");
        assert_eq!(sentences, vec!["no terminator here"]);
    }
}
