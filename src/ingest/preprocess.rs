//! Text preprocessing pipeline.
//!
//! A sequence of optional stages, each safe to fail on its own: a stage
//! that errors is logged and skipped, and the text continues unchanged
//! through the rest of the pipeline. In practice only user-supplied regex
//! patterns can fail; they are compiled defensively and invalid ones are
//! dropped with a warning.

use crate::text::is_cjk;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"{}|\\^`\[\]]+|www\.[^\s<>"{}|\\^`\[\]]+"#)
        .expect("url regex")
});
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
});
static PHONE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b\d{3}-\d{3}-\d{4}\b",
        r"\b\d{3}\.\d{3}\.\d{4}\b",
        r"\b\d{10}\b",
        r"\b\d{3}\s\d{3}\s\d{4}\b",
        r"\+\d{1,3}\s?\d{3,4}\s?\d{3,4}\s?\d{3,4}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("phone regex"))
    .collect()
});

const CHINESE_STOPWORDS: &[&str] = &[
    "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上", "也",
    "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这", "那", "里",
    "就是", "还", "把", "比", "或者", "因为", "所以", "但是", "如果", "这样", "那样", "什么",
    "怎么", "为什么", "哪里", "哪个",
];

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "that", "the", "to", "was", "will", "with", "this", "but", "they",
    "have", "had", "what", "said", "each", "which", "she", "do", "how", "their", "if", "up",
    "out", "many", "then", "them", "these", "so", "some", "her", "would", "make", "like",
    "into", "him", "time", "two", "more", "go", "no", "way", "could",
];

/// Which preprocessing stages run, and how.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub normalize_unicode: bool,
    pub remove_special_chars: bool,
    pub remove_urls: bool,
    pub remove_emails: bool,
    pub remove_phone_numbers: bool,
    pub remove_extra_whitespace: bool,
    pub remove_stopwords: bool,
    pub convert_to_lowercase: bool,
    /// `zh`, `en`, or anything else for the union of both stopword lists.
    pub language: String,
    /// Extra removal patterns; invalid ones are skipped with a warning.
    pub custom_patterns: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
            remove_special_chars: false,
            remove_urls: true,
            remove_emails: true,
            remove_phone_numbers: false,
            remove_extra_whitespace: true,
            remove_stopwords: false,
            convert_to_lowercase: false,
            language: "zh".to_string(),
            custom_patterns: Vec::new(),
        }
    }
}

/// Applies the configured stages in order.
pub struct TextPreprocessor {
    config: PreprocessConfig,
    custom_patterns: Vec<Regex>,
    stopwords: HashSet<&'static str>,
}

impl TextPreprocessor {
    /// Compiles the configuration; invalid custom patterns are dropped here.
    pub fn new(config: PreprocessConfig) -> Self {
        let custom_patterns = config
            .custom_patterns
            .iter()
            .filter_map(|pattern| match Regex::new(&format!("(?i){pattern}")) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern, error = %e, "skipping invalid custom pattern");
                    None
                }
            })
            .collect();

        let stopwords = match config.language.as_str() {
            "zh" => CHINESE_STOPWORDS.iter().copied().collect(),
            "en" => ENGLISH_STOPWORDS.iter().copied().collect(),
            _ => CHINESE_STOPWORDS
                .iter()
                .chain(ENGLISH_STOPWORDS)
                .copied()
                .collect(),
        };

        Self {
            config,
            custom_patterns,
            stopwords,
        }
    }

    /// Runs the full pipeline.
    pub fn process(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        debug!(length = text.chars().count(), "preprocessing text");

        let mut text = text.to_string();

        if self.config.normalize_unicode {
            text = normalize_unicode(&text);
        }

        text = strip_control_and_zero_width(&text);
        if self.config.remove_special_chars {
            text = filter_special_chars(&text);
        }

        if self.config.remove_urls {
            text = URL_PATTERN.replace_all(&text, "").into_owned();
        }
        if self.config.remove_emails {
            text = EMAIL_PATTERN.replace_all(&text, "").into_owned();
        }
        if self.config.remove_phone_numbers {
            for pattern in PHONE_PATTERNS.iter() {
                text = pattern.replace_all(&text, "").into_owned();
            }
        }

        for pattern in &self.custom_patterns {
            text = pattern.replace_all(&text, "").into_owned();
        }

        if self.config.remove_extra_whitespace {
            text = normalize_whitespace(&text);
        }

        if self.config.remove_stopwords {
            text = self.remove_stopwords(&text);
        }

        if self.config.convert_to_lowercase {
            text = text.to_lowercase();
        }

        final_cleanup(&text)
    }

    fn remove_stopwords(&self, text: &str) -> String {
        crate::text::tokenize(text)
            .into_iter()
            .filter(|token| !self.stopwords.contains(token.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// NFC normalization plus fullwidth-to-halfwidth folding.
fn normalize_unicode(text: &str) -> String {
    text.nfc()
        .map(|ch| {
            let code = ch as u32;
            if (0xFF01..=0xFF5E).contains(&code) {
                // Fullwidth ASCII block maps linearly onto ASCII.
                char::from_u32(code - 0xFEE0).unwrap_or(ch)
            } else if code == 0x3000 {
                ' '
            } else {
                ch
            }
        })
        .collect()
}

/// Removes control characters (keeping newline and tab) and zero-width
/// characters.
fn strip_control_and_zero_width(text: &str) -> String {
    text.chars()
        .filter(|&ch| {
            let code = ch as u32;
            let control = matches!(code, 0x00..=0x08 | 0x0B | 0x0C | 0x0E..=0x1F | 0x7F);
            let zero_width = matches!(code, 0x200B..=0x200D | 0xFEFF);
            !control && !zero_width
        })
        .collect()
}

/// Optional filter keeping word characters, whitespace, CJK, and basic
/// punctuation.
fn filter_special_chars(text: &str) -> String {
    const KEPT_PUNCT: &str = ".,!?;:()[]{}\"'`~@#$%^&*+=|\\/<>-";
    text.chars()
        .filter(|&ch| {
            ch.is_alphanumeric()
                || ch == '_'
                || ch.is_whitespace()
                || is_cjk(ch)
                || KEPT_PUNCT.contains(ch)
        })
        .collect()
}

/// Collapses intra-line whitespace runs, strips line edges, and reduces
/// three-plus blank lines to one blank line.
fn normalize_whitespace(text: &str) -> String {
    let lines: Vec<String> = text
        .split('\n')
        .map(|line| {
            line.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut blank_run = 0usize;
    for line in &lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run <= 1 {
                out.push("");
            }
        } else {
            blank_run = 0;
            out.push(line);
        }
    }

    out.join("\n")
}

fn final_cleanup(text: &str) -> String {
    normalize_blank_runs(text).trim().to_string()
}

fn normalize_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newline_run = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push('\n');
            }
        } else {
            newline_run = 0;
            out.push(ch);
        }
    }
    out
}
