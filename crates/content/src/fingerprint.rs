//! Content fingerprinting (spec §4.7): MD5 over normalized text and over a
//! per-block structure pattern.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub content_hash: String,
    pub structure_hash: String,
    pub text_length: usize,
    pub word_count: usize,
    pub timestamp_ms: i64,
}

/// Collapse runs of whitespace to a single space and trim (spec §4.7).
pub fn normalize_text(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut last_was_space = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                normalized.push(' ');
            }
            last_was_space = true;
        } else {
            normalized.push(ch);
            last_was_space = false;
        }
    }
    normalized.trim().to_string()
}

/// Splits raw content on blank lines into the blocks used by both the
/// fingerprint's structure pattern and the per-section diff.
pub fn split_blocks(raw: &str) -> Vec<String> {
    raw.split("\n\n")
        .flat_map(|chunk| chunk.split("\r\n\r\n"))
        .map(|block| block.trim())
        .filter(|block| !block.is_empty())
        .map(|block| block.to_string())
        .collect()
}

/// One character per block: `#...` -> H, `- `/`* ` -> L, `N. ` -> N,
/// `|...` -> T, else P (spec §4.7).
pub fn classify_block(block: &str) -> char {
    let trimmed = block.trim_start();
    if trimmed.starts_with('#') {
        'H'
    } else if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
        'L'
    } else if starts_with_numbered_list(trimmed) {
        'N'
    } else if trimmed.starts_with('|') {
        'T'
    } else {
        'P'
    }
}

fn starts_with_numbered_list(text: &str) -> bool {
    let digits_end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(0);
    digits_end > 0 && text[digits_end..].starts_with('.')
}

pub fn structure_pattern(blocks: &[String]) -> String {
    blocks.iter().map(|block| classify_block(block)).collect()
}

pub fn compute_fingerprint(raw: &str, timestamp_ms: i64) -> Fingerprint {
    let normalized = normalize_text(raw);
    let blocks = split_blocks(raw);
    let pattern = structure_pattern(&blocks);

    Fingerprint {
        content_hash: hex_md5(normalized.as_bytes()),
        structure_hash: hex_md5(pattern.as_bytes()),
        text_length: normalized.chars().count(),
        word_count: normalized.split_whitespace().count(),
        timestamp_ms,
    }
}

fn hex_md5(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_runs() {
        assert_eq!(normalize_text("  hello   \n\n world  "), "hello world");
    }

    #[test]
    fn identical_text_yields_identical_fingerprint() {
        let a = compute_fingerprint("# Title\n\nSome body text.", 0);
        let b = compute_fingerprint("# Title\n\nSome body text.", 1_000);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.structure_hash, b.structure_hash);
    }

    #[test]
    fn classifies_heading_list_numbered_and_table_blocks() {
        assert_eq!(classify_block("# Heading"), 'H');
        assert_eq!(classify_block("- item one"), 'L');
        assert_eq!(classify_block("1. first step"), 'N');
        assert_eq!(classify_block("| a | b |"), 'T');
        assert_eq!(classify_block("Just a paragraph."), 'P');
    }
}
