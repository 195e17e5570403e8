//! Change classification, per-section block diff, and key-value extraction
//! (spec §4.7).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use webcascade_core::config::ChangeThresholds;

static CURRENCY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d{1,3}(,\d{3})*(\.\d{2})?\s*(EUR|USD|\$|euros?)").unwrap());
static PERCENTAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(\.\d+)?\s*%").unwrap());
static DURATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\d+\s*(days?|weeks?|months?|years?)").unwrap());
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeSeverity {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockChange {
    pub kind: BlockChangeKind,
    pub content: String,
    pub predecessor: Option<String>,
    pub significance: ChangeSeverity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyValueDiff {
    pub currency: Vec<String>,
    pub percentages: Vec<String>,
    pub durations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeReport {
    pub severity: ChangeSeverity,
    pub block_changes: Vec<BlockChange>,
    pub key_values: KeyValueDiff,
}

/// `none` on identical hash; `high` on structural change; else bucketed by
/// relative length delta (spec §4.7).
pub fn classify_change(old: &Fingerprint, new: &Fingerprint, thresholds: &ChangeThresholds) -> ChangeSeverity {
    if old.content_hash == new.content_hash {
        return ChangeSeverity::None;
    }
    if old.structure_hash != new.structure_hash {
        return ChangeSeverity::High;
    }
    if old.text_length == 0 {
        return ChangeSeverity::High;
    }
    let delta = (new.text_length as f64 - old.text_length as f64).abs() / old.text_length as f64;
    if delta > thresholds.high_len_delta {
        ChangeSeverity::High
    } else if delta > thresholds.med_len_delta {
        ChangeSeverity::Medium
    } else {
        ChangeSeverity::Low
    }
}

/// Per-section diff (spec §4.7): new blocks absent from old are matched
/// against the best-similarity unclaimed old block (`modified`) or else
/// `added`; old blocks left unclaimed are `removed`.
pub fn diff_blocks(old_blocks: &[String], new_blocks: &[String], thresholds: &ChangeThresholds) -> Vec<BlockChange> {
    let high_sig_keywords = &thresholds.high_significance_keywords;
    let old_set: HashSet<&String> = old_blocks.iter().collect();
    let new_set: HashSet<&String> = new_blocks.iter().collect();

    let mut claimed: HashSet<usize> = HashSet::new();
    let mut changes = Vec::new();

    for new_block in new_blocks {
        if old_set.contains(new_block) {
            continue;
        }
        let new_words = word_set(new_block);
        let best = old_blocks
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed.contains(i))
            .map(|(i, old_block)| (i, jaccard(&new_words, &word_set(old_block))))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        match best {
            Some((i, similarity)) if similarity > thresholds.similarity_for_modify => {
                claimed.insert(i);
                changes.push(BlockChange {
                    kind: BlockChangeKind::Modified,
                    content: new_block.clone(),
                    predecessor: Some(old_blocks[i].clone()),
                    significance: significance_of(new_block, high_sig_keywords),
                });
            }
            _ => changes.push(BlockChange {
                kind: BlockChangeKind::Added,
                content: new_block.clone(),
                predecessor: None,
                significance: significance_of(new_block, high_sig_keywords),
            }),
        }
    }

    for (i, old_block) in old_blocks.iter().enumerate() {
        if new_set.contains(old_block) || claimed.contains(&i) {
            continue;
        }
        changes.push(BlockChange {
            kind: BlockChangeKind::Removed,
            content: old_block.clone(),
            predecessor: None,
            significance: significance_of(old_block, high_sig_keywords),
        });
    }

    changes
}

fn word_set(text: &str) -> HashSet<String> {
    WORD_RE.find_iter(text).map(|m| m.as_str().to_lowercase()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// A block containing any high-significance keyword is `high` regardless
/// of structural significance (spec §4.7); otherwise `low`.
fn significance_of(block: &str, high_sig_keywords: &[String]) -> ChangeSeverity {
    let lower = block.to_lowercase();
    if high_sig_keywords.iter().any(|kw| lower.contains(&kw.to_lowercase())) {
        ChangeSeverity::High
    } else {
        ChangeSeverity::Low
    }
}

pub fn extract_key_values(text: &str) -> KeyValueDiff {
    KeyValueDiff {
        currency: CURRENCY_RE.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        percentages: PERCENTAGE_RE.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        durations: DURATION_RE.find_iter(text).map(|m| m.as_str().to_string()).collect(),
    }
}

/// Surfaces the symmetric difference of extracted values between versions
/// (spec §4.7 "a differing set of extracted values across versions is
/// surfaced verbatim").
pub fn diff_key_values(old: &KeyValueDiff, new: &KeyValueDiff) -> KeyValueDiff {
    KeyValueDiff {
        currency: symmetric_difference(&old.currency, &new.currency),
        percentages: symmetric_difference(&old.percentages, &new.percentages),
        durations: symmetric_difference(&old.durations, &new.durations),
    }
}

fn symmetric_difference(old: &[String], new: &[String]) -> Vec<String> {
    let old_set: HashSet<&String> = old.iter().collect();
    new.iter().filter(|v| !old_set.contains(v)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ChangeThresholds {
        ChangeThresholds::default()
    }

    #[test]
    fn identical_blocks_produce_no_changes() {
        let blocks = vec!["Paragraph one.".to_string()];
        let changes = diff_blocks(&blocks, &blocks, &thresholds());
        assert!(changes.is_empty());
    }

    #[test]
    fn similar_new_block_is_flagged_as_modification_of_old() {
        let old = vec!["The visa fee is 100 dollars due in March.".to_string()];
        let new = vec!["The visa fee is 150 dollars due in March.".to_string()];
        let changes = diff_blocks(&old, &new, &thresholds());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, BlockChangeKind::Modified);
        assert_eq!(changes[0].significance, ChangeSeverity::High);
    }

    #[test]
    fn unrelated_new_block_is_added_not_modified() {
        let old = vec!["Completely unrelated content here.".to_string()];
        let new = vec!["Completely unrelated content here.".to_string(), "A brand new topic entirely.".to_string()];
        let changes = diff_blocks(&old, &new, &thresholds());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, BlockChangeKind::Added);
    }

    #[test]
    fn extracts_currency_percentage_and_duration_values() {
        let kv = extract_key_values("Pay 1,200.50 USD now, a 15% surcharge applies within 30 days.");
        assert_eq!(kv.currency, vec!["1,200.50 USD"]);
        assert_eq!(kv.percentages, vec!["15%"]);
        assert_eq!(kv.durations, vec!["30 days"]);
    }
}
