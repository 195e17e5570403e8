//! The content validator applied after every tier attempt (spec §4.1).

const DEFAULT_MIN_LENGTH: usize = 200;
const DOMINANCE_THRESHOLD: f64 = 0.6;

fn default_markers() -> Vec<String> {
    [
        "loading…",
        "loading...",
        "please enable javascript",
        "checking your browser",
        "access denied",
        "captcha",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Per-domain validator overrides (spec §4.1 "Validators are pluggable per
/// domain: an override list may extend the incompleteness markers or raise
/// the minimum length").
#[derive(Debug, Clone)]
pub struct ValidatorOverride {
    pub extra_markers: Vec<String>,
    pub min_length: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ContentValidator {
    min_length: usize,
    markers: Vec<String>,
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            markers: default_markers(),
        }
    }
}

impl ContentValidator {
    pub fn with_override(over: &ValidatorOverride) -> Self {
        let mut markers = default_markers();
        markers.extend(over.extra_markers.iter().cloned());
        Self {
            min_length: over.min_length.unwrap_or(DEFAULT_MIN_LENGTH),
            markers,
        }
    }

    /// `has_semantic_element` covers both an HTML semantic tag match and "at
    /// least one markdown heading produced" (spec §4.1 treats these as the
    /// same disjunct).
    pub fn validate(&self, text: &str, has_semantic_element: bool) -> ValidationOutcome {
        let long_enough = text.chars().count() >= self.min_length;
        if !long_enough && !has_semantic_element {
            return ValidationOutcome::invalid("content too short and no semantic element present");
        }

        if let Some(marker) = self.dominant_marker(text) {
            return ValidationOutcome::invalid(format!("incompleteness marker detected: {marker}"));
        }

        ValidationOutcome::valid()
    }

    fn dominant_marker(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        let total = text.chars().count().max(1) as f64;
        self.markers.iter().find_map(|marker| {
            let occurrences = lower.matches(marker.as_str()).count();
            if occurrences == 0 {
                return None;
            }
            let covered = (marker.chars().count() * occurrences) as f64;
            (covered / total > DOMINANCE_THRESHOLD).then(|| marker.clone())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub reason: Option<String>,
}

impl ValidationOutcome {
    fn valid() -> Self {
        Self { valid: true, reason: None }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self { valid: false, reason: Some(reason.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_content_without_semantic_element() {
        let v = ContentValidator::default();
        let outcome = v.validate("too short", false);
        assert!(!outcome.valid);
    }

    #[test]
    fn accepts_short_content_with_semantic_element() {
        let v = ContentValidator::default();
        let outcome = v.validate("short but semantic", true);
        assert!(outcome.valid);
    }

    #[test]
    fn rejects_loading_placeholder() {
        let v = ContentValidator::default();
        let outcome = v.validate("Loading…", false);
        assert!(!outcome.valid);
    }

    #[test]
    fn accepts_sufficiently_long_content() {
        let v = ContentValidator::default();
        let text = "a".repeat(250);
        assert!(v.validate(&text, false).valid);
    }

    #[test]
    fn domain_override_can_raise_minimum_length() {
        let over = ValidatorOverride { extra_markers: vec![], min_length: Some(500) };
        let v = ContentValidator::with_override(&over);
        let text = "a".repeat(300);
        assert!(!v.validate(&text, false).valid);
    }
}
