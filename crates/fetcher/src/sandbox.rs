//! The lightweight tier's inline-script sandbox (spec §4.1): "a
//! single-threaded JS evaluator bound to a minimal DOM facade (query
//! selectors, `innerText`, attribute reads/writes, no network)".
//!
//! Rather than embed a general JS engine the pack never carries, this is a
//! narrow, explicit interpreter for a whitelisted subset of statement
//! shapes, operating directly on the raw HTML string (SPEC_FULL.md §4.1,
//! §9 resolution #4). Anything outside the whitelist — real control flow,
//! arithmetic, fetches — is simply not recognized and left as a no-op,
//! so pages carrying real application JS degrade to "no mutation" instead
//! of failing the tier.

use once_cell::sync::Lazy;
use regex::Regex;

/// Stand-in for the 2-second CPU budget (spec §4.1): the interpreter has no
/// unbounded loops to preempt, so the budget is expressed as a ceiling on
/// whitelisted statements processed across all inline scripts on the page
/// (SPEC_FULL.md §9 resolution #2).
const OPERATION_BUDGET: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    SetInnerText(String),
    AppendText(String),
    SetAttribute { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomMutation {
    pub selector: String,
    pub kind: MutationKind,
}

#[derive(Debug, Clone, Default)]
pub struct SandboxOutcome {
    pub mutations: Vec<DomMutation>,
    pub timed_out: bool,
}

static SET_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)document\.(?:querySelector|getElementById)\(\s*["']([^"']+)["']\s*\)\s*\.\s*(?:innerText|textContent)\s*=\s*["']([^"']*)["']"#,
    )
    .unwrap()
});

static APPEND_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)document\.(?:querySelector|getElementById)\(\s*["']([^"']+)["']\s*\)\s*\.\s*(?:innerText|textContent)\s*\+=\s*["']([^"']*)["']"#,
    )
    .unwrap()
});

static SET_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)document\.(?:querySelector|getElementById)\(\s*["']([^"']+)["']\s*\)\s*\.\s*setAttribute\(\s*["']([^"']+)["']\s*,\s*["']([^"']*)["']\s*\)"#,
    )
    .unwrap()
});

/// Evaluate every inline script body. Scripts with a `src` attribute must
/// never be passed here (spec §4.1 "`<script src>` is ignored").
pub fn run(inline_scripts: &[&str]) -> SandboxOutcome {
    let mut mutations = Vec::new();
    let mut ops = 0usize;
    let mut timed_out = false;

    'scripts: for script in inline_scripts {
        for statement in script.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            ops += 1;
            if ops > OPERATION_BUDGET {
                timed_out = true;
                break 'scripts;
            }

            if let Some(caps) = SET_TEXT.captures(statement) {
                mutations.push(DomMutation {
                    selector: caps[1].to_string(),
                    kind: MutationKind::SetInnerText(caps[2].to_string()),
                });
            } else if let Some(caps) = APPEND_TEXT.captures(statement) {
                mutations.push(DomMutation {
                    selector: caps[1].to_string(),
                    kind: MutationKind::AppendText(caps[2].to_string()),
                });
            } else if let Some(caps) = SET_ATTR.captures(statement) {
                mutations.push(DomMutation {
                    selector: caps[1].to_string(),
                    kind: MutationKind::SetAttribute {
                        name: caps[2].to_string(),
                        value: caps[3].to_string(),
                    },
                });
            }
            // Anything else falls outside the whitelist and is a no-op.
        }
    }

    SandboxOutcome { mutations, timed_out }
}

enum SelectorKind<'a> {
    Id(&'a str),
    Class(&'a str),
    IdOrTag(&'a str),
}

fn selector_kind(selector: &str) -> SelectorKind<'_> {
    if let Some(rest) = selector.strip_prefix('#') {
        SelectorKind::Id(rest)
    } else if let Some(rest) = selector.strip_prefix('.') {
        SelectorKind::Class(rest)
    } else {
        SelectorKind::IdOrTag(selector)
    }
}

/// Find the first element matching `selector`, returning
/// `(open_tag_start, open_tag_end, content_end)` byte offsets into `html`.
fn locate_element(html: &str, selector: &str) -> Option<(usize, usize, usize)> {
    let pattern = match selector_kind(selector) {
        SelectorKind::Id(id) => format!(
            r#"(?is)<[a-z][a-z0-9]*\b[^>]*\bid\s*=\s*["']{}["'][^>]*>"#,
            regex::escape(id)
        ),
        SelectorKind::Class(class) => format!(
            r#"(?is)<[a-z][a-z0-9]*\b[^>]*\bclass\s*=\s*["'][^"']*\b{}\b[^"']*["'][^>]*>"#,
            regex::escape(class)
        ),
        SelectorKind::IdOrTag(name) => format!(
            r#"(?is)<[a-z][a-z0-9]*\b[^>]*\bid\s*=\s*["']{0}["'][^>]*>|<{0}\b[^>]*>"#,
            regex::escape(name)
        ),
    };
    let re = Regex::new(&pattern).ok()?;
    let m = re.find(html)?;
    let content_end = html[m.end()..].find("</").map(|i| m.end() + i).unwrap_or(html.len());
    Some((m.start(), m.end(), content_end))
}

/// Apply whitelisted mutations to raw HTML before the final parse (spec
/// §4.1: "mutations ... retained in the parsed content").
pub fn apply_mutations(html: &str, mutations: &[DomMutation]) -> String {
    let mut out = html.to_string();
    for mutation in mutations {
        let Some((open_start, open_end, content_end)) = locate_element(&out, &mutation.selector) else {
            continue;
        };
        match &mutation.kind {
            MutationKind::SetInnerText(value) => {
                out.replace_range(open_end..content_end, value);
            }
            MutationKind::AppendText(value) => {
                let existing = out[open_end..content_end].to_string();
                out.replace_range(open_end..content_end, &format!("{existing}{value}"));
            }
            MutationKind::SetAttribute { name, value } => {
                let open_tag = &out[open_start..open_end];
                let close_rel = open_tag.rfind('>').unwrap_or(open_tag.len());
                let insertion_point = if close_rel > 0 && open_tag[..close_rel].ends_with('/') {
                    open_start + close_rel - 1
                } else {
                    open_start + close_rel
                };
                let attr = format!(r#" {}="{}""#, name, value.replace('"', "&quot;"));
                out.insert_str(insertion_point, &attr);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_set_inner_text_by_id() {
        let outcome = run(&[r#"document.getElementById("title").innerText = "Updated""#]);
        assert_eq!(outcome.mutations.len(), 1);
        assert!(matches!(&outcome.mutations[0].kind, MutationKind::SetInnerText(v) if v == "Updated"));
    }

    #[test]
    fn recognizes_set_attribute() {
        let outcome = run(&[r#"document.querySelector(".badge").setAttribute("data-state", "ready")"#]);
        assert_eq!(outcome.mutations.len(), 1);
        assert!(matches!(
            &outcome.mutations[0].kind,
            MutationKind::SetAttribute { name, value } if name == "data-state" && value == "ready"
        ));
    }

    #[test]
    fn ignores_unsupported_statements() {
        let outcome = run(&["for (let i = 0; i < 10; i++) { doSomething(i) }"]);
        assert!(outcome.mutations.is_empty());
    }

    #[test]
    fn applies_inner_text_mutation_to_raw_html() {
        let html = r#"<div id="title">Loading…</div>"#;
        let mutations = vec![DomMutation {
            selector: "#title".to_string(),
            kind: MutationKind::SetInnerText("Ready".to_string()),
        }];
        let out = apply_mutations(html, &mutations);
        assert!(out.contains("Ready"));
        assert!(!out.contains("Loading"));
    }

    #[test]
    fn applies_set_attribute_mutation() {
        let html = r#"<span class="badge">x</span>"#;
        let mutations = vec![DomMutation {
            selector: ".badge".to_string(),
            kind: MutationKind::SetAttribute { name: "data-state".to_string(), value: "ready".to_string() },
        }];
        let out = apply_mutations(html, &mutations);
        assert!(out.contains(r#"data-state="ready""#));
    }

    #[test]
    fn overrunning_operation_budget_is_reported_as_timed_out() {
        let script = "document.getElementById('a').innerText = 'x';".repeat(OPERATION_BUDGET + 10);
        let outcome = run(&[&script]);
        assert!(outcome.timed_out);
    }
}
