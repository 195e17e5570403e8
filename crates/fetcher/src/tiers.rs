//! The three tier implementations (spec §4.1 `Fetcher.intelligence` /
//! `.lightweight` / `.playwright`). Each returns a [`TierOutput`] on success
//! or a classified [`AttemptFailure`] the cascade can act on.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use scraper::{Html, Selector};
use url::Url;
use webcascade_core::{AttemptFailure, ComponentTiming, DiscoveredApi, Tier};

use crate::playwright::{PlaywrightAdapter, PlaywrightError, PlaywrightOptions};
use crate::render;
use crate::sandbox;

pub struct TierOutput {
    pub final_url: String,
    pub html: String,
    pub title: Option<String>,
    pub text: String,
    pub markdown: String,
    pub links: Vec<String>,
    pub headings: Vec<String>,
    pub apis: Vec<DiscoveredApi>,
    pub has_semantic_element: bool,
    pub component: ComponentTiming,
}

pub fn build_client(user_agent: &str, max_redirects: u8) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent.to_string())
        .redirect(reqwest::redirect::Policy::limited(max_redirects as usize))
        .build()
}

/// Single HTTP GET, body decoded per `Content-Type` charset by `reqwest`'s
/// own handling, with a whole-call timeout (spec §4.1 per-tier timeout).
async fn http_get(client: &reqwest::Client, url: &Url, timeout_ms: u64) -> Result<(String, String), AttemptFailure> {
    let fetch = async {
        let response = client.get(url.clone()).send().await.map_err(classify_reqwest_error)?;
        let final_url = response.url().to_string();
        let status = response.status();
        let body = response.text().await.map_err(classify_reqwest_error)?;
        if let Some(failure) = classify_response(status, &body) {
            return Err(failure);
        }
        Ok((final_url, body))
    };

    match tokio::time::timeout(Duration::from_millis(timeout_ms), fetch).await {
        Ok(result) => result,
        Err(_) => Err(AttemptFailure::Timeout(timeout_ms)),
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> AttemptFailure {
    if err.is_timeout() {
        AttemptFailure::Timeout(0)
    } else {
        AttemptFailure::Network(err.to_string())
    }
}

/// Map a non-2xx response to a transient classification (spec §4.1:
/// `timeout`, `5xx`, `bot_challenge`, `rate_limit` fall through to the next
/// tier; only DNS failure / connection refused are `fatal_network`, and
/// those never reach this function since they fail before a response
/// exists).
fn classify_response(status: StatusCode, body: &str) -> Option<AttemptFailure> {
    if status.is_success() {
        return None;
    }
    let lower = body.to_lowercase();
    if status.as_u16() == 403
        && (lower.contains("captcha") || lower.contains("checking your browser") || lower.contains("cloudflare"))
    {
        return Some(AttemptFailure::BotChallenge);
    }
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Some(AttemptFailure::Auth);
    }
    if status.as_u16() == 429 {
        return Some(AttemptFailure::RateLimit);
    }
    if status.is_server_error() {
        return Some(AttemptFailure::Network(format!("server responded {status}")));
    }
    Some(AttemptFailure::Network(format!("unexpected status {status}")))
}

fn inline_scripts(document: &Html) -> Vec<String> {
    let selector = Selector::parse("script").unwrap();
    document
        .select(&selector)
        .filter(|el| el.value().attr("src").is_none())
        .map(|el| el.text().collect::<String>())
        .collect()
}

/// Static HTTP GET + HTML parse. Scripts are never executed (spec §4.1).
pub async fn fetch_intelligence(client: &reqwest::Client, url: &Url, timeout_ms: u64) -> Result<TierOutput, AttemptFailure> {
    let network_started = Instant::now();
    let (final_url, body) = http_get(client, url, timeout_ms).await?;
    let network_ms = network_started.elapsed().as_millis() as u64;

    let parse_started = Instant::now();
    let document = Html::parse_document(&body);
    let parsing_ms = parse_started.elapsed().as_millis() as u64;

    let base = Url::parse(&final_url).unwrap_or_else(|_| url.clone());
    let extraction_started = Instant::now();
    let rendered = render::render(&document, &base);
    let apis = render::extract_discovered_apis(&document, &base, Tier::Intelligence);
    let title = render::extract_title(&document);
    let has_semantic_element = render::has_semantic_element(&document);
    let extraction_ms = extraction_started.elapsed().as_millis() as u64;

    Ok(TierOutput {
        final_url,
        html: body,
        title,
        text: rendered.text,
        markdown: rendered.markdown,
        links: rendered.links,
        headings: rendered.headings,
        apis,
        has_semantic_element,
        component: ComponentTiming { network_ms, parsing_ms, js_execution_ms: 0, extraction_ms },
    })
}

/// Same GET + DOM build as intelligence, but inline scripts run through the
/// sandbox (spec §4.1 `Fetcher.lightweight`).
pub async fn fetch_lightweight(
    client: &reqwest::Client,
    url: &Url,
    timeout_ms: u64,
    script_budget_ms: u64,
) -> Result<TierOutput, AttemptFailure> {
    let network_started = Instant::now();
    let (final_url, body) = http_get(client, url, timeout_ms).await?;
    let network_ms = network_started.elapsed().as_millis() as u64;

    let parse_started = Instant::now();
    let pre_document = Html::parse_document(&body);
    let scripts = inline_scripts(&pre_document);
    let parsing_ms = parse_started.elapsed().as_millis() as u64;

    let js_started = Instant::now();
    let script_refs: Vec<&str> = scripts.iter().map(String::as_str).collect();
    let outcome = sandbox::run(&script_refs);
    if outcome.timed_out {
        return Err(AttemptFailure::Timeout(script_budget_ms));
    }
    let mutated_html = sandbox::apply_mutations(&body, &outcome.mutations);
    let js_execution_ms = js_started.elapsed().as_millis() as u64;

    let document = Html::parse_document(&mutated_html);
    let base = Url::parse(&final_url).unwrap_or_else(|_| url.clone());
    let extraction_started = Instant::now();
    let rendered = render::render(&document, &base);
    let apis = render::extract_discovered_apis(&document, &base, Tier::Lightweight);
    let title = render::extract_title(&document);
    let has_semantic_element = render::has_semantic_element(&document);
    let extraction_ms = extraction_started.elapsed().as_millis() as u64;

    Ok(TierOutput {
        final_url,
        html: mutated_html,
        title,
        text: rendered.text,
        markdown: rendered.markdown,
        links: rendered.links,
        headings: rendered.headings,
        apis,
        has_semantic_element,
        component: ComponentTiming { network_ms, parsing_ms, js_execution_ms, extraction_ms },
    })
}

/// Delegates to the external headless-browser adapter, then runs the same
/// script-dependent extraction lightweight uses so markdown stays
/// consistent across tiers (spec §4.1 `Fetcher.playwright`).
pub async fn fetch_playwright(
    adapter: &dyn PlaywrightAdapter,
    url: &Url,
    opts: &PlaywrightOptions,
    script_budget_ms: u64,
) -> Result<TierOutput, AttemptFailure> {
    let network_started = Instant::now();
    let rendered = adapter.render(url.as_str(), opts).await.map_err(classify_playwright_error)?;
    let network_ms = network_started.elapsed().as_millis() as u64;

    let parse_started = Instant::now();
    let pre_document = Html::parse_document(&rendered.html);
    let scripts = inline_scripts(&pre_document);
    let parsing_ms = parse_started.elapsed().as_millis() as u64;

    let js_started = Instant::now();
    let script_refs: Vec<&str> = scripts.iter().map(String::as_str).collect();
    let outcome = sandbox::run(&script_refs);
    if outcome.timed_out {
        return Err(AttemptFailure::Timeout(script_budget_ms));
    }
    let mutated_html = sandbox::apply_mutations(&rendered.html, &outcome.mutations);
    let js_execution_ms = js_started.elapsed().as_millis() as u64;

    let base = Url::parse(&rendered.final_url).unwrap_or_else(|_| url.clone());
    let document = Html::parse_document(&mutated_html);
    let extraction_started = Instant::now();
    let content = render::render(&document, &base);
    let mut apis = render::extract_discovered_apis(&document, &base, Tier::Playwright);
    apis.extend(rendered.network_requests.iter().map(|req| DiscoveredApi {
        method: req.method.clone(),
        url: req.url.clone(),
        status: req.status,
        content_type: req.content_type.clone(),
        observed_during_tier: Tier::Playwright,
    }));
    let title = render::extract_title(&document);
    let has_semantic_element = render::has_semantic_element(&document);
    let extraction_ms = extraction_started.elapsed().as_millis() as u64;

    Ok(TierOutput {
        final_url: rendered.final_url,
        html: mutated_html,
        title,
        text: content.text,
        markdown: content.markdown,
        links: content.links,
        headings: content.headings,
        apis,
        has_semantic_element,
        component: ComponentTiming { network_ms, parsing_ms, js_execution_ms, extraction_ms },
    })
}

fn classify_playwright_error(err: PlaywrightError) -> AttemptFailure {
    match err {
        PlaywrightError::Timeout(ms) => AttemptFailure::Timeout(ms),
        PlaywrightError::Unavailable => {
            AttemptFailure::Validation { reasons: vec!["playwright_unavailable".to_string()] }
        }
        PlaywrightError::Other(msg) => AttemptFailure::Network(msg),
    }
}
