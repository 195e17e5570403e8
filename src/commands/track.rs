use anyhow::Result;
use chrono::Utc;
use webcascade_content::TrackOptions;
use webcascade_core::FetchOptions;

use crate::core::Core;

async fn resolve_content(core: &Core, url: &str, content_file: Option<String>) -> Result<String> {
    if let Some(path) = content_file {
        return Ok(std::fs::read_to_string(path)?);
    }
    let result = core.fetcher.fetch(url, &FetchOptions::default()).await?;
    Ok(result.text)
}

pub async fn run(core: &Core, url: String, content_file: Option<String>, label: Option<String>, tags: Vec<String>) -> Result<()> {
    let content = resolve_content(core, &url, content_file).await?;
    let now_ms = Utc::now().timestamp_millis();
    core.content.track_url(&url, &content, TrackOptions { label, tags }, now_ms);
    println!("tracking {url} ({} chars)", content.len());
    Ok(())
}
