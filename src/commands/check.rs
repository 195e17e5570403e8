use anyhow::Result;
use chrono::Utc;
use webcascade_core::FetchOptions;

use crate::core::Core;

pub async fn run(core: &Core, url: String, content_file: Option<String>) -> Result<()> {
    let content = if let Some(path) = content_file {
        std::fs::read_to_string(path)?
    } else {
        core.fetcher.fetch(&url, &FetchOptions::default()).await?.text
    };

    let now_ms = Utc::now().timestamp_millis();
    let result = core.content.check_for_changes(&url, &content, now_ms);

    if !result.is_tracked {
        println!("{url} is not tracked");
        return Ok(());
    }
    if result.is_first_check {
        println!("{url} tracked but this is the first check");
        return Ok(());
    }
    if !result.has_changed {
        println!("{url} unchanged");
        return Ok(());
    }

    let report = result.change_report.expect("has_changed implies a report");
    println!("{url} changed: severity={:?}", report.severity);
    for change in &report.block_changes {
        println!("  {:?} significance={:?}: {}", change.kind, change.significance, truncate(&change.content, 80));
    }
    if !report.key_values.currency.is_empty() {
        println!("  new currency values: {:?}", report.key_values.currency);
    }
    if !report.key_values.percentages.is_empty() {
        println!("  new percentages: {:?}", report.key_values.percentages);
    }
    if !report.key_values.durations.is_empty() {
        println!("  new durations: {:?}", report.key_values.durations);
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect::<String>() + "…"
    }
}
