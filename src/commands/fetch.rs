use anyhow::{bail, Result};
use webcascade_core::{FetchOptions, Tier};

use crate::core::Core;

fn parse_tier(raw: &str) -> Result<Tier> {
    match raw.to_lowercase().as_str() {
        "intelligence" => Ok(Tier::Intelligence),
        "lightweight" => Ok(Tier::Lightweight),
        "playwright" => Ok(Tier::Playwright),
        other => bail!("unknown tier '{other}', expected intelligence|lightweight|playwright"),
    }
}

pub async fn run(core: &Core, url: String, tier: Option<String>, timeout_ms: Option<u64>, no_validate: bool) -> Result<()> {
    let options = FetchOptions {
        tier: tier.map(|t| parse_tier(&t)).transpose()?,
        timeout_ms,
        validate_content: Some(!no_validate),
        ..Default::default()
    };

    match core.fetcher.fetch(&url, &options).await {
        Ok(result) => {
            println!("final_tier:     {}", result.final_tier);
            println!("tiers_attempted: {:?}", result.tiers_attempted);
            println!("fell_back:      {}", result.fell_back);
            println!("cost_units:     {}", result.cost_units);
            println!("title:          {}", result.title.unwrap_or_default());
            println!("load_time_ms:   {}", result.metadata.load_time_ms);
            println!("apis_found:     {}", result.apis.len());
            println!();
            println!("{}", result.text);
        }
        Err(err) => {
            println!("fetch failed: {} ({:?})", err.message, err.kind);
            for attempt in &err.attempts {
                println!("  tier={} duration_ms={} reason={:?}", attempt.tier, attempt.duration_ms, attempt.reason);
            }
        }
    }

    Ok(())
}
