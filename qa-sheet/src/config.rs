//! Configuration resolution for qa-sheet
//!
//! Product-count API base URL priority: CLI → `QA_API_BASE_URL` → TOML → compiled default.

use qa_common::config::{TomlConfig, DEFAULT_API_BASE_URL};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the product-count API base URL
pub const API_BASE_URL_ENV: &str = "QA_API_BASE_URL";

fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

/// Resolve the product-count API base URL
pub fn resolve_api_base_url(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    let env_url = std::env::var(API_BASE_URL_ENV).ok();
    let toml_url = toml_config.api.base_url.as_deref();

    let candidates = [
        ("command line", cli_arg),
        ("environment", env_url.as_deref()),
        ("TOML", toml_url),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, url)| url.map(is_valid_url).unwrap_or(false))
        .map(|(source, _)| *source)
        .collect();
    if sources.len() > 1 {
        warn!(
            "API base URL found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (source, url) in candidates {
        match url {
            Some(url) if is_valid_url(url) => {
                info!("API base URL loaded from {}", source);
                return url.trim().trim_end_matches('/').to_string();
            }
            Some(url) => warn!("Ignoring malformed API base URL from {}: {}", source, url),
            None => {}
        }
    }

    DEFAULT_API_BASE_URL.to_string()
}

/// Bounded timeout applied to every remote call
pub fn request_timeout(toml_config: &TomlConfig) -> Duration {
    Duration::from_secs(toml_config.api.request_timeout_seconds.max(1))
}
