use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::experiments::ExperimentDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cdn: CdnConfig,
    pub sampler: SamplerConfig,
    pub sponsored: SponsoredConfig,
    pub experiments: ExperimentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnConfig {
    /// Base URL the per-domain manifests, feeds and top lists are served from.
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Whether unresolved pages fall back to the per-domain fallback feed.
    pub fallback_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Probability of exploiting the top-items order for a first-impression
    /// visitor. The remainder explores with a full shuffle.
    pub exploit_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsoredConfig {
    /// Sponsored feed endpoint. Unset disables the sponsored branch.
    pub endpoint: Option<String>,
    /// Hard budget for the sponsored fetch. On expiry the widget renders
    /// without sponsored items.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentsConfig {
    pub definitions: Vec<ExperimentDefinition>,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            cdn: CdnConfig {
                base_url: std::env::var("CDN_BASE_URL")
                    .unwrap_or_else(|_| "https://cdn.curio.dev".to_string()),
                request_timeout_secs: std::env::var("CDN_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                fallback_enabled: std::env::var("FALLBACK_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
            },
            sampler: SamplerConfig {
                exploit_probability: std::env::var("EXPLOIT_PROBABILITY")
                    .unwrap_or_else(|_| "0.8".to_string())
                    .parse()?,
            },
            sponsored: SponsoredConfig {
                endpoint: std::env::var("SPONSORED_ENDPOINT").ok(),
                timeout_ms: std::env::var("SPONSORED_TIMEOUT_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()?,
            },
            experiments: ExperimentsConfig {
                definitions: parse_experiments(
                    &std::env::var("EXPERIMENTS").unwrap_or_else(|_| "[]".to_string()),
                ),
            },
        })
    }
}

/// `EXPERIMENTS` is a JSON array of `{name, variants}` objects. A malformed
/// value disables experiments rather than failing startup.
fn parse_experiments(raw: &str) -> Vec<ExperimentDefinition> {
    match serde_json::from_str(raw) {
        Ok(definitions) => definitions,
        Err(error) => {
            warn!(%error, "EXPERIMENTS is not valid JSON, running without experiments");
            Vec::new()
        }
    }
}
