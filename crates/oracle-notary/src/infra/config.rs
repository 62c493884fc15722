//! Immutable, build-time-embedded configuration.
//!
//! Embedding the config as a build-time asset (rather than reading it from
//! the filesystem or environment at request time) is required for SGX
//! measurement reproducibility: the enclave's identity is a hash of its
//! loaded binary, so anything that could change behavior at runtime without
//! changing the measurement is a problem. `include_str!` ties the JSON
//! asset's bytes to the compiled binary the same way the rest of the
//! program's logic is.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;

const DEFAULT_CONFIG_JSON: &str = include_str!("../../config/default.json");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse embedded config asset: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigAsset {
    port: u16,
    #[serde(rename = "metricsPort")]
    metrics_port: u16,
    #[serde(rename = "logLevel")]
    log_level: String,
    #[serde(rename = "whitelistedDomains")]
    whitelisted_domains: IndexSet<String>,
    #[serde(rename = "symbolExchanges")]
    symbol_exchanges: IndexMap<String, Vec<String>>,
    #[serde(rename = "exchangeUrlTemplates")]
    exchange_url_templates: HashMap<String, String>,
}

/// The process-wide immutable configuration, loaded once at startup and
/// threaded explicitly through [`crate::domain::RuntimeContext`] — never
/// re-read from the environment or filesystem once the process is up.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub log_level: String,
    pub whitelisted_domains: IndexSet<String>,
    symbol_exchanges: IndexMap<String, Vec<String>>,
    exchange_url_templates: HashMap<String, String>,
}

impl RuntimeConfig {
    /// Parse the embedded default config asset.
    pub fn load_embedded() -> Result<Self, ConfigError> {
        Self::parse(DEFAULT_CONFIG_JSON)
    }

    /// Parse an arbitrary config asset, in the same shape as
    /// `config/default.json`. Exists for integration tests that need to
    /// point exchange/whitelist entries at a local mock server; production
    /// code always goes through [`Self::load_embedded`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::parse(json)
    }

    fn parse(json: &str) -> Result<Self, ConfigError> {
        let asset: ConfigAsset = serde_json::from_str(json)?;
        Ok(Self {
            port: asset.port,
            metrics_port: asset.metrics_port,
            log_level: asset.log_level,
            whitelisted_domains: asset.whitelisted_domains,
            symbol_exchanges: asset.symbol_exchanges,
            exchange_url_templates: asset.exchange_url_templates,
        })
    }

    /// Exchanges configured to back `symbol`'s price feed, in the fixed
    /// order they appear in the config asset.
    pub fn exchanges_for(&self, symbol: &str) -> Vec<String> {
        self.symbol_exchanges
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve `exchange`'s URL template for `symbol`.
    pub fn exchange_url(&self, exchange: &str, symbol: &str) -> String {
        let template = self
            .exchange_url_templates
            .get(exchange)
            .map(String::as_str)
            .unwrap_or("");
        template
            .replace("{symbol}", symbol)
            .replace("{symbol_lower}", &symbol.to_ascii_lowercase())
    }
}
