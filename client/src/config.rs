use std::env;

use serde::{Deserialize, Serialize};

fn default_api_base_url() -> String {
    "https://panel-api.basalam.com".to_string()
}

fn default_search_base_url() -> String {
    "https://search.basalam.com".to_string()
}

fn default_listing_base_url() -> String {
    "https://basalam.com".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
    /// Base for product listing pages shown to the user, e.g. `{base}/p/{id}`.
    #[serde(default = "default_listing_base_url")]
    pub listing_base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            search_base_url: default_search_base_url(),
            listing_base_url: default_listing_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Default config with `BASALAM_API_URL` / `BASALAM_SEARCH_URL` overrides applied.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = env::var("BASALAM_API_URL") {
            cfg.api_base_url = url;
        }
        if let Ok(url) = env::var("BASALAM_SEARCH_URL") {
            cfg.search_base_url = url;
        }
        cfg
    }

    pub fn listing_url(&self, product_id: u64) -> String {
        format!("{}/p/{}", self.listing_base_url.trim_end_matches('/'), product_id)
    }
}
