use std::env;

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
}

/// Process-wide configuration, built once at startup from the environment and
/// passed by reference into each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub shopify: ShopifyConfig,
    pub anthropic: AnthropicConfig,
}

#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Bare store host, e.g. `my-store.myshopify.com`.
    pub store_host: String,
    pub access_token: String,
    pub api_version: String,
}

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            shopify: ShopifyConfig {
                store_host: normalize_store_host(&require("SHOPIFY_STORE_URL")?),
                access_token: require("SHOPIFY_ACCESS_TOKEN")?,
                api_version: optional("SHOPIFY_API_VERSION")
                    .unwrap_or_else(|| "2023-04".to_string()),
            },
            anthropic: AnthropicConfig {
                api_key: require("CLAUDE_API_KEY")?,
                model: optional("CLAUDE_MODEL").unwrap_or_else(|| "claude-2.1".to_string()),
                base_url: optional("ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            },
        })
    }

    /// Redacted snapshot of the loaded configuration. Secrets are masked.
    pub fn log_startup(&self) {
        info!(
            target = "calliope",
            store = %self.shopify.store_host,
            api_version = %self.shopify.api_version,
            model = %self.anthropic.model,
            shopify_token = %mask(&self.shopify.access_token),
            claude_key = %mask(&self.anthropic.api_key),
            "configuration loaded",
        );
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(key)),
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Accepts `https://my-store.myshopify.com/` or a bare host and yields the host.
fn normalize_store_host(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 10 {
        return "***".to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_host_normalization_strips_scheme_and_slash() {
        assert_eq!(
            normalize_store_host("https://my-store.myshopify.com/"),
            "my-store.myshopify.com"
        );
        assert_eq!(
            normalize_store_host("my-store.myshopify.com"),
            "my-store.myshopify.com"
        );
        assert_eq!(
            normalize_store_host("  http://my-store.myshopify.com  "),
            "my-store.myshopify.com"
        );
    }

    #[test]
    fn missing_var_error_names_the_variable() {
        let err = ConfigError::MissingVar("CLAUDE_API_KEY");
        assert!(err.to_string().contains("CLAUDE_API_KEY"));
    }

    #[test]
    fn mask_hides_short_secrets_entirely() {
        assert_eq!(mask("short"), "***");
        let masked = mask("sk-ant-0123456789abcdef");
        assert!(masked.starts_with("sk-an"));
        assert!(masked.ends_with("bcdef"));
        assert!(!masked.contains("0123456789"));
    }
}
