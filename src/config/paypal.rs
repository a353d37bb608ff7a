// PayPal REST credentials and environment selection

use serde::{Deserialize, Serialize};

/// PayPal environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayPalMode {
    #[default]
    Sandbox,
    Live,
}

impl PayPalMode {
    pub fn api_base(self) -> &'static str {
        match self {
            PayPalMode::Sandbox => "https://api.sandbox.paypal.com",
            PayPalMode::Live => "https://api.paypal.com",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayPalConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub mode: PayPalMode,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub secret: String,

    /// Overrides the mode's API host (useful against a local mock)
    #[serde(default)]
    pub api_base: Option<String>,
}

impl PayPalConfig {
    pub fn api_base(&self) -> String {
        self.api_base
            .clone()
            .unwrap_or_else(|| self.mode.api_base().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enabled {
            if self.client_id.is_empty() {
                anyhow::bail!("PayPal client_id is required when PayPal is enabled");
            }

            if self.secret.is_empty() {
                anyhow::bail!("PayPal secret is required when PayPal is enabled");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_override() {
        let config = PayPalConfig {
            api_base: Some("http://127.0.0.1:9999/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.api_base(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_enabled_requires_credentials() {
        let config = PayPalConfig {
            enabled: true,
            mode: PayPalMode::Live,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.api_base(), "https://api.paypal.com");
    }
}
