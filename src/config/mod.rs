// Configuration Management Module
// Handles eshop.toml loading, defaults, and validation

pub mod paypal;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, Context};
use tracing::{info, warn};

pub use paypal::{PayPalConfig, PayPalMode};

/// Main storefront configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub shop: StoreConfig,

    #[serde(default)]
    pub paypal: PayPalConfig,

    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; ":memory:" keeps everything in RAM
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Session lifetimes, all in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    #[serde(default)]
    pub cookie_secure: bool,

    /// Idle lifetime of a whole session and of its cookie
    #[serde(default = "default_session_lifetime")]
    pub lifetime_secs: u64,

    #[serde(default = "default_basket_expiration")]
    pub basket_expiration_secs: u64,

    /// Inactivity logout
    #[serde(default = "default_login_expiration")]
    pub login_expiration_secs: u64,

    /// How long the order resume stays reachable after checkout
    #[serde(default = "default_order_expiration")]
    pub order_expiration_secs: u64,

    #[serde(default = "default_back_link_expiration")]
    pub back_link_expiration_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

/// Storefront identity used in mails and payment descriptions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_title")]
    pub title: String,

    /// Public base URL, used to build PayPal return links
    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_email")]
    pub email: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Directory holding `products/` and `noimg.png`
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailConfig {
    /// When set, every outgoing mail is also written here as a file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

// Default value functions
fn default_port() -> u16 { 8080 }
fn default_bind_addr() -> String { "0.0.0.0".to_string() }
fn default_database_path() -> String { "eshop.sqlite".to_string() }
fn default_cookie_name() -> String { "MAIN".to_string() }
fn default_session_lifetime() -> u64 { 60 * 60 * 24 * 14 }
fn default_basket_expiration() -> u64 { 60 * 60 * 24 * 14 }
fn default_login_expiration() -> u64 { 60 * 60 * 24 * 7 }
fn default_order_expiration() -> u64 { 60 * 10 }
fn default_back_link_expiration() -> u64 { 60 * 10 }
fn default_sweep_interval() -> u64 { 60 * 5 }
fn default_title() -> String { "Inside".to_string() }
fn default_domain() -> String { "http://localhost:8080".to_string() }
fn default_email() -> String { "shop@localhost".to_string() }
fn default_currency() -> String { "GBP".to_string() }
fn default_images_dir() -> PathBuf { PathBuf::from("www/images") }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            cookie_secure: false,
            lifetime_secs: default_session_lifetime(),
            basket_expiration_secs: default_basket_expiration(),
            login_expiration_secs: default_login_expiration(),
            order_expiration_secs: default_order_expiration(),
            back_link_expiration_secs: default_back_link_expiration(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl SessionConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    pub fn basket_expiration(&self) -> Duration {
        Duration::from_secs(self.basket_expiration_secs)
    }

    pub fn login_expiration(&self) -> Duration {
        Duration::from_secs(self.login_expiration_secs)
    }

    pub fn order_expiration(&self) -> Duration {
        Duration::from_secs(self.order_expiration_secs)
    }

    pub fn back_link_expiration(&self) -> Duration {
        Duration::from_secs(self.back_link_expiration_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            domain: default_domain(),
            email: default_email(),
            currency: default_currency(),
            images_dir: default_images_dir(),
        }
    }
}

impl ShopConfig {
    /// Load configuration from file or use defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let contents = std::fs::read_to_string(path)
                .context("Failed to read configuration file")?;

            let config: ShopConfig = toml::from_str(&contents)
                .context("Failed to parse configuration file")?;

            config.validate()?;
            Ok(config)
        } else {
            warn!("Configuration file not found, using defaults");
            info!("Create eshop.toml to customize configuration");
            Ok(Self::default())
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.path.trim().is_empty() {
            anyhow::bail!("Database path cannot be empty");
        }

        let session = &self.session;
        if session.cookie_name.is_empty()
            || !session.cookie_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!("Session cookie name must be non-empty and alphanumeric");
        }

        if session.lifetime_secs == 0 {
            anyhow::bail!("Session lifetime must be positive");
        }

        if session.sweep_interval_secs == 0 {
            anyhow::bail!("Session sweep interval must be positive");
        }

        for (name, secs) in [
            ("basket", session.basket_expiration_secs),
            ("login", session.login_expiration_secs),
            ("order", session.order_expiration_secs),
            ("back link", session.back_link_expiration_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("The {} expiration must be positive", name);
            }
            if secs > session.lifetime_secs {
                anyhow::bail!("The {} expiration cannot exceed the session lifetime", name);
            }
        }

        if self.shop.currency.len() != 3 || !self.shop.currency.chars().all(|c| c.is_ascii_uppercase()) {
            anyhow::bail!("Currency must be a three letter ISO code");
        }

        if !self.shop.domain.starts_with("http://") && !self.shop.domain.starts_with("https://") {
            anyhow::bail!("Shop domain must be an absolute http(s) URL");
        }

        self.paypal.validate()?;

        Ok(())
    }
}
