//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WHATSAPP_PHONE` - Number that receives orders (international format)
//!
//! ## Optional
//! - `STORE_CURRENCY` - ISO 4217 code for carts and prices (default: ARS)
//! - `ORDER_GREETING` - First line of the order message
//! - `CART_STORAGE_DIR` - Directory for persisted carts (default: .cart-storage)
//! - `CART_STORAGE_KEY` - Key prefix for persisted carts (default: cart-storage)
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

use crate::checkout::{CheckoutSettings, WhatsAppNumber, DEFAULT_GREETING};
use crate::store::DEFAULT_STORAGE_KEY;

const DEFAULT_CURRENCY: &str = "ARS";
const DEFAULT_STORAGE_DIR: &str = ".cart-storage";
const DEFAULT_PORT: u16 = 8083;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Currency every cart is kept in
    pub currency: String,
    /// Where and how orders are handed off
    pub checkout: CheckoutSettings,
    /// Directory for file-backed cart storage
    pub storage_dir: PathBuf,
    /// Prefix for per-session storage keys
    pub storage_key: String,
}

impl StorefrontConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let phone = get("WHATSAPP_PHONE").ok_or_else(|| ConfigError::MissingEnvVar("WHATSAPP_PHONE".into()))?;
        let whatsapp = WhatsAppNumber::parse(&phone)
            .map_err(|e| ConfigError::InvalidEnvVar("WHATSAPP_PHONE".into(), e.to_string()))?;

        let currency = get("STORE_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()).to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidEnvVar("STORE_CURRENCY".into(), format!("{currency:?} is not an ISO 4217 code")));
        }

        let host = match get("HOST") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidEnvVar("HOST".into(), format!("{e}")))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidEnvVar("PORT".into(), format!("{e}")))?,
            None => DEFAULT_PORT,
        };

        let mut checkout = CheckoutSettings::new(whatsapp);
        checkout.greeting = get("ORDER_GREETING").unwrap_or_else(|| DEFAULT_GREETING.to_string());

        Ok(Self {
            host,
            port,
            currency,
            checkout,
            storage_dir: get("CART_STORAGE_DIR").map_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR), PathBuf::from),
            storage_key: get("CART_STORAGE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string()),
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        StorefrontConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("WHATSAPP_PHONE", "+54 9 11 5555-0000")]).unwrap();
        assert_eq!(config.checkout.whatsapp.as_str(), "5491155550000");
        assert_eq!(config.checkout.greeting, DEFAULT_GREETING);
        assert_eq!(config.currency, "ARS");
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8083");
        assert_eq!(config.storage_dir, PathBuf::from(".cart-storage"));
        assert_eq!(config.storage_key, "cart-storage");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("WHATSAPP_PHONE", "5491155550000"),
            ("STORE_CURRENCY", "usd"),
            ("ORDER_GREETING", "Hi! New order:"),
            ("HOST", "127.0.0.1"),
            ("PORT", "3000"),
            ("CART_STORAGE_DIR", "/var/lib/carts"),
        ])
        .unwrap();
        assert_eq!(config.currency, "USD");
        assert_eq!(config.checkout.greeting, "Hi! New order:");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.storage_dir, PathBuf::from("/var/lib/carts"));
    }

    #[test]
    fn test_missing_phone() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingEnvVar(v)) if v == "WHATSAPP_PHONE"));
        assert!(matches!(load(&[("WHATSAPP_PHONE", "  ")]), Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(load(&[("WHATSAPP_PHONE", "call me")]), Err(ConfigError::InvalidEnvVar(v, _)) if v == "WHATSAPP_PHONE"));
        assert!(matches!(load(&[("WHATSAPP_PHONE", "5491155550000"), ("PORT", "http")]), Err(ConfigError::InvalidEnvVar(v, _)) if v == "PORT"));
        assert!(matches!(load(&[("WHATSAPP_PHONE", "5491155550000"), ("STORE_CURRENCY", "PESOS")]), Err(ConfigError::InvalidEnvVar(v, _)) if v == "STORE_CURRENCY"));
    }
}
