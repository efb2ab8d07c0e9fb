use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: String,
    pub database_url: Option<String>,
    pub cart_service_url: String,
    pub product_service_url: String,
    /// Unset selects the in-process payment mock.
    pub payment_service_url: Option<String>,
    pub notification_service_url: String,
    pub gateway_timeout: Duration,
    pub payment_currency: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let timeout_ms: u64 = var("GATEWAY_TIMEOUT_MS", "5000")
            .trim()
            .parse()
            .context("GATEWAY_TIMEOUT_MS must be a whole number of milliseconds")?;
        let server_port = var("SERVER_PORT", "3004");
        server_port
            .parse::<u16>()
            .with_context(|| format!("SERVER_PORT {server_port:?} is not a valid port"))?;

        Ok(Self {
            server_port,
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            cart_service_url: var("CART_SERVICE_URL", "http://localhost:3003"),
            product_service_url: var("PRODUCT_SERVICE_URL", "http://localhost:3002"),
            payment_service_url: lookup("PAYMENT_SERVICE_URL").filter(|s| !s.is_empty()),
            notification_service_url: var("NOTIFICATION_SERVICE_URL", "http://localhost:3006"),
            gateway_timeout: Duration::from_millis(timeout_ms),
            payment_currency: var("PAYMENT_CURRENCY", "usd").to_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.server_port, "3004");
        assert_eq!(cfg.cart_service_url, "http://localhost:3003");
        assert_eq!(cfg.product_service_url, "http://localhost:3002");
        assert_eq!(cfg.notification_service_url, "http://localhost:3006");
        assert_eq!(cfg.gateway_timeout, Duration::from_millis(5000));
        assert_eq!(cfg.payment_currency, "usd");
        assert!(cfg.payment_service_url.is_none());
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn overrides_and_malformed_numbers() {
        let cfg = Config::from_lookup(lookup(&[
            ("GATEWAY_TIMEOUT_MS", "250"),
            ("PAYMENT_SERVICE_URL", "http://payments:3005"),
            ("PAYMENT_CURRENCY", "INR"),
        ]))
        .unwrap();
        assert_eq!(cfg.gateway_timeout, Duration::from_millis(250));
        assert_eq!(cfg.payment_service_url.as_deref(), Some("http://payments:3005"));
        assert_eq!(cfg.payment_currency, "inr");

        assert!(Config::from_lookup(lookup(&[("GATEWAY_TIMEOUT_MS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SERVER_PORT", "http")])).is_err());
    }
}
