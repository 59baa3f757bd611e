use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use cryptofolio_market_data::GatewayConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub gateway: GatewayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_millis(30000),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the server config from an arbitrary variable source.
    ///
    /// Server settings must parse; gateway tunables fall back to their
    /// defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("CF_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid CF_LISTEN_ADDR")?;
        let cors_allow = lookup("CF_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = match lookup("CF_REQUEST_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid CF_REQUEST_TIMEOUT_MS: {raw:?}"))?,
            None => 30000,
        };
        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            gateway: GatewayConfig::from_lookup(&lookup),
        })
    }
}
