//! API process configuration.

use std::net::SocketAddr;

use thiserror::Error;
use tracing::warn;

use invoicechain_infra::{ConfigError, RegistryConfig};

pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiConfigError {
    #[error("invalid value for BIND_ADDR: {0}")]
    BindAddr(String),

    #[error(transparent)]
    Registry(#[from] ConfigError),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub registry: RegistryConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ApiConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiConfigError> {
        let bind_addr = lookup(ENV_BIND_ADDR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ApiConfigError::BindAddr(format!("{bind_addr}: {e}")))?;

        let jwt_secret = match lookup(ENV_JWT_SECRET).filter(|v| !v.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("{ENV_JWT_SECRET} not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let registry = RegistryConfig::from_lookup(&lookup)?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            registry,
        })
    }
}
