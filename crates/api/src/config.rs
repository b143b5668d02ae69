//! Server configuration from the environment.

use std::net::SocketAddr;

use anyhow::Context;

pub const ENV_ADDR: &str = "NEEDLELOG_API_ADDR";
pub const ENV_TOKEN: &str = "NEEDLELOG_API_TOKEN";
pub const ENV_PUBLIC_URL: &str = "NEEDLELOG_API_PUBLIC_URL";

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub addr: SocketAddr,
    /// Bearer token required on `/api/submit`; `None` leaves it open.
    pub token: Option<String>,
    /// Base URL used in file links; defaults to `http://{Host}`.
    pub public_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            token: None,
            public_url: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup(ENV_ADDR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse()
            .with_context(|| format!("{ENV_ADDR} is not a socket address: {addr:?}"))?;

        Ok(Self {
            addr,
            token: lookup(ENV_TOKEN).filter(|t| !t.trim().is_empty()),
            public_url: lookup(ENV_PUBLIC_URL).map(|u| u.trim_end_matches('/').to_string()),
        })
    }
}
