//! Server configuration read from the environment.
//!
//! * `COMMISSION_DATA_DIR`: directory holding the record JSON files
//!   (default `data`).
//! * `COMMISSION_BIND_ADDR`: listen address (default `127.0.0.1:3000`).
//! * `COMMISSION_API_TOKENS`: comma-separated bearer tokens accepted by
//!   the report routes.  With none configured every request is refused.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub api_tokens: HashSet<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("COMMISSION_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let addr = lookup("COMMISSION_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid COMMISSION_BIND_ADDR '{addr}'"))?;
        let api_tokens = lookup("COMMISSION_API_TOKENS")
            .map(|raw| parse_tokens(&raw))
            .unwrap_or_default();
        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            bind_addr,
            api_tokens,
        })
    }
}

fn parse_tokens(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
