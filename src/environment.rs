// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use crate::error::ConfigError;

pub const ENV_TZRESOLVE_LISTEN: &str = "TZRESOLVE_LISTEN";
pub const ENV_TZRESOLVE_SOURCE_URL: &str = "TZRESOLVE_SOURCE_URL";
pub const ENV_TZRESOLVE_FETCH_TIMEOUT_SECS: &str = "TZRESOLVE_FETCH_TIMEOUT_SECS";
pub const ENV_TZRESOLVE_CACHE_KEY: &str = "TZRESOLVE_CACHE_KEY";
pub const ENV_TZRESOLVE_CACHE_TTL_SECS: &str = "TZRESOLVE_CACHE_TTL_SECS";
pub const ENV_TZRESOLVE_MEMORY_TTL_SECS: &str = "TZRESOLVE_MEMORY_TTL_SECS";
pub const ENV_TZRESOLVE_KV: &str = "TZRESOLVE_KV";
pub const ENV_TZRESOLVE_KV_TOKEN: &str = "TZRESOLVE_KV_TOKEN";

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8787";
pub const DEFAULT_SOURCE_URL: &str = "https://picoreplayer.github.io/timezone-data/timezones.db";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_KEY: &str = "timezones.db";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86400;

/// Where the persistent cache tier lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvBackend {
    None,
    Memory,
    File(PathBuf),
    Remote(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen: SocketAddr,
    pub source_url: String,
    pub fetch_timeout: Duration,
    pub cache_key: String,
    pub cache_ttl: Duration,
    /// `None` keeps the in-memory table until restart.
    pub memory_ttl: Option<Duration>,
    pub kv: KvBackend,
    pub kv_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let listen_value = var(ENV_TZRESOLVE_LISTEN).unwrap_or_else(|| DEFAULT_LISTEN.into());
        let listen = listen_value
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(ENV_TZRESOLVE_LISTEN, listen_value))?;

        let fetch_timeout = seconds(
            ENV_TZRESOLVE_FETCH_TIMEOUT_SECS,
            var(ENV_TZRESOLVE_FETCH_TIMEOUT_SECS),
            DEFAULT_FETCH_TIMEOUT_SECS,
        )?;
        let cache_ttl = seconds(
            ENV_TZRESOLVE_CACHE_TTL_SECS,
            var(ENV_TZRESOLVE_CACHE_TTL_SECS),
            DEFAULT_CACHE_TTL_SECS,
        )?;
        let memory_ttl = seconds(
            ENV_TZRESOLVE_MEMORY_TTL_SECS,
            var(ENV_TZRESOLVE_MEMORY_TTL_SECS),
            cache_ttl.as_secs(),
        )?;

        Ok(Self {
            listen,
            source_url: var(ENV_TZRESOLVE_SOURCE_URL).unwrap_or_else(|| DEFAULT_SOURCE_URL.into()),
            fetch_timeout,
            cache_key: var(ENV_TZRESOLVE_CACHE_KEY).unwrap_or_else(|| DEFAULT_CACHE_KEY.into()),
            cache_ttl,
            memory_ttl: Some(memory_ttl).filter(|ttl| !ttl.is_zero()),
            kv: parse_backend(var(ENV_TZRESOLVE_KV))?,
            kv_token: var(ENV_TZRESOLVE_KV_TOKEN),
        })
    }
}

fn seconds(
    name: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidNumber(name, value)),
        None => Ok(Duration::from_secs(default)),
    }
}

fn parse_backend(value: Option<String>) -> Result<KvBackend, ConfigError> {
    let Some(value) = value else {
        return Ok(KvBackend::None);
    };

    match value.trim() {
        "none" => Ok(KvBackend::None),
        "memory" => Ok(KvBackend::Memory),
        v if v.starts_with("file:") && v.len() > "file:".len() => {
            Ok(KvBackend::File(PathBuf::from(&v["file:".len()..])))
        },
        v if v.starts_with("http://") || v.starts_with("https://") => {
            Ok(KvBackend::Remote(v.to_string()))
        },
        _ => Err(ConfigError::InvalidBackend(ENV_TZRESOLVE_KV, value.clone())),
    }
}
