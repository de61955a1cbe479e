// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Persistent cache tier for the raw mapping file.
//!
//! [`CacheStore`] wraps an optional [`KvStore`] backend and never lets a backend failure escape:
//! reads degrade to a miss and writes are dropped, both with a warning. The outcome types say which
//! path was taken.

mod file;
mod memory;
mod remote;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::CacheError;

pub use file::FileKv;
pub use memory::MemoryKv;
pub use remote::RemoteKv;

/// A key-value store with per-entry expiration.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns `None` when the key is absent or its entry has expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug)]
pub enum CacheLoad {
    Hit(String),
    Miss,
    /// The backend failed. Callers treat this as a miss.
    Failed(CacheError),
}

impl CacheLoad {
    pub fn into_text(self) -> Option<String> {
        match self {
            CacheLoad::Hit(text) => Some(text),
            CacheLoad::Miss | CacheLoad::Failed(_) => None,
        }
    }
}

#[derive(Debug)]
pub enum CacheWrite {
    Stored,
    /// No backend is configured.
    Skipped,
    Failed(CacheError),
}

#[derive(Clone)]
pub struct CacheStore {
    backend: Option<Arc<dyn KvStore>>,
    key: String,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(backend: Option<Arc<dyn KvStore>>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            backend,
            key: key.into(),
            ttl,
        }
    }

    /// A store with no persistent tier. Every load misses.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::new(None, "", Duration::ZERO)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map(|b| b.name()).unwrap_or("none")
    }

    pub async fn load(&self) -> CacheLoad {
        let Some(backend) = &self.backend else {
            return CacheLoad::Miss;
        };

        match backend.get(&self.key).await {
            Ok(Some(text)) => {
                debug!("Cache hit for \"{}\" in {}", self.key, backend.name());
                CacheLoad::Hit(text)
            },
            Ok(None) => {
                debug!("Cache miss for \"{}\" in {}", self.key, backend.name());
                CacheLoad::Miss
            },
            Err(err) => {
                warn!("Failed to read \"{}\" from {}: {}", self.key, backend.name(), err);
                CacheLoad::Failed(err)
            },
        }
    }

    pub async fn store(&self, text: &str) -> CacheWrite {
        let Some(backend) = &self.backend else {
            return CacheWrite::Skipped;
        };

        match backend.put(&self.key, text, self.ttl).await {
            Ok(()) => {
                debug!(
                    "Stored \"{}\" in {} for {}s",
                    self.key,
                    backend.name(),
                    self.ttl.as_secs()
                );
                CacheWrite::Stored
            },
            Err(err) => {
                warn!("Failed to write \"{}\" to {}: {}", self.key, backend.name(), err);
                CacheWrite::Failed(err)
            },
        }
    }
}
