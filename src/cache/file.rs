// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::{io::ErrorKind, path::PathBuf, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::trace;

use super::KvStore;
use crate::error::CacheError;

/// Key-value store backed by one file per key in a directory.
///
/// Each file starts with a line holding the expiry as Unix seconds, followed by the value.
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
                _ => '_',
            })
            .collect();
        // prefixed so "." and ".." stay inside the directory
        self.dir.join(format!("kv-{}", name))
    }
}

#[async_trait]
impl KvStore for FileKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path(key);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let (expires_at, value) = contents
            .split_once('\n')
            .and_then(|(header, value)| Some((header.parse::<i64>().ok()?, value)))
            .ok_or_else(|| CacheError::Corrupt(path.to_string_lossy().to_string()))?;

        if expires_at <= Utc::now().timestamp() {
            trace!("Removing expired entry {}", path.display());
            match fs::remove_file(&path).await {
                Err(err) if err.kind() != ErrorKind::NotFound => return Err(err.into()),
                _ => return Ok(None),
            }
        }

        Ok(Some(value.to_string()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path(key);
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        let tmp_path = self
            .dir
            .join(format!(".kv-{}.tmp", uuid::Uuid::new_v4().simple()));

        fs::write(&tmp_path, format!("{}\n{}", expires_at, value)).await?;
        if let Err(err) = fs::rename(&tmp_path, &path).await {
            _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
