// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Building the mapping file from a directory of compiled zones, such as `zic` output or
//! `/usr/share/zoneinfo`.

use std::{
    collections::BTreeMap,
    fmt::Write,
    io::{self, ErrorKind},
    path::Path,
};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, trace};

use crate::{error::GenerateError, tzif};

const VERSION_FILE: &str = "version";
const ZI_FILE: &str = "tzdata.zi";
const ZI_VERSION_PREFIX: &str = "# version ";

/// Top-level trees of a system zoneinfo directory that duplicate every zone.
const SKIPPED_DIRS: [&str; 2] = ["posix", "right"];

#[derive(Debug)]
pub struct Generated {
    pub text: String,
    pub version: String,
    pub zones: usize,
}

/// Build the mapping file for every TZif zone under `dir`.
///
/// Without an explicit `version`, it is read from `dir/version` or the header of `dir/tzdata.zi`.
pub async fn generate(dir: &Path, version: Option<&str>) -> Result<Generated, GenerateError> {
    let version = match version.map(str::trim).filter(|v| !v.is_empty()) {
        Some(version) => version.to_string(),
        None => read_version(dir).await?,
    };

    let zones = collect_zones(dir).await?;
    if zones.is_empty() {
        return Err(GenerateError::NoZones(dir.to_path_buf()));
    }

    Ok(Generated {
        text: render(&version, Utc::now(), &zones),
        version,
        zones: zones.len(),
    })
}

/// Render the header line and one sorted `<Olson> <TZ>` line per zone.
pub fn render(version: &str, build: DateTime<Utc>, zones: &BTreeMap<String, String>) -> String {
    let mut text = format!(
        "# This file is based on iana.org tzdata {} built on {}\n",
        version,
        build.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for (zone, tz) in zones {
        _ = writeln!(text, "{} {}", zone, tz);
    }
    text
}

async fn read_version(dir: &Path) -> Result<String, GenerateError> {
    if let Some(text) = read_optional(&dir.join(VERSION_FILE)).await? {
        let version = text.trim();
        if !version.is_empty() {
            return Ok(version.to_string());
        }
    }

    if let Some(text) = read_optional(&dir.join(ZI_FILE)).await? {
        let version = text
            .lines()
            .next()
            .and_then(|line| line.strip_prefix(ZI_VERSION_PREFIX))
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(version) = version {
            return Ok(version.to_string());
        }
    }

    Err(GenerateError::MissingVersion(dir.to_path_buf()))
}

async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

async fn collect_zones(root: &Path) -> io::Result<BTreeMap<String, String>> {
    let mut zones = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if entry.file_type().await?.is_dir() {
                let skipped = dir == root && SKIPPED_DIRS.iter().any(|d| entry.file_name() == *d);
                if !skipped {
                    pending.push(path);
                }
                continue;
            }

            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let zone = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            // symlinks are followed; links to directories and dangling links fail here
            let data = match fs::read(&path).await {
                Ok(data) => data,
                Err(err) => {
                    debug!("Skipping {}: {}", zone, err);
                    continue;
                },
            };

            match tzif::footer(&data).and_then(tzif::linux_tz) {
                Some(tz) => {
                    zones.insert(zone, tz.to_string());
                },
                None => trace!("Skipping {}: no TZ footer", zone),
            }
        }
    }

    Ok(zones)
}
