// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Error types shared across modules.

use std::{error, fmt, io, path::PathBuf};

use hyper::StatusCode;

type BoxError = Box<dyn error::Error + Send + Sync>;

/// Failure to obtain the mapping table from the network source.
pub enum FetchError {
    /// The source URL (or a redirect location) could not be parsed.
    InvalidUrl(String),
    /// The request could not be sent or no response was received.
    Request(BoxError),
    /// The response body could not be read.
    Body(hyper::Error),
    /// The source answered with a non-success status.
    Status(StatusCode),
    /// The fetch did not complete within the configured timeout.
    Timeout,
    TooManyRedirects,
    InvalidUtf8,
    /// The source answered with a file that holds no mappings.
    EmptyTable,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            FetchError::Request(e) => write!(f, "Request failed: {}", e),
            FetchError::Body(e) => write!(f, "Failed to read response body: {}", e),
            FetchError::Status(status) => write!(f, "Failed to fetch timezone data: {}", status),
            FetchError::Timeout => write!(f, "Timed out fetching timezone data"),
            FetchError::TooManyRedirects => write!(f, "Max redirects exceeded"),
            FetchError::InvalidUtf8 => write!(f, "Timezone data is not valid UTF-8"),
            FetchError::EmptyTable => write!(f, "Timezone data contains no mappings"),
        }
    }
}

impl fmt::Debug for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl error::Error for FetchError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            FetchError::Request(e) => Some(e.as_ref()),
            FetchError::Body(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure talking to the persistent cache tier.
///
/// These never reach a client: the cache layer logs them and degrades to a miss.
pub enum CacheError {
    Io(io::Error),
    Request(BoxError),
    /// The remote store answered with an unexpected status.
    Status(StatusCode),
    /// A stored entry could not be decoded. The payload names the entry.
    Corrupt(String),
}

impl From<io::Error> for CacheError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "{}", e),
            CacheError::Request(e) => write!(f, "Request failed: {}", e),
            CacheError::Status(status) => write!(f, "Unexpected status: {}", status),
            CacheError::Corrupt(entry) => write!(f, "Corrupt cache entry: {}", entry),
        }
    }
}

impl fmt::Debug for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl error::Error for CacheError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            CacheError::Io(e) => Some(e),
            CacheError::Request(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Failure to build a mapping file from compiled zones.
pub enum GenerateError {
    Io(io::Error),
    /// No version was given and the directory holds neither `version` nor `tzdata.zi`.
    MissingVersion(PathBuf),
    /// The directory holds no TZif file with a usable footer.
    NoZones(PathBuf),
}

impl From<io::Error> for GenerateError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Io(e) => write!(f, "{}", e),
            GenerateError::MissingVersion(dir) => {
                write!(f, "No tzdata version found in {}", dir.display())
            },
            GenerateError::NoZones(dir) => {
                write!(f, "No timezones were extracted from {}", dir.display())
            },
        }
    }
}

impl fmt::Debug for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            GenerateError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Invalid configuration value. Each variant carries the variable name and its value.
#[cfg_attr(test, derive(PartialEq))]
pub enum ConfigError {
    InvalidNumber(&'static str, String),
    InvalidAddress(&'static str, String),
    InvalidBackend(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber(name, value) => {
                write!(f, r#""{}" is not a valid number: "{}""#, name, value)
            },
            ConfigError::InvalidAddress(name, value) => {
                write!(f, r#""{}" is not a valid socket address: "{}""#, name, value)
            },
            ConfigError::InvalidBackend(name, value) => write!(
                f,
                r#""{}" must be none, memory, file:<dir> or an http(s) URL, got "{}""#,
                name, value
            ),
        }
    }
}

impl fmt::Debug for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl error::Error for ConfigError {}
