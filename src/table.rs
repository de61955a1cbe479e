// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Parsing of the flat-file Olson to Linux TZ mapping.
//!
//! The file looks like this:
//!
//! ```text
//! # This file is based on iana.org tzdata 2025c built on 2025-12-19 01:09:27 UTC
//! America/New_York EST5EDT,M3.2.0,M11.1.0
//! Europe/London GMT0BST,M3.5.0/1,M10.5.0
//! ```
//!
//! Parsing never fails. Lines that do not split into a key and a value produce an empty value,
//! which [`crate::tz_shape::is_valid_linux_tz`] rejects later.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"tzdata\s+(\S+)\s+built\s+on\s+(.+)$").unwrap());

/// Olson zone name to Linux TZ string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: HashMap<String, String>,
}

impl MappingTable {
    pub fn get(&self, olson: &str) -> Option<&str> {
        self.entries.get(olson).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The tzdata release and build time from the header line. Empty when the header is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMetadata {
    pub version: String,
    pub build: String,
}

impl TableMetadata {
    pub fn version(&self) -> Option<&str> {
        Some(self.version.as_str()).filter(|v| !v.is_empty())
    }

    pub fn build(&self) -> Option<&str> {
        Some(self.build.as_str()).filter(|b| !b.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub table: MappingTable,
    pub metadata: TableMetadata,
}

pub fn parse(text: &str) -> ParsedTable {
    let mut entries = HashMap::new();
    let mut metadata = TableMetadata::default();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with('#') {
            if line.contains("tzdata") {
                parse_header(line, &mut metadata);
            }
            continue;
        }

        // Literal single-space split: "A  B" gives an empty value, "A" gives none.
        let mut fields = line.split(' ');
        let olson = fields.next().unwrap_or_default();
        let linux_tz = fields.next().unwrap_or_default();
        entries.insert(olson.to_string(), linux_tz.to_string());
    }

    ParsedTable {
        table: MappingTable { entries },
        metadata,
    }
}

fn parse_header(line: &str, metadata: &mut TableMetadata) {
    if let Some(captures) = HEADER_PATTERN.captures(line) {
        metadata.version = captures[1].to_string();
        metadata.build = captures[2].trim().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "# This file is based on iana.org tzdata 2025c built on 2025-12-19 01:09:27 UTC";

    #[test]
    fn data_lines() {
        let parsed = parse("America/New_York EST5EDT,M3.2.0,M11.1.0\nEurope/London GMT0BST,M3.5.0/1,M10.5.0\n");

        assert_eq!(parsed.table.len(), 2);
        assert_eq!(
            parsed.table.get("America/New_York"),
            Some("EST5EDT,M3.2.0,M11.1.0")
        );
        assert_eq!(
            parsed.table.get("Europe/London"),
            Some("GMT0BST,M3.5.0/1,M10.5.0")
        );
        assert_eq!(parsed.metadata, TableMetadata::default());
        assert_eq!(parsed.metadata.version(), None);
        assert_eq!(parsed.metadata.build(), None);
    }

    #[test]
    fn header() {
        let parsed = parse(&format!("{HEADER}\nAsia/Tokyo JST-9\n"));

        assert_eq!(parsed.metadata.version(), Some("2025c"));
        assert_eq!(parsed.metadata.build(), Some("2025-12-19 01:09:27 UTC"));
        assert_eq!(parsed.table.get("Asia/Tokyo"), Some("JST-9"));
        assert_eq!(parsed.table.len(), 1);
    }

    #[test]
    fn header_without_build_is_ignored() {
        let parsed = parse("# This file is based on iana.org tzdata 2025c\nAsia/Tokyo JST-9\n");

        assert_eq!(parsed.metadata, TableMetadata::default());
        assert_eq!(parsed.table.len(), 1);
    }

    #[test]
    fn comments_and_blank_lines() {
        let parsed = parse("# comment\n\n   \n#tzdata\nUTC UTC0\n# another\n");

        assert_eq!(parsed.table.len(), 1);
        assert_eq!(parsed.table.get("UTC"), Some("UTC0"));
        assert_eq!(parsed.metadata, TableMetadata::default());
    }

    #[test]
    fn malformed_lines() {
        let parsed = parse("Lonely\nDouble  Space\nEtc/GMT+5 <-05>5 trailing\n");

        assert_eq!(parsed.table.get("Lonely"), Some(""));
        assert_eq!(parsed.table.get("Double"), Some(""));
        assert_eq!(parsed.table.get("Etc/GMT+5"), Some("<-05>5"));
    }

    #[test]
    fn crlf_and_duplicates() {
        let parsed = parse("Asia/Tokyo JST-9\r\nAsia/Tokyo XST-9\r\n");

        assert_eq!(parsed.table.len(), 1);
        assert_eq!(parsed.table.get("Asia/Tokyo"), Some("XST-9"));
    }

    #[test]
    fn idempotent() {
        let text = format!("{HEADER}\nAmerica/Chicago CST6CDT,M3.2.0,M11.1.0\nBad\n");

        assert_eq!(parse(&text), parse(&text));
    }

    #[test]
    fn empty_input() {
        let parsed = parse("");

        assert!(parsed.table.is_empty());
        assert_eq!(parsed.metadata, TableMetadata::default());
    }
}
