// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use once_cell::sync::Lazy;
use regex::Regex;

static LINUX_TZ_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{1,5}[-+]?[0-9:.]*.*$").unwrap());

/// Check that `candidate` looks like a Linux `TZ` value: an uppercase abbreviation of one to five
/// letters, optionally followed by an offset and transition rules.
///
/// Angle-bracket names (`<-03>3`) are rejected.
pub fn is_valid_linux_tz(candidate: &str) -> bool {
    !candidate.is_empty() && LINUX_TZ_PATTERN.is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::is_valid_linux_tz;

    #[test]
    fn valid() {
        for tz in [
            "UTC0",
            "JST-9",
            "EST5EDT,M3.2.0,M11.1.0",
            "GMT0BST,M3.5.0/1,M10.5.0",
            "ACST-9:30",
            "NZST-12NZDT,M9.5.0,M4.1.0/3",
            "UTC",
        ] {
            assert!(is_valid_linux_tz(tz), "{tz}");
        }
    }

    #[test]
    fn invalid() {
        for tz in ["", "utc", "est5edt", "<-03>3", "+0300", " EST5"] {
            assert!(!is_valid_linux_tz(tz), "{tz}");
        }
    }
}
