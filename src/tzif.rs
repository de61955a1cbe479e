// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Reading the POSIX `TZ` footer of compiled TZif files (RFC 8536).
//!
//! Version 2 and later files carry a version 1 header and data block, a second header with 64-bit
//! data, and then a footer line `\n<TZ string>\n`. Only the footer is of interest here.

use once_cell::sync::Lazy;
use regex::Regex;

const MAGIC: &[u8] = b"TZif";
const HEADER_LEN: usize = 44;
const COUNTS_OFFSET: usize = 20;

/// A leading angle-bracket abbreviation (`<+03>`) is dropped and the rest kept up to the first
/// character that cannot appear in a Linux `TZ` value.
static FOOTER_TZ_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:<[+\-0-9]+>)?([+\-,./A-Z0-9]*)").unwrap());

struct Counts {
    isutcnt: usize,
    isstdcnt: usize,
    leapcnt: usize,
    timecnt: usize,
    typecnt: usize,
    charcnt: usize,
}

impl Counts {
    /// Length of the data block following a header, for `time_size` byte transition times.
    fn block_len(&self, time_size: usize) -> usize {
        self.timecnt * time_size
            + self.timecnt
            + self.typecnt * 6
            + self.charcnt
            + self.leapcnt * (time_size + 4)
            + self.isstdcnt
            + self.isutcnt
    }
}

fn read_count(header: &[u8], index: usize) -> Option<usize> {
    let start = COUNTS_OFFSET + index * 4;
    let bytes = header.get(start..start + 4)?;
    Some(u32::from_be_bytes(bytes.try_into().ok()?) as usize)
}

fn read_header(data: &[u8]) -> Option<(u8, Counts)> {
    let header = data.get(..HEADER_LEN)?;
    if !header.starts_with(MAGIC) {
        return None;
    }

    let counts = Counts {
        isutcnt: read_count(header, 0)?,
        isstdcnt: read_count(header, 1)?,
        leapcnt: read_count(header, 2)?,
        timecnt: read_count(header, 3)?,
        typecnt: read_count(header, 4)?,
        charcnt: read_count(header, 5)?,
    };
    Some((header[4], counts))
}

/// The footer `TZ` string of a TZif file.
///
/// `None` when `data` is not TZif, is a version 1 file (which has no footer) or is truncated.
pub fn footer(data: &[u8]) -> Option<&str> {
    let (version, counts) = read_header(data)?;
    // version 1 files carry a NUL version byte
    if version < b'2' {
        return None;
    }

    let second = data.get(HEADER_LEN + counts.block_len(4)..)?;
    let (_, counts) = read_header(second)?;
    let rest = second
        .get(HEADER_LEN + counts.block_len(8)..)?
        .strip_prefix(b"\n")?;
    let end = rest.iter().position(|b| *b == b'\n')?;
    std::str::from_utf8(&rest[..end]).ok()
}

/// Reduce a footer to the value written into the mapping file. `None` when nothing is left.
pub fn linux_tz(footer: &str) -> Option<&str> {
    FOOTER_TZ_PATTERN
        .captures(footer)
        .and_then(|captures| captures.get(1))
        .map(|tz| tz.as_str())
        .filter(|tz| !tz.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{footer, linux_tz};
    use crate::test_utils::utils::tzif;

    #[test]
    fn reads_footer() {
        let data = tzif(b'2', 0, 0, "GMT0BST,M3.5.0/1,M10.5.0");
        assert_eq!(footer(&data), Some("GMT0BST,M3.5.0/1,M10.5.0"));

        let data = tzif(b'3', 0, 0, "");
        assert_eq!(footer(&data), Some(""));
    }

    #[test]
    fn skips_data_blocks() {
        // filler bytes are newlines, so only the counts can locate the footer
        let data = tzif(b'2', 3, 2, "EST5EDT,M3.2.0,M11.1.0");
        assert_eq!(footer(&data), Some("EST5EDT,M3.2.0,M11.1.0"));
    }

    #[test]
    fn rejects_other_files() {
        assert_eq!(footer(&tzif(0, 2, 0, "EST5EDT")), None);
        assert_eq!(footer(b"# tzdata 2025c\nEurope/London GMT0BST\n"), None);
        assert_eq!(footer(b"TZif2"), None);

        let data = tzif(b'2', 2, 1, "JST-9");
        assert_eq!(footer(&data[..data.len() - 1]), None);
        assert_eq!(footer(&data[..60]), None);
    }

    #[test]
    fn footer_to_linux_tz() {
        assert_eq!(linux_tz("EST5EDT,M3.2.0,M11.1.0"), Some("EST5EDT,M3.2.0,M11.1.0"));
        assert_eq!(linux_tz("CET-1CEST,M3.5.0,M10.5.0/3"), Some("CET-1CEST,M3.5.0,M10.5.0/3"));
        assert_eq!(linux_tz("<-03>3"), Some("3"));
        assert_eq!(linux_tz("<+0545>-5:45"), Some("-5"));
        assert_eq!(linux_tz(""), None);
        assert_eq!(linux_tz("<+00>"), None);
    }
}
