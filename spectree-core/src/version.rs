//! RPM version ordering
//!
//! Implements the epoch:version-release comparison used by rpm:
//! - a missing epoch counts as 0 and dominates the comparison
//! - version and release are compared segment by segment with `rpmvercmp`
//! - `~` sorts before anything, `^` sorts after the end of a string but
//!   before any further segment

use std::cmp::Ordering;
use std::fmt;

use crate::error::VersionParseError;

/// Compare two version (or release) strings with rpm semantics.
///
/// Strings are split into alternating runs of digits and letters; every other
/// character only separates runs. Numeric runs compare by value, alphabetic
/// runs by byte value, and a numeric run is always newer than an alphabetic
/// one.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    while i < one.len() || j < two.len() {
        while i < one.len() && is_separator(one[i]) {
            i += 1;
        }
        while j < two.len() && is_separator(two[j]) {
            j += 1;
        }

        let tilde_one = one.get(i) == Some(&b'~');
        let tilde_two = two.get(j) == Some(&b'~');
        if tilde_one || tilde_two {
            if !tilde_one {
                return Ordering::Greater;
            }
            if !tilde_two {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        let caret_one = one.get(i) == Some(&b'^');
        let caret_two = two.get(j) == Some(&b'^');
        if caret_one || caret_two {
            if i >= one.len() {
                return Ordering::Less;
            }
            if j >= two.len() {
                return Ordering::Greater;
            }
            if !caret_one {
                return Ordering::Greater;
            }
            if !caret_two {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if i >= one.len() || j >= two.len() {
            break;
        }

        let numeric = one[i].is_ascii_digit();
        let run_one = take_run(one, &mut i, numeric);
        let run_two = take_run(two, &mut j, numeric);

        // Runs of different types: numbers are newer than letters
        if run_two.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            compare_numeric(run_one, run_two)
        } else {
            run_one.cmp(run_two)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    match (i >= one.len(), j >= two.len()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn is_separator(c: u8) -> bool {
    !c.is_ascii_alphanumeric() && c != b'~' && c != b'^'
}

fn take_run<'a>(s: &'a [u8], pos: &mut usize, numeric: bool) -> &'a [u8] {
    let in_run = |c: u8| {
        if numeric {
            c.is_ascii_digit()
        } else {
            c.is_ascii_alphabetic()
        }
    };
    let start = *pos;
    while *pos < s.len() && in_run(s[*pos]) {
        *pos += 1;
    }
    &s[start..*pos]
}

fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let first = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
    &s[first..]
}

/// An epoch:version-release triplet.
///
/// Equality and ordering follow rpm semantics, so `1.0-1` equals `0:1.00-1`.
#[derive(Debug, Clone)]
pub struct Evr {
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
}

impl Evr {
    pub fn new(
        epoch: Option<u32>,
        version: impl Into<String>,
        release: impl Into<String>,
    ) -> Result<Self, VersionParseError> {
        let version = version.into();
        let release = release.into();
        validate_part("version", &version)?;
        validate_part("release", &release)?;
        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Parse `[epoch:]version-release`.
    pub fn parse(s: &str) -> Result<Self, VersionParseError> {
        let s = s.trim();
        let (epoch, rest) = match s.split_once(':') {
            Some((epoch, rest)) => {
                let epoch = epoch.parse::<u32>().map_err(|_| VersionParseError {
                    field: "epoch",
                    value: epoch.to_string(),
                    reason: "not a non-negative integer",
                })?;
                (Some(epoch), rest)
            }
            None => (None, s),
        };
        let (version, release) = rest.rsplit_once('-').ok_or_else(|| VersionParseError {
            field: "version-release",
            value: rest.to_string(),
            reason: "missing release",
        })?;
        Self::new(epoch, version, release)
    }

    pub fn epoch_or_zero(&self) -> u32 {
        self.epoch.unwrap_or(0)
    }

    /// Whether both triplets share epoch and version, so any difference is
    /// in the release alone.
    pub fn same_version(&self, other: &Evr) -> bool {
        self.epoch_or_zero() == other.epoch_or_zero()
            && rpmvercmp(&self.version, &other.version) == Ordering::Equal
    }
}

fn validate_part(field: &'static str, value: &str) -> Result<(), VersionParseError> {
    let err = |reason| VersionParseError {
        field,
        value: value.to_string(),
        reason,
    };
    if value.is_empty() {
        return Err(err("empty"));
    }
    if value.contains('-') {
        return Err(err("contains '-'"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(err("contains whitespace"));
    }
    if !value.bytes().any(|c| c.is_ascii_alphanumeric()) {
        return Err(err("has no comparable segment"));
    }
    Ok(())
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch_or_zero()
            .cmp(&other.epoch_or_zero())
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| rpmvercmp(&self.release, &other.release))
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Evr {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Evr {}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }
        write!(f, "{}-{}", self.version, self.release)
    }
}
