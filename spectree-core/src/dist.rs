//! Distribution release tags (the `mga10` in `foo-1.0-3.mga10.src.rpm`)

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::{Error, Result};

const DEFAULT_VENDOR: &str = "mga";

#[derive(Debug, Clone)]
pub struct DistTag {
    tag: String,
    vendor: String,
    release_re: Regex,
    section_re: Regex,
    srpm_re: Regex,
}

impl DistTag {
    /// Parse a dist tag. A bare number `N` is taken to mean `mgaN`.
    pub fn new(tag: &str) -> Result<Self> {
        let tag = tag.trim().trim_start_matches('.');
        let tag = if !tag.is_empty() && tag.bytes().all(|c| c.is_ascii_digit()) {
            format!("{}{}", DEFAULT_VENDOR, tag)
        } else {
            tag.to_string()
        };

        let vendor = tag.trim_end_matches(|c: char| c.is_ascii_digit());
        if vendor.is_empty()
            || vendor.len() == tag.len()
            || !vendor.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(Error::Config(format!(
                "invalid distro release tag '{}' (expected e.g. mga10)",
                tag
            )));
        }
        let vendor = vendor.to_string();
        let v = regex::escape(&vendor);

        let release_re = Regex::new(&format!(r"\.{}(\d+)(?:\.|$)", v))?;
        let section_re = Regex::new(&format!(r"^(.*\.{}\d+)\.[A-Za-z]\w*$", v))?;
        let srpm_re = Regex::new(&format!(
            r"^(?P<name>.+)-(?P<version>[\w.+~^]+)-(?P<release>[\w.+~^]+?\.{}\d+)(?:\.[A-Za-z]\w*)?\.src\.rpm$",
            v
        ))?;

        Ok(Self {
            tag,
            vendor,
            release_re,
            section_re,
            srpm_re,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.tag
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Value for the `dist` macro when expanding a spec file.
    pub fn dist_macro(&self) -> String {
        format!("dist .{}", self.tag)
    }

    /// Strip a distro section suffix following the dist tag, e.g.
    /// `3.mga10.nonfree` becomes `3.mga10`.
    pub fn canonical_release<'a>(&self, release: &'a str) -> &'a str {
        self.section_re
            .captures(release)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(release)
    }

    /// Distro release number embedded in a package release, if any.
    pub fn release_number(&self, release: &str) -> Option<u32> {
        self.release_re
            .captures(release)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Split a source RPM file name into name, version and canonical release.
    pub fn split_srpm_name<'a>(&self, file_name: &'a str) -> Option<(&'a str, &'a str, &'a str)> {
        if let Some(c) = self.srpm_re.captures(file_name) {
            return Some((
                c.name("name")?.as_str(),
                c.name("version")?.as_str(),
                c.name("release")?.as_str(),
            ));
        }

        // Packages built without the dist tag
        let stem = file_name.strip_suffix(".src.rpm")?;
        let (rest, release) = stem.rsplit_once('-')?;
        let (name, version) = rest.rsplit_once('-')?;
        if name.is_empty() || version.is_empty() || release.is_empty() {
            return None;
        }
        Some((name, version, release))
    }
}

impl FromStr for DistTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DistTag::new(s)
    }
}

impl fmt::Display for DistTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}
