//! Records flowing through the audit pipelines

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{FetchError, VersionParseError};
use crate::version::Evr;

/// Kind of a declared source reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SourceKind {
    Source,
    Patch,
}

/// A `SourceN:` or `PatchN:` tag as written in the expanded spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTag {
    pub kind: SourceKind,
    pub number: Option<u32>,
    pub value: String,
}

impl SourceTag {
    /// Whether the value points somewhere remote rather than at a file
    /// shipped next to the spec.
    pub fn is_url_like(&self) -> bool {
        self.value.contains("//")
    }
}

/// Metadata extracted from one spec file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRecord {
    pub package_name: String,
    pub directory_path: PathBuf,
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub declared_url: Option<String>,
    pub source_urls: Vec<SourceTag>,
}

impl SpecRecord {
    pub fn evr(&self) -> Result<Evr, VersionParseError> {
        Evr::new(self.epoch, self.version.clone(), self.release.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVersionRecord {
    pub package_name: String,
    pub evr: Evr,
    /// False when the source cannot express epochs at all, as with package
    /// file names. A missing epoch then means "unknown" rather than 0.
    pub epoch_known: bool,
}

impl RemoteVersionRecord {
    pub fn new(package_name: impl Into<String>, evr: Evr) -> Self {
        Self {
            package_name: package_name.into(),
            evr,
            epoch_known: true,
        }
    }

    pub fn without_epoch(package_name: impl Into<String>, evr: Evr) -> Self {
        Self {
            package_name: package_name.into(),
            evr,
            epoch_known: false,
        }
    }
}

/// Snapshot of the remote build catalog, keyed by package name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, RemoteVersionRecord>,
}

impl Catalog {
    /// Build a catalog, keeping the highest version when a package is listed
    /// more than once.
    pub fn from_records(records: impl IntoIterator<Item = RemoteVersionRecord>) -> Self {
        let mut entries: HashMap<String, RemoteVersionRecord> = HashMap::new();
        for record in records {
            match entries.get(&record.package_name) {
                Some(existing) if existing.evr >= record.evr => {}
                _ => {
                    entries.insert(record.package_name.clone(), record);
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, package: &str) -> Option<&RemoteVersionRecord> {
        self.entries.get(package)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source of the remote catalog snapshot.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Catalog, FetchError>;
}

/// A fixed snapshot serves as its own source.
#[async_trait]
impl CatalogSource for Catalog {
    async fn fetch_catalog(&self) -> Result<Catalog, FetchError> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchSeverity {
    /// Same epoch and version, different release
    ReleaseOnly,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Match,
    Mismatch(MismatchSeverity),
    RemoteMissing,
    SpecUnparsable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonResult {
    pub package_name: String,
    pub spec: Option<Evr>,
    pub remote: Option<Evr>,
    pub verdict: Verdict,
}

/// Where in the spec a URL was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum UrlUse {
    Homepage,
    Source,
    Patch,
}

impl UrlUse {
    pub fn label(&self) -> &'static str {
        match self {
            UrlUse::Homepage => "URL",
            UrlUse::Source => "Source",
            UrlUse::Patch => "Patch",
        }
    }
}

impl From<SourceKind> for UrlUse {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Source => UrlUse::Source,
            SourceKind::Patch => UrlUse::Patch,
        }
    }
}

impl fmt::Display for UrlUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Ok,
    Unreachable,
    Timeout,
    Malformed,
    /// Valid URL with a scheme the prober cannot check
    Unsupported,
    /// Not checked because probing was turned off
    Skipped,
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Ok => "ok",
            ProbeOutcome::Unreachable => "unreachable",
            ProbeOutcome::Timeout => "timeout",
            ProbeOutcome::Malformed => "malformed",
            ProbeOutcome::Unsupported => "unsupported",
            ProbeOutcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCheckResult {
    pub package_name: String,
    pub url_use: UrlUse,
    pub url: String,
    pub outcome: ProbeOutcome,
    pub detail: Option<String>,
}

impl UrlCheckResult {
    /// Plain-text scheme that should be upgraded.
    pub fn is_insecure(&self) -> bool {
        match self.url.split_once("://") {
            Some((scheme, _)) => {
                let scheme = scheme.to_ascii_lowercase();
                scheme != "https" && scheme != "ftps"
            }
            None => false,
        }
    }
}

/// Package to maintainer assignments.
#[derive(Debug, Clone, Default)]
pub struct Maintainers {
    by_package: HashMap<String, String>,
}

impl Maintainers {
    pub const UNKNOWN: &'static str = "?";

    /// Parse `<package> <maintainer>` lines; anything else is ignored.
    pub fn parse(text: &str) -> Self {
        let by_package = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let package = fields.next()?;
                let maintainer = fields.next()?;
                Some((package.to_string(), maintainer.to_string()))
            })
            .collect();
        Self { by_package }
    }

    pub fn get(&self, package: &str) -> &str {
        self.by_package
            .get(package)
            .map(String::as_str)
            .unwrap_or(Self::UNKNOWN)
    }

    pub fn len(&self) -> usize {
        self.by_package.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_package.is_empty()
    }
}
