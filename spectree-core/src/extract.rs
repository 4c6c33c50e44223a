//! Spec metadata extraction
//!
//! Macros in a spec file must be expanded before any field can be trusted,
//! so extraction is delegated to `rpmspec`. The [`SpecExtractor`] trait lets
//! tests substitute fixed records.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::Config;
use crate::diagnostics::DiagnosticLog;
use crate::discovery::SpecLocation;
use crate::dist::DistTag;
use crate::error::ExtractionError;
use crate::model::{SourceKind, SourceTag, SpecRecord};
use crate::{Error, Result};

const QUERY_FORMAT: &str =
    "NAME=%{NAME}\nEPOCH=%{EPOCH}\nVERSION=%{VERSION}\nRELEASE=%{RELEASE}\nURL=%{URL}\n";

/// rpm prints this for tags that are not set
const UNSET: &str = "(none)";

static SOURCE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(source|patch)(\d*)\s*:\s*(\S.*?)\s*$").expect("valid source tag regex")
});

/// Sections after which no more tags can appear
const BODY_SECTIONS: &[&str] = &[
    "prep",
    "generate_buildrequires",
    "conf",
    "build",
    "install",
    "check",
    "clean",
    "changelog",
];

/// Sections holding free text or scripts rather than tags
const TEXT_SECTIONS: &[&str] = &[
    "description",
    "files",
    "pre",
    "post",
    "preun",
    "postun",
    "pretrans",
    "posttrans",
    "verifyscript",
    "triggerprein",
    "triggerin",
    "triggerun",
    "triggerpostun",
    "filetriggerin",
    "filetriggerun",
    "transfiletriggerin",
    "transfiletriggerun",
];

#[async_trait]
pub trait SpecExtractor: Send + Sync {
    async fn extract(&self, location: &SpecLocation) -> std::result::Result<SpecRecord, ExtractionError>;
}

/// Extractor backed by the `rpmspec` tool.
pub struct RpmspecExtractor {
    program: PathBuf,
    dist: DistTag,
    timeout: Duration,
    diagnostics: Option<DiagnosticLog>,
}

impl RpmspecExtractor {
    pub fn new(program: PathBuf, dist: DistTag, timeout: Duration) -> Self {
        Self {
            program,
            dist,
            timeout,
            diagnostics: None,
        }
    }

    /// Report spec inconsistencies to `log` as well as the trace log.
    pub fn with_diagnostics(mut self, log: DiagnosticLog) -> Self {
        self.diagnostics = Some(log);
        self
    }

    /// Locate `rpmspec` (or the configured override) in PATH.
    pub fn from_config(config: &Config) -> Result<Self> {
        let wanted = config
            .rpmspec
            .clone()
            .unwrap_or_else(|| PathBuf::from("rpmspec"));
        let program = which::which(&wanted).map_err(|e| {
            Error::Config(format!("cannot find {}: {}", wanted.display(), e))
        })?;
        debug!("Using {}", program.display());
        Ok(Self::new(program, config.dist.clone(), config.extract_timeout))
    }

    async fn run(&self, args: Vec<OsString>) -> std::result::Result<String, ExtractionError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match timeout(self.timeout, cmd.output()).await {
            Err(_) => Err(ExtractionError::Transient(format!(
                "{} timed out after {}s",
                self.program.display(),
                self.timeout.as_secs()
            ))),
            Ok(Err(e)) => Err(ExtractionError::Transient(format!(
                "cannot run {}: {}",
                self.program.display(),
                e
            ))),
            Ok(Ok(output)) if !output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let reason = stderr
                    .lines()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("rpmspec exited with {}", output.status));
                Err(ExtractionError::Malformed(reason))
            }
            Ok(Ok(output)) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
        }
    }

    fn base_args(&self, mode: &str) -> Vec<OsString> {
        vec![
            mode.into(),
            "-D".into(),
            self.dist.dist_macro().into(),
        ]
    }
}

#[async_trait]
impl SpecExtractor for RpmspecExtractor {
    async fn extract(&self, location: &SpecLocation) -> std::result::Result<SpecRecord, ExtractionError> {
        let mut query = self.base_args("-q");
        query.extend([
            "--srpm".into(),
            "--queryformat".into(),
            QUERY_FORMAT.into(),
            "--".into(),
            location.path.clone().into(),
        ]);

        let mut parse = self.base_args("-P");
        parse.extend(["--".into(), location.path.clone().into()]);

        let (fields, expanded) = tokio::try_join!(self.run(query), self.run(parse))?;
        let fields = parse_query_output(&fields)?;

        if fields.name != location.package {
            let message = format!(
                "spec declares Name {} which differs from its directory",
                fields.name
            );
            warn!("{}: {}", location.package, message);
            if let Some(log) = &self.diagnostics {
                log.warn(Some(&location.package), message);
            }
        }

        Ok(SpecRecord {
            package_name: location.package.clone(),
            directory_path: location.package_dir.clone(),
            epoch: fields.epoch,
            version: fields.version,
            release: fields.release,
            declared_url: fields.url,
            source_urls: parse_source_tags(&expanded),
        })
    }
}

/// Run `extractor`, retrying once after `backoff` if the failure was transient.
pub async fn extract_with_retry(
    extractor: &dyn SpecExtractor,
    location: &SpecLocation,
    backoff: Duration,
) -> std::result::Result<SpecRecord, ExtractionError> {
    match extractor.extract(location).await {
        Err(e) if e.is_transient() => {
            debug!("{}: {}; retrying", location.package, e);
            sleep(backoff).await;
            extractor.extract(location).await
        }
        result => result,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFields {
    pub name: String,
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub url: Option<String>,
}

/// Parse `KEY=value` lines produced by [`QUERY_FORMAT`]. When a key repeats,
/// the first value wins.
pub fn parse_query_output(text: &str) -> std::result::Result<QueryFields, ExtractionError> {
    let mut name = None;
    let mut epoch = None;
    let mut version = None;
    let mut release = None;
    let mut url = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let slot = match key.trim() {
            "NAME" => &mut name,
            "EPOCH" => &mut epoch,
            "VERSION" => &mut version,
            "RELEASE" => &mut release,
            "URL" => &mut url,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }

    let required = |field: &str, value: Option<String>| match value {
        Some(v) if !v.is_empty() && v != UNSET => Ok(v),
        _ => Err(ExtractionError::Malformed(format!("missing {}", field))),
    };

    let epoch = match epoch.as_deref() {
        None | Some("") | Some(UNSET) => None,
        Some(e) => Some(e.parse::<u32>().map_err(|_| {
            ExtractionError::Malformed(format!("invalid Epoch {:?}", e))
        })?),
    };

    Ok(QueryFields {
        name: required("Name", name)?,
        epoch,
        version: required("Version", version)?,
        release: required("Release", release)?,
        url: url.filter(|u| !u.is_empty() && u != UNSET),
    })
}

/// Collect `SourceN:`/`PatchN:` tags from an expanded spec in the order they
/// are declared. Tags in `%package` preambles are included.
pub fn parse_source_tags(expanded: &str) -> Vec<SourceTag> {
    let mut tags = Vec::new();
    let mut in_preamble = true;

    for line in expanded.lines() {
        let trimmed = line.trim_start();
        if let Some(directive) = trimmed.strip_prefix('%') {
            let word: String = directive
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            if BODY_SECTIONS.contains(&word.as_str()) {
                break;
            }
            if word == "package" {
                in_preamble = true;
            } else if TEXT_SECTIONS.contains(&word.as_str()) {
                in_preamble = false;
            }
            continue;
        }
        if !in_preamble {
            continue;
        }

        if let Some(caps) = SOURCE_TAG_RE.captures(trimmed) {
            let kind = if caps[1].eq_ignore_ascii_case("source") {
                SourceKind::Source
            } else {
                SourceKind::Patch
            };
            tags.push(SourceTag {
                kind,
                number: caps[2].parse().ok(),
                value: caps[3].to_string(),
            });
        }
    }

    tags
}
