//! Run configuration
//!
//! Built once at startup and passed to every component; nothing below this
//! layer reads the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::discovery::Layout;
use crate::dist::DistTag;
use crate::{Error, Result};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_RELEASE: &str = "mga10";

#[derive(Debug, Clone)]
pub struct Config {
    /// Top of the spec tree
    pub root: PathBuf,
    pub layout: Layout,
    /// Glob matched against package directory names
    pub package_filter: String,
    pub workers: usize,
    pub request_timeout: Duration,
    pub extract_timeout: Duration,
    /// Delay before retrying a transient failure
    pub retry_backoff: Duration,
    pub dist: DistTag,
    /// Explicit path to the macro-expansion tool
    pub rpmspec: Option<PathBuf>,
    /// Probe URLs over the network; when off they are only classified
    pub probe_urls: bool,
    /// Re-probe URLs that failed with a transient error
    pub recheck: bool,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            layout: Layout::Auto,
            package_filter: "*".to_string(),
            workers: DEFAULT_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            extract_timeout: DEFAULT_EXTRACT_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            dist: DistTag::new(DEFAULT_RELEASE)?,
            rpmspec: None,
            probe_urls: true,
            recheck: true,
        })
    }

    /// Reject settings that would make the run meaningless.
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::Config(format!(
                "spec tree root {} is not a directory",
                self.root.display()
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config("worker count must be at least 1".into()));
        }
        if self.request_timeout.is_zero() || self.extract_timeout.is_zero() {
            return Err(Error::Config("timeouts must be greater than zero".into()));
        }
        glob::Pattern::new(&self.package_filter)?;
        Ok(())
    }

    pub fn package_pattern(&self) -> Result<glob::Pattern> {
        Ok(glob::Pattern::new(&self.package_filter)?)
    }
}
