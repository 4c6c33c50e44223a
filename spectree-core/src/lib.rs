//! spectree-core: audit engine for trees of RPM spec files
//!
//! This crate provides:
//! - Spec discovery over the supported checkout layouts
//! - Metadata extraction through `rpmspec`
//! - RPM epoch:version-release ordering
//! - Reconciliation against a remote catalog snapshot
//! - URL classification and probing through a pluggable prober
//! - A bounded worker pool and the diagnostic stream
//! - Report assembly and rendering

pub mod compare;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod dist;
pub mod error;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod probe;
pub mod report;
pub mod version;

pub use config::Config;
pub use diagnostics::DiagnosticLog;
pub use discovery::{Layout, SpecLocation, SpecTree};
pub use dist::DistTag;
pub use error::{Error, ExtractionError, FetchError, Result, TaskFailure, VersionParseError};
pub use extract::{RpmspecExtractor, SpecExtractor};
pub use model::{
    Catalog, CatalogSource, ComparisonResult, Maintainers, ProbeOutcome, RemoteVersionRecord,
    SpecRecord, UrlCheckResult, UrlUse, Verdict,
};
pub use probe::{Probe, UrlProber};
pub use report::{Report, ReportContext};
pub use version::{rpmvercmp, Evr};
