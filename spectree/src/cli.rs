use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use spectree_core::config::{DEFAULT_RELEASE, DEFAULT_WORKERS};
use spectree_core::report::{DEFAULT_MAX_MATCHING_ROWS, DEFAULT_PACKAGE_LINK};
use spectree_remote::catalog::{DEFAULT_SECTION, DEFAULT_SRPM_SOURCE};
use spectree_remote::maintdb::MAINTDB_URL;

#[derive(Parser)]
#[command(name = "spectree")]
#[command(about = "Audit a tree of RPM spec files against the build catalog and upstream URLs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report specs whose version differs from the built SRPM
    Mismatch {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Report declared URLs that do not answer or are insecure
    UrlCheck {
        #[command(flatten)]
        common: CommonArgs,

        /// Do not re-probe URLs that failed with a transient error
        #[arg(long)]
        no_recheck: bool,

        /// Only list insecure and malformed URLs, without network access
        #[arg(short = 'c', long)]
        skip_url_check: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Html,
    Json,
    Text,
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Top of the spec tree
    #[arg(short = 'C', long, env = "SPECTREE_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Checkout layout (auto, flat, specs, current-specs)
    #[arg(long, default_value = "auto")]
    pub layout: String,

    /// Only check package directories matching this glob
    #[arg(short = 'l', long, default_value = "*")]
    pub packages: String,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Network request timeout (in seconds)
    #[arg(long, default_value = "15")]
    pub timeout: u64,

    /// Timeout for each rpmspec invocation (in seconds)
    #[arg(long, default_value = "60")]
    pub extract_timeout: u64,

    /// Path to rpmspec (default: found in PATH)
    #[arg(long)]
    pub rpmspec: Option<PathBuf>,

    /// Dist tag of the release being checked; a bare number N means mgaN
    #[arg(short = 'r', long, default_value = DEFAULT_RELEASE)]
    pub release: String,

    /// Report format
    #[arg(short = 'f', long, value_enum, default_value = "html")]
    pub format: ReportFormat,

    /// Report file (stdout if not specified)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Write per-package diagnostics to this file instead of stderr
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,

    /// Maintainer database location (http, https or file URL)
    #[arg(long, env = "SPECTREE_MAINTDB", default_value = MAINTDB_URL)]
    pub maintdb_url: String,

    /// Do not fetch the maintainer database
    #[arg(long)]
    pub no_maintainers: bool,

    /// Per-package link, {package} is replaced by the package name; empty disables links
    #[arg(long, default_value = DEFAULT_PACKAGE_LINK)]
    pub browse_url: String,

    /// Leave the generation date out of the report
    #[arg(long)]
    pub no_date: bool,
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// SRPM listing location with {version}, {media} and {section} placeholders
    #[arg(short = 's', long, env = "SPECTREE_MIRROR", default_value = DEFAULT_SRPM_SOURCE)]
    pub srpm_source: String,

    /// Distribution version used in the listing location
    #[arg(long, default_value = "cauldron")]
    pub distro_version: String,

    /// Medias to list, comma separated
    #[arg(long, value_delimiter = ',', default_value = "tainted,nonfree,core")]
    pub media: Vec<String>,

    /// Media section to list
    #[arg(long, default_value = DEFAULT_SECTION)]
    pub section: String,

    /// Omit the matching versions table above this many rows
    #[arg(long, default_value_t = DEFAULT_MAX_MATCHING_ROWS)]
    pub max_matching: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_mismatch_defaults() {
        let cli = Cli::try_parse_from(["spectree", "mismatch"]).unwrap();
        let Commands::Mismatch { common, catalog } = cli.command else {
            panic!("expected mismatch");
        };
        assert_eq!(common.workers, 4);
        assert_eq!(common.release, "mga10");
        assert_eq!(common.format, ReportFormat::Html);
        assert_eq!(catalog.media, vec!["tainted", "nonfree", "core"]);
        assert_eq!(catalog.max_matching, 300);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_url_check_flags() {
        let cli = Cli::try_parse_from([
            "spectree",
            "url-check",
            "-C",
            "/srv/packages",
            "-j",
            "8",
            "-f",
            "json",
            "--no-recheck",
            "-l",
            "perl-*",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let Commands::UrlCheck {
            common,
            no_recheck,
            skip_url_check,
        } = cli.command
        else {
            panic!("expected url-check");
        };
        assert!(no_recheck);
        assert!(!skip_url_check);
        assert_eq!(common.root, PathBuf::from("/srv/packages"));
        assert_eq!(common.workers, 8);
        assert_eq!(common.format, ReportFormat::Json);
        assert_eq!(common.packages, "perl-*");
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_skip_url_check() {
        for flag in ["-c", "--skip-url-check"] {
            let cli = Cli::try_parse_from(["spectree", "url-check", flag]).unwrap();
            let Commands::UrlCheck { skip_url_check, .. } = cli.command else {
                panic!("expected url-check");
            };
            assert!(skip_url_check);
        }
        assert!(Cli::try_parse_from(["spectree", "mismatch", "-c"]).is_err());
    }

    #[test]
    fn test_media_list() {
        let cli =
            Cli::try_parse_from(["spectree", "mismatch", "--media", "core,nonfree"]).unwrap();
        let Commands::Mismatch { catalog, .. } = cli.command else {
            panic!("expected mismatch");
        };
        assert_eq!(catalog.media, vec!["core", "nonfree"]);
    }

    #[test]
    fn test_argument_errors() {
        let err = Cli::try_parse_from(["spectree", "mismatch", "-j", "many"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);

        let err = Cli::try_parse_from(["spectree", "--help"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        let err = Cli::try_parse_from(["spectree", "mismatch", "-f", "pdf"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }
}
