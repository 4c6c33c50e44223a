//! spectree CLI
//!
//! Runs one audit over a spec tree and writes a single report.

mod cli;
mod output;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use tracing::{info, warn, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

use spectree_core::{
    diagnostics::DiagnosticWriter,
    pipeline::{check_urls, check_versions},
    report::{build_mismatch_report, build_url_report, html, text},
    Config, DiagnosticLog, Error, Report, ReportContext, Result, RpmspecExtractor, SpecExtractor,
    SpecLocation, SpecTree, UrlProber,
};
use spectree_remote::{build_client, fetch_maintainers, NetworkProber, SrpmIndexCatalog};

use crate::cli::{CatalogArgs, Cli, Commands, CommonArgs, ReportFormat};

static CHECK_MARK: LazyLock<colored::ColoredString> = LazyLock::new(|| "✔".bright_green().bold());
static CROSS_MARK: LazyLock<colored::ColoredString> = LazyLock::new(|| "〤".bright_red().bold());

const INTERRUPTED: u8 = 130;

fn setup_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    // RUST_LOG, when set, overrides --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_error(e),
    };
    setup_logging(&cli.log_level);

    tokio::select! {
        result = run(cli.command) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("[{}] {}", &*CROSS_MARK, e);
                ExitCode::from(e.exit_code())
            }
        },
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("[{}] Interrupted, no report written", &*CROSS_MARK);
            ExitCode::from(INTERRUPTED)
        }
    }
}

fn usage_error(e: clap::Error) -> ExitCode {
    let _ = e.print();
    ExitCode::from(usage_exit_code(e.kind()))
}

/// Exit status for a command line that was not run: 0 for --version, 1 when
/// only help was shown, 2 for anything the parser rejected.
fn usage_exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayVersion => 0,
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 1,
        _ => 2,
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Mismatch { common, catalog } => cmd_mismatch(common, catalog).await,
        Commands::UrlCheck {
            common,
            no_recheck,
            skip_url_check,
        } => cmd_url_check(common, no_recheck, skip_url_check).await,
    }
}

fn build_config(args: &CommonArgs) -> Result<Config> {
    let mut config = Config::new(&args.root)?;
    config.layout = args.layout.parse()?;
    config.package_filter = args.packages.clone();
    config.workers = args.workers;
    config.request_timeout = Duration::from_secs(args.timeout);
    config.extract_timeout = Duration::from_secs(args.extract_timeout);
    config.dist = args.release.parse()?;
    config.rpmspec = args.rpmspec.clone();
    config.validate()?;
    Ok(config)
}

async fn cmd_mismatch(common: CommonArgs, args: CatalogArgs) -> Result<()> {
    let config = build_config(&common)?;
    let (session, locations) = Session::open(config, &common)?;

    let source = SrpmIndexCatalog::new(
        session.client.clone(),
        args.srpm_source.clone(),
        args.distro_version.clone(),
        session.config.dist.clone(),
    )
    .with_medias(args.media.clone())
    .with_section(args.section.clone());

    let results = match check_versions(
        &session.config,
        locations,
        Arc::clone(&session.extractor),
        &source,
        &session.diagnostics,
    )
    .await
    {
        Ok(results) => results,
        Err(e) => return Err(session.abort(e)),
    };

    let title = format!(
        "{} ({}) Spec Build Report",
        args.distro_version, session.config.dist
    );
    let mut ctx = session.report_context(title, &common).await;
    ctx.max_matching_rows = args.max_matching;
    let report = build_mismatch_report(&results, &session.config.dist, &ctx);
    session.finish(&report, &common)
}

async fn cmd_url_check(common: CommonArgs, no_recheck: bool, skip_url_check: bool) -> Result<()> {
    let mut config = build_config(&common)?;
    config.recheck = !no_recheck;
    config.probe_urls = !skip_url_check;
    let (session, locations) = Session::open(config, &common)?;

    let prober: Arc<dyn UrlProber> = Arc::new(NetworkProber::new(
        session.client.clone(),
        session.config.request_timeout,
    ));
    let run = match check_urls(
        &session.config,
        locations,
        Arc::clone(&session.extractor),
        prober,
        &session.diagnostics,
    )
    .await
    {
        Ok(run) => run,
        Err(e) => return Err(session.abort(e)),
    };

    let ctx = session
        .report_context("Spec URL Check Report".to_string(), &common)
        .await;
    let report = build_url_report(&run, &ctx);
    session.finish(&report, &common)
}

fn run_error_after_close(err: Error, closed: Result<usize>) -> Error {
    if let Err(close_err) = closed {
        warn!("Could not flush diagnostics: {}", close_err);
    }
    err
}

/// Everything an audit needs once its configuration has been accepted.
struct Session {
    config: Config,
    extractor: Arc<dyn SpecExtractor>,
    client: reqwest::Client,
    diagnostics: DiagnosticLog,
    writer: DiagnosticWriter<Box<dyn Write + Send>>,
    spec_count: usize,
    started: Instant,
}

impl Session {
    fn open(config: Config, args: &CommonArgs) -> Result<(Self, Vec<SpecLocation>)> {
        let started = Instant::now();
        let extractor = RpmspecExtractor::from_config(&config)?;
        let client = build_client(config.request_timeout)
            .map_err(|e| Error::Config(format!("cannot set up HTTP client: {}", e)))?;

        let dest: Box<dyn Write + Send> = match &args.diagnostics {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(io::stderr()),
        };
        let (diagnostics, writer) = DiagnosticLog::spawn(dest);
        let extractor = extractor.with_diagnostics(diagnostics.clone());

        let tree = SpecTree::new(&config.root, config.layout)
            .with_filter(config.package_pattern()?)
            .with_diagnostics(diagnostics.clone())
            .resolve()?;
        info!(
            "Scanning {} ({} layout)",
            tree.root().display(),
            tree.layout()
        );
        let locations: Vec<SpecLocation> = tree.iter()?.collect();
        if locations.is_empty() {
            return Err(Error::Config(format!(
                "no spec files matching '{}' in {}",
                config.package_filter,
                config.root.display()
            )));
        }

        let session = Session {
            config,
            extractor: Arc::new(extractor),
            client,
            diagnostics,
            writer,
            spec_count: locations.len(),
            started,
        };
        Ok((session, locations))
    }

    async fn report_context(&self, title: String, args: &CommonArgs) -> ReportContext {
        let mut ctx = ReportContext::new(title);
        if !args.no_date {
            ctx.generated = Some(chrono::Local::now().format("%Y-%m-%d %H:%M").to_string());
        }
        ctx.package_link = (!args.browse_url.is_empty()).then(|| args.browse_url.clone());

        if !args.no_maintainers {
            match fetch_maintainers(&self.client, &args.maintdb_url).await {
                Ok(maintainers) => ctx.maintainers = maintainers,
                Err(e) => {
                    warn!("Maintainer database unavailable: {}", e);
                    self.diagnostics
                        .warn(None, format!("maintainer database unavailable: {}", e));
                }
            }
        }
        ctx
    }

    /// Stop the diagnostic writer, returning the number of lines written.
    fn close(self) -> Result<usize> {
        let (mut dest, count) = self.writer.finish(self.diagnostics)?;
        dest.flush()?;
        Ok(count)
    }

    /// Close the session after a failed run. The run's error wins over any
    /// failure to flush diagnostics.
    fn abort(self, err: Error) -> Error {
        run_error_after_close(err, self.close())
    }

    fn finish(self, report: &Report, args: &CommonArgs) -> Result<()> {
        let rendered = match args.format {
            ReportFormat::Html => html::render(report),
            ReportFormat::Json => report.to_json()? + "\n",
            ReportFormat::Text => text::render(report),
        };
        output::write_report(&rendered, args.output.as_deref())?;

        let spec_count = self.spec_count;
        let elapsed = self.started.elapsed();
        let diagnostic_count = self.close()?;

        eprintln!();
        for line in &report.summary {
            eprintln!("[{}] {}: {}", "+".bright_blue().bold(), line.label, line.count);
        }
        if diagnostic_count > 0 {
            eprintln!(
                "[{}] {} diagnostic(s) reported",
                &*CROSS_MARK, diagnostic_count
            );
        }
        if let Some(path) = &args.output {
            eprintln!("[{}] Report written to {}", &*CHECK_MARK, path.display());
        }
        eprintln!(
            "[{}] Checked {} spec file(s) in {:#?}",
            &*CHECK_MARK, spec_count, elapsed
        );
        Ok(())
    }
}
