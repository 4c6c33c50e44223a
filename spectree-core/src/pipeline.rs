//! Audit pipelines
//!
//! Both modes share the same shape: extract every discovered spec on the
//! worker pool, then either compare it with the catalog snapshot or probe
//! the URLs it declares. Per-package failures become unparsable rows plus a
//! diagnostic; only a failed catalog fetch aborts the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::compare::{reconcile, unparsable};
use crate::config::Config;
use crate::diagnostics::DiagnosticLog;
use crate::discovery::SpecLocation;
use crate::error::FetchError;
use crate::extract::{extract_with_retry, SpecExtractor};
use crate::model::{CatalogSource, ComparisonResult, SpecRecord, UrlCheckResult, UrlUse};
use crate::pool::WorkerPool;
use crate::probe::{check_url, classify_unchecked, UrlProber};
use crate::Result;

/// Compare every spec with a single catalog snapshot.
pub async fn check_versions(
    config: &Config,
    locations: Vec<SpecLocation>,
    extractor: Arc<dyn SpecExtractor>,
    catalog_source: &dyn CatalogSource,
    diagnostics: &DiagnosticLog,
) -> Result<Vec<ComparisonResult>> {
    // Fetched before any worker starts; never refreshed during the run
    let catalog = catalog_source.fetch_catalog().await?;
    if catalog.is_empty() {
        return Err(FetchError::EmptyCatalog.into());
    }
    info!(
        "Comparing {} specs against {} catalog entries",
        locations.len(),
        catalog.len()
    );
    let catalog = Arc::new(catalog);

    let dist = config.dist.clone();
    let backoff = config.retry_backoff;
    let log = diagnostics.clone();

    let outcomes = WorkerPool::new(config.workers)
        .run(locations, move |location: SpecLocation| {
            let extractor = Arc::clone(&extractor);
            let catalog = Arc::clone(&catalog);
            let dist = dist.clone();
            let log = log.clone();
            async move {
                let package = location.package.as_str();
                let record = match extract_with_retry(extractor.as_ref(), &location, backoff).await {
                    Ok(record) => record,
                    Err(e) => {
                        log.error(Some(package), e.to_string());
                        return unparsable(package);
                    }
                };
                match reconcile(&record, &catalog, &dist) {
                    Ok(result) => result,
                    Err(e) => {
                        log.error(Some(package), e.to_string());
                        unparsable(package)
                    }
                }
            }
        })
        .await;

    Ok(outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(result) => result,
            Err(failure) => {
                diagnostics.error(Some(&outcome.item.package), failure.to_string());
                unparsable(&outcome.item.package)
            }
        })
        .collect())
}

/// Results of a URL check run.
#[derive(Debug, Default)]
pub struct UrlCheckRun {
    pub checked: Vec<UrlCheckResult>,
    /// Packages whose spec could not be read
    pub unparsable: Vec<String>,
}

/// Probe the URLs declared by every spec.
pub async fn check_urls(
    config: &Config,
    locations: Vec<SpecLocation>,
    extractor: Arc<dyn SpecExtractor>,
    prober: Arc<dyn UrlProber>,
    diagnostics: &DiagnosticLog,
) -> Result<UrlCheckRun> {
    if config.probe_urls {
        info!("Checking URLs in {} specs", locations.len());
    } else {
        info!("Collecting URLs from {} specs without probing", locations.len());
    }

    let backoff = config.retry_backoff;
    let mode = if config.probe_urls {
        ProbeMode::Network {
            recheck: config.recheck.then_some(config.retry_backoff),
        }
    } else {
        ProbeMode::Offline
    };
    let log = diagnostics.clone();

    let outcomes = WorkerPool::new(config.workers)
        .run(locations, move |location: SpecLocation| {
            let extractor = Arc::clone(&extractor);
            let prober = Arc::clone(&prober);
            let log = log.clone();
            async move {
                let record = match extract_with_retry(extractor.as_ref(), &location, backoff).await {
                    Ok(record) => record,
                    Err(e) => {
                        log.error(Some(&location.package), e.to_string());
                        return None;
                    }
                };
                Some(probe_record(&record, prober.as_ref(), mode, &log).await)
            }
        })
        .await;

    let mut run = UrlCheckRun::default();
    for outcome in outcomes {
        match outcome.result {
            Ok(Some(results)) => run.checked.extend(results),
            Ok(None) => run.unparsable.push(outcome.item.package),
            Err(failure) => {
                diagnostics.error(Some(&outcome.item.package), failure.to_string());
                run.unparsable.push(outcome.item.package);
            }
        }
    }
    Ok(run)
}

/// URLs a spec declares that should be probed, in declaration order with
/// duplicates removed. The homepage is always included; sources and patches
/// only when they point somewhere remote.
pub fn urls_to_check(record: &SpecRecord) -> Vec<(UrlUse, String)> {
    let mut seen = HashSet::new();
    let homepage = record
        .declared_url
        .iter()
        .map(|url| (UrlUse::Homepage, url.clone()));
    let sources = record
        .source_urls
        .iter()
        .filter(|tag| tag.is_url_like())
        .map(|tag| (UrlUse::from(tag.kind), tag.value.clone()));

    homepage
        .chain(sources)
        .filter(|(_, url)| seen.insert(url.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum ProbeMode {
    Network { recheck: Option<Duration> },
    Offline,
}

async fn probe_record(
    record: &SpecRecord,
    prober: &dyn UrlProber,
    mode: ProbeMode,
    diagnostics: &DiagnosticLog,
) -> Vec<UrlCheckResult> {
    let package = record.package_name.as_str();
    let mut results = Vec::new();
    for (url_use, url) in urls_to_check(record) {
        let probe = match mode {
            ProbeMode::Network { recheck } => check_url(prober, &url, recheck).await,
            ProbeMode::Offline => classify_unchecked(&url),
        };
        debug!("{}: {} {} -> {}", package, url_use, url, probe.outcome);
        if let Some(note) = &probe.note {
            diagnostics.warn(Some(package), format!("{}: {}", url, note));
        }
        results.push(UrlCheckResult {
            package_name: record.package_name.clone(),
            url_use,
            url,
            outcome: probe.outcome,
            detail: probe.detail,
        });
    }
    results
}
