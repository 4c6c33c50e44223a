//! Spec against catalog reconciliation

use crate::dist::DistTag;
use crate::error::VersionParseError;
use crate::model::{Catalog, ComparisonResult, MismatchSeverity, SpecRecord, Verdict};
use crate::version::Evr;

/// Compare a spec's version with the catalog entry for the same package.
///
/// Section suffixes are stripped from the spec release first so that
/// `3.mga10.nonfree` and `3.mga10` are the same build. A missing epoch
/// counts as 0, except for catalog entries whose source has no notion of
/// epochs; those take the spec's epoch.
pub fn reconcile(
    record: &SpecRecord,
    catalog: &Catalog,
    dist: &DistTag,
) -> Result<ComparisonResult, VersionParseError> {
    let spec = Evr::new(
        record.epoch,
        record.version.clone(),
        dist.canonical_release(&record.release),
    )?;

    let Some(entry) = catalog.get(&record.package_name) else {
        return Ok(ComparisonResult {
            package_name: record.package_name.clone(),
            spec: Some(spec),
            remote: None,
            verdict: Verdict::RemoteMissing,
        });
    };

    let mut remote = entry.evr.clone();
    if !entry.epoch_known && remote.epoch.is_none() {
        remote.epoch = spec.epoch;
    }

    let verdict = if spec == remote {
        Verdict::Match
    } else if spec.same_version(&remote) {
        Verdict::Mismatch(MismatchSeverity::ReleaseOnly)
    } else {
        Verdict::Mismatch(MismatchSeverity::Version)
    };

    Ok(ComparisonResult {
        package_name: record.package_name.clone(),
        spec: Some(spec),
        remote: Some(remote),
        verdict,
    })
}

/// Result for a package whose spec could not be read or compared.
pub fn unparsable(package_name: &str) -> ComparisonResult {
    ComparisonResult {
        package_name: package_name.to_string(),
        spec: None,
        remote: None,
        verdict: Verdict::SpecUnparsable,
    }
}
