//! Report assembly
//!
//! Results are grouped into named tables whose ids and column order are a
//! stable contract; consumers extract them with generic XML or JSON tools.
//! Rows are sorted before the report is handed out, so the output does not
//! depend on the order in which workers finished.

pub mod html;
pub mod text;

use serde::Serialize;

use crate::dist::DistTag;
use crate::model::{
    ComparisonResult, Maintainers, MismatchSeverity, ProbeOutcome, UrlCheckResult, Verdict,
};
use crate::pipeline::UrlCheckRun;
use crate::Result;

pub const DEFAULT_MAX_MATCHING_ROWS: usize = 300;

/// Browsable spec location, `{package}` is replaced by the package name
pub const DEFAULT_PACKAGE_LINK: &str =
    "https://svnweb.mageia.org/packages/cauldron/{package}/current/SPECS/{package}.spec";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: None,
        }
    }

    pub fn link(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: Some(href.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub id: String,
    pub heading: String,
    pub description: String,
    pub columns: Vec<String>,
    /// Number of entries, including rows that were left out
    pub count: usize,
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omitted: Option<String>,
}

impl Table {
    fn new(id: &str, heading: &str, description: &str, columns: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            heading: heading.to_string(),
            description: description.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            count: 0,
            rows: Vec::new(),
            omitted: None,
        }
    }

    fn push(&mut self, class: Option<&str>, cells: Vec<Cell>) {
        self.count += 1;
        self.rows.push(Row {
            class: class.map(str::to_string),
            cells,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
    pub summary: Vec<SummaryLine>,
    pub tables: Vec<Table>,
}

impl Report {
    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Presentation settings shared by both report kinds.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub title: String,
    /// Date shown in the heading; left out for reproducible output
    pub generated: Option<String>,
    pub maintainers: Maintainers,
    pub package_link: Option<String>,
    pub max_matching_rows: usize,
}

impl ReportContext {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            generated: None,
            maintainers: Maintainers::default(),
            package_link: Some(DEFAULT_PACKAGE_LINK.to_string()),
            max_matching_rows: DEFAULT_MAX_MATCHING_ROWS,
        }
    }

    fn maintainer(&self, package: &str) -> Cell {
        Cell::text(self.maintainers.get(package))
    }

    fn package(&self, package: &str) -> Cell {
        match &self.package_link {
            Some(template) => Cell::link(package, template.replace("{package}", package)),
            None => Cell::text(package),
        }
    }

    fn report(&self, lines: &[(&str, usize)], tables: Vec<Table>) -> Report {
        Report {
            title: self.title.clone(),
            generated: self.generated.clone(),
            summary: lines
                .iter()
                .map(|(label, count)| SummaryLine {
                    label: label.to_string(),
                    count: *count,
                })
                .collect(),
            tables,
        }
    }
}

/// Build the version mismatch report.
pub fn build_mismatch_report(
    results: &[ComparisonResult],
    dist: &DistTag,
    ctx: &ReportContext,
) -> Report {
    let mut sorted: Vec<&ComparisonResult> = results.iter().collect();
    sorted.sort_by(|a, b| a.package_name.cmp(&b.package_name));

    let mut missing = Table::new(
        "missingremote",
        "Spec files with no matching SRPM of any version",
        "There is no source package in the catalog matching the spec file. The \
         package may have been imported but never built, or it was obsoleted \
         without its spec file being retired.",
        &["Maintainer", "Package"],
    );
    let mut wrong = Table::new(
        "wrongversions",
        "Wrong SRPM version",
        "The latest built source package does not match the version in the spec \
         file. Rows of class release differ only in the release number; rows of \
         class distrib have not been rebuilt since the last distribution release.",
        &["Maintainer", "Package", "Remote version", "Spec version", "Difference"],
    );
    let mut unparsable = unparsable_table();
    let mut matching = Table::new(
        "matchingversions",
        "Spec and SRPM versions match",
        "The version of the built source package matches the spec file.",
        &["Maintainer", "Package", "Version"],
    );

    for result in sorted {
        let name = result.package_name.as_str();
        match (&result.verdict, &result.spec, &result.remote) {
            (Verdict::Match, Some(spec), _) => matching.push(
                None,
                vec![ctx.maintainer(name), ctx.package(name), Cell::text(spec.to_string())],
            ),
            (Verdict::Mismatch(severity), Some(spec), Some(remote)) => {
                let spec_dist = dist.release_number(&spec.release);
                let remote_dist = dist.release_number(&remote.release);
                let class = if spec_dist != remote_dist {
                    Some("distrib")
                } else if *severity == MismatchSeverity::ReleaseOnly {
                    Some("release")
                } else {
                    None
                };
                let difference = match severity {
                    MismatchSeverity::ReleaseOnly => "release",
                    MismatchSeverity::Version => "version",
                };
                wrong.push(
                    class,
                    vec![
                        ctx.maintainer(name),
                        ctx.package(name),
                        Cell::text(remote.to_string()),
                        Cell::text(spec.to_string()),
                        Cell::text(difference),
                    ],
                );
            }
            (Verdict::RemoteMissing, _, _) => {
                missing.push(None, vec![ctx.maintainer(name), ctx.package(name)])
            }
            _ => unparsable.push(None, vec![ctx.maintainer(name), ctx.package(name)]),
        }
    }

    if matching.count > ctx.max_matching_rows {
        matching.omitted = Some(format!(
            "{} spec files have matching SRPMs (not shown)",
            matching.count
        ));
        matching.rows.clear();
    }

    let lines = [
        ("Packages checked", results.len()),
        ("Missing SRPMs", missing.count),
        ("Wrong SRPM versions", wrong.count),
        ("Unparsable specs", unparsable.count),
        ("Matching versions", matching.count),
    ];
    ctx.report(&lines, vec![missing, wrong, unparsable, matching])
}

/// Build the URL check report.
pub fn build_url_report(run: &UrlCheckRun, ctx: &ReportContext) -> Report {
    let mut sorted: Vec<&UrlCheckResult> = run.checked.iter().collect();
    sorted.sort_by(|a, b| {
        a.package_name
            .cmp(&b.package_name)
            .then(a.url_use.cmp(&b.url_use))
            .then(a.url.cmp(&b.url))
    });

    let mut errors = Table::new(
        "urlerrors",
        "Spec files with bad URLs",
        "Declared URLs that could not be confirmed to work.",
        &["Maintainer", "Package", "URL use", "Outcome", "Detail", "URL"],
    );
    let mut insecure = Table::new(
        "insecureurls",
        "Spec files with insecure URLs",
        "Declared URLs that point to unencrypted resources.",
        &["Maintainer", "Package", "URL use", "URL"],
    );

    for result in &sorted {
        let name = result.package_name.as_str();
        let url_cell = match result.outcome {
            ProbeOutcome::Malformed => Cell::text(&result.url),
            _ => Cell::link(&result.url, &result.url),
        };
        if !matches!(result.outcome, ProbeOutcome::Ok | ProbeOutcome::Skipped) {
            errors.push(
                None,
                vec![
                    ctx.maintainer(name),
                    ctx.package(name),
                    Cell::text(result.url_use.label()),
                    Cell::text(result.outcome.as_str()),
                    Cell::text(result.detail.clone().unwrap_or_default()),
                    url_cell.clone(),
                ],
            );
        }
        if result.is_insecure() {
            insecure.push(
                None,
                vec![
                    ctx.maintainer(name),
                    ctx.package(name),
                    Cell::text(result.url_use.label()),
                    url_cell,
                ],
            );
        }
    }

    let mut unparsable = unparsable_table();
    let mut names: Vec<&String> = run.unparsable.iter().collect();
    names.sort();
    for name in names {
        unparsable.push(None, vec![ctx.maintainer(name), ctx.package(name)]);
    }

    let lines = [
        (
            "URLs checked",
            sorted
                .iter()
                .filter(|r| r.outcome != ProbeOutcome::Skipped)
                .count(),
        ),
        ("Bad URLs", errors.count),
        ("Insecure URLs", insecure.count),
        ("Unparsable specs", unparsable.count),
    ];
    ctx.report(&lines, vec![errors, insecure, unparsable])
}

fn unparsable_table() -> Table {
    Table::new(
        "unparsable",
        "Could not determine the version of these packages",
        "The spec file could not be expanded. This can be a syntax error, a \
         missing %include file or a tool used in a macro that is not installed.",
        &["Maintainer", "Package"],
    )
}
