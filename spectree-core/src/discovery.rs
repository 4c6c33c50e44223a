//! Spec discovery
//!
//! A spec tree holds one directory per package. Depending on how it was
//! checked out, the spec for package `foo` lives at one of:
//! - `foo/foo.spec` (flat)
//! - `foo/SPECS/foo.spec` (specs)
//! - `foo/current/SPECS/foo.spec` (current-specs)

use std::fmt;
use std::fs::{self, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::diagnostics::DiagnosticLog;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Detect from the tree contents
    Auto,
    Flat,
    Specs,
    CurrentSpecs,
}

impl Layout {
    /// Location of the spec for the package in `package_dir`.
    pub fn spec_path(&self, package_dir: &Path, package: &str) -> Option<PathBuf> {
        let file = format!("{}.spec", package);
        match self {
            Layout::Auto => None,
            Layout::Flat => Some(package_dir.join(file)),
            Layout::Specs => Some(package_dir.join("SPECS").join(file)),
            Layout::CurrentSpecs => Some(package_dir.join("current").join("SPECS").join(file)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Auto => "auto",
            Layout::Flat => "flat",
            Layout::Specs => "specs",
            Layout::CurrentSpecs => "current-specs",
        }
    }

    fn detect(package_dir: &Path, package: &str) -> Option<Layout> {
        if package_dir.join("current").join("SPECS").is_dir() {
            return Some(Layout::CurrentSpecs);
        }
        if package_dir.join("SPECS").is_dir() {
            return Some(Layout::Specs);
        }
        if package_dir.join(format!("{}.spec", package)).is_file() {
            return Some(Layout::Flat);
        }
        None
    }
}

impl FromStr for Layout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Layout::Auto),
            "flat" | "spec-only" => Ok(Layout::Flat),
            "specs" | "individual" => Ok(Layout::Specs),
            "current-specs" | "massive" => Ok(Layout::CurrentSpecs),
            other => Err(Error::Config(format!(
                "unsupported tree layout '{}' (expected auto, flat, specs or current-specs)",
                other
            ))),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spec file found in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLocation {
    pub package: String,
    pub package_dir: PathBuf,
    pub path: PathBuf,
}

pub struct SpecTree {
    root: PathBuf,
    layout: Layout,
    filter: Option<glob::Pattern>,
    diagnostics: Option<DiagnosticLog>,
}

impl SpecTree {
    pub fn new(root: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            root: root.into(),
            layout,
            filter: None,
            diagnostics: None,
        }
    }

    /// Only consider package directories whose name matches `pattern`.
    pub fn with_filter(mut self, pattern: glob::Pattern) -> Self {
        self.filter = Some(pattern);
        self
    }

    pub fn with_diagnostics(mut self, log: DiagnosticLog) -> Self {
        self.diagnostics = Some(log);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace `Layout::Auto` with the layout found in the tree.
    pub fn resolve(mut self) -> Result<Self> {
        if self.layout != Layout::Auto {
            return Ok(self);
        }

        let mut candidates: Vec<(String, PathBuf)> = self.package_dirs()?.collect();
        if candidates.is_empty() {
            return Err(Error::Config(format!(
                "no package directories found in {}",
                self.root.display()
            )));
        }
        candidates.sort();

        for (package, dir) in &candidates {
            if let Some(layout) = Layout::detect(dir, package) {
                debug!("Detected {} layout from {}", layout, dir.display());
                self.layout = layout;
                return Ok(self);
            }
        }

        Err(Error::Config(format!(
            "unknown checkout style in {}",
            self.root.display()
        )))
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Walk the tree. Each call starts a fresh walk.
    pub fn iter(&self) -> Result<SpecIter<'_>> {
        if self.layout == Layout::Auto {
            return Err(Error::Config("tree layout has not been resolved".into()));
        }
        Ok(SpecIter {
            tree: self,
            dirs: self.package_dirs()?,
        })
    }

    fn package_dirs(&self) -> Result<PackageDirs<'_>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::Config(format!("cannot read spec tree {}: {}", self.root.display(), e))
        })?;
        Ok(PackageDirs {
            tree: self,
            entries,
        })
    }

    fn warn(&self, package: Option<&str>, msg: String) {
        warn!("{}", msg);
        if let Some(log) = &self.diagnostics {
            log.warn(package, msg);
        }
    }
}

/// Non-hidden directories directly under the root that match the filter.
struct PackageDirs<'a> {
    tree: &'a SpecTree,
    entries: ReadDir,
}

impl Iterator for PackageDirs<'_> {
    type Item = (String, PathBuf);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    self.tree
                        .warn(None, format!("skipping unreadable directory entry: {}", e));
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if let Some(filter) = &self.tree.filter {
                if !filter.matches(&name) {
                    continue;
                }
            }

            let path = entry.path();
            // Follows symlinks, so a link to a package directory counts
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => return Some((name, path)),
                Ok(_) => continue,
                Err(e) => {
                    self.tree.warn(
                        Some(&name),
                        format!("skipping {}: {}", path.display(), e),
                    );
                }
            }
        }
    }
}

pub struct SpecIter<'a> {
    tree: &'a SpecTree,
    dirs: PackageDirs<'a>,
}

impl Iterator for SpecIter<'_> {
    type Item = SpecLocation;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (package, package_dir) = self.dirs.next()?;
            let path = self.tree.layout.spec_path(&package_dir, &package)?;

            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => {
                    return Some(SpecLocation {
                        package,
                        package_dir,
                        path,
                    })
                }
                Ok(_) => {
                    self.tree.warn(
                        Some(&package),
                        format!("{} is not a regular file", path.display()),
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("No spec file for {} at {}", package, path.display());
                }
                Err(e) => {
                    self.tree.warn(
                        Some(&package),
                        format!("skipping {}: {}", path.display(), e),
                    );
                }
            }
        }
    }
}
