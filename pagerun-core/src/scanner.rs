use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::TemplateConfig;
use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    Skipped,
}

/// What a single pass over the source tree found and did.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Site paths of every template module, e.g. `/docs/index.tsx`
    pub templates: Vec<String>,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Walks the source tree, mirroring plain assets into the output tree and
/// collecting template modules as build candidates.
pub struct SiteScanner {
    source_dir: PathBuf,
    output_dir: PathBuf,
    template: TemplateConfig,
    force: bool,
}

impl SiteScanner {
    pub fn new<S: AsRef<Path>, O: AsRef<Path>>(source: S, output: O, template: TemplateConfig) -> Self {
        Self {
            source_dir: source.as_ref().to_path_buf(),
            output_dir: output.as_ref().to_path_buf(),
            template,
            force: false,
        }
    }

    /// Copy assets even when the output looks up to date.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn scan(&self) -> Result<ScanReport, ScanError> {
        if !self.source_dir.is_dir() {
            return Err(ScanError::InvalidPath(self.source_dir.clone()));
        }

        tracing::info!(source = %self.source_dir.display(), "scanning");
        let mut report = ScanReport::default();

        for entry in WalkDir::new(&self.source_dir)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "unreadable source entry");
                    report.failed += 1;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.source_dir)
                .map_err(|_| ScanError::InvalidPath(entry.path().to_path_buf()))?;

            if self.template.is_template(relative) {
                report.templates.push(site_path(relative));
                continue;
            }

            let dest = self.output_dir.join(relative);
            match copy_if_newer(entry.path(), &dest, self.force) {
                Ok(CopyOutcome::Copied) => {
                    tracing::info!(path = %dest.display(), "copy");
                    report.copied += 1;
                }
                Ok(CopyOutcome::Skipped) => {
                    tracing::debug!(path = %dest.display(), "skip");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %dest.display(), error = %e, "copy failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

/// `/`-separated site path for a path relative to the source root.
pub fn site_path(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", parts.join("/"))
}

/// True when `newer` was modified after `older`, or either cannot be read.
///
/// Symlinks are compared by their own timestamps, not their targets'.
pub fn is_file_newer(newer: &Path, older: &Path) -> bool {
    let modified = |path: &Path| fs::symlink_metadata(path).and_then(|m| m.modified());
    match (modified(newer), modified(older)) {
        (Ok(newer), Ok(older)) => newer > older,
        _ => true,
    }
}

/// Mirror `src` to `dest` unless `dest` is already up to date.
///
/// A symlink is recreated pointing at the same target instead of being
/// dereferenced.
pub fn copy_if_newer(src: &Path, dest: &Path, force: bool) -> io::Result<CopyOutcome> {
    if !force && !is_file_newer(src, dest) {
        return Ok(CopyOutcome::Skipped);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    // Never write through an existing link at the destination.
    if let Ok(existing) = fs::symlink_metadata(dest) {
        if existing.is_dir() {
            fs::remove_dir_all(dest)?;
        } else {
            fs::remove_file(dest)?;
        }
    }

    if fs::symlink_metadata(src)?.file_type().is_symlink() {
        let target = fs::read_link(src)?;
        make_symlink(&target, dest)?;
    } else {
        fs::copy(src, dest)?;
    }

    Ok(CopyOutcome::Copied)
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = link.parent().map(|p| p.join(target)).unwrap_or_else(|| target.to_path_buf());
    if resolved.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}
