//! Media library deployment: mirror `media/` into the public directory
//!
//! Large image and video files live outside the content tree and are only
//! copied (or symlinked) into `public/media/` when they are new or changed.

use anyhow::{bail, Context, Result};
use glob::Pattern;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::Site;

/// Output directory under `public/`
pub const MEDIA_OUTPUT_DIR: &str = "media";

/// How files reach the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Copy,
    /// Symlink to the absolute source path (unix only)
    Symlink,
}

/// What a sync did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub copied: usize,
    pub linked: usize,
    pub skipped: usize,
    pub removed: usize,
}

/// Media sync job
pub struct MediaSync {
    source: PathBuf,
    dest: PathBuf,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    mode: SyncMode,
    clean: bool,
}

impl MediaSync {
    pub fn new(source: PathBuf, dest: PathBuf, include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            source,
            dest,
            include: compile(include)?,
            exclude: compile(exclude)?,
            mode: SyncMode::Copy,
            clean: false,
        })
    }

    /// `<media_dir>` to `<public_dir>/media` with the configured globs
    pub fn for_site(site: &Site) -> Result<Self> {
        Self::new(
            site.media_dir.clone(),
            site.public_dir.join(MEDIA_OUTPUT_DIR),
            &site.config.media.include,
            &site.config.media.exclude,
        )
    }

    pub fn mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Also delete destination files that no longer exist in the source
    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn run(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        if !self.source.is_dir() {
            tracing::warn!("Media directory {:?} does not exist, nothing to sync", self.source);
            return Ok(report);
        }
        if self.mode == SyncMode::Symlink && !cfg!(unix) {
            bail!("Symlink mode is only supported on unix");
        }

        fs::create_dir_all(&self.dest)
            .with_context(|| format!("Failed to create {:?}", self.dest))?;

        let mut synced: HashSet<PathBuf> = HashSet::new();

        for entry in WalkDir::new(&self.source)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.source)?.to_path_buf();
            if !self.is_selected(&relative) {
                tracing::debug!("Excluded: {:?}", relative);
                continue;
            }

            let target = self.dest.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            match self.mode {
                SyncMode::Copy => {
                    if is_up_to_date(entry.path(), &target)? {
                        report.skipped += 1;
                    } else {
                        remove_existing(&target)?;
                        fs::copy(entry.path(), &target).with_context(|| {
                            format!("Failed to copy {:?} to {:?}", entry.path(), target)
                        })?;
                        tracing::debug!("Copied: {:?}", relative);
                        report.copied += 1;
                    }
                }
                SyncMode::Symlink => {
                    let absolute = fs::canonicalize(entry.path())?;
                    if fs::read_link(&target).is_ok_and(|current| current == absolute) {
                        report.skipped += 1;
                    } else {
                        remove_existing(&target)?;
                        symlink(&absolute, &target)?;
                        tracing::debug!("Linked: {:?}", relative);
                        report.linked += 1;
                    }
                }
            }

            synced.insert(relative);
        }

        if self.clean {
            report.removed = self.remove_stale(&synced)?;
        }

        tracing::info!(
            "Media sync: {} copied, {} linked, {} unchanged, {} removed",
            report.copied,
            report.linked,
            report.skipped,
            report.removed
        );
        Ok(report)
    }

    fn is_selected(&self, relative: &Path) -> bool {
        let included = self.include.iter().any(|p| p.matches_path(relative));
        included && !self.exclude.iter().any(|p| p.matches_path(relative))
    }

    /// Delete destination entries that were not part of this sync
    fn remove_stale(&self, synced: &HashSet<PathBuf>) -> Result<usize> {
        let mut removed = 0;

        for entry in WalkDir::new(&self.dest)
            .follow_links(false)
            .contents_first(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let relative = path.strip_prefix(&self.dest)?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            if entry.file_type().is_dir() {
                // Only succeeds once the directory is empty
                if fs::remove_dir(path).is_ok() {
                    tracing::debug!("Removed empty directory: {:?}", relative);
                }
            } else if !synced.contains(relative) {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove {:?}", path))?;
                tracing::debug!("Removed: {:?}", relative);
                removed += 1;
            }
        }

        Ok(removed)
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("Invalid media glob {:?}", p)))
        .collect()
}

/// Same size and not older than the source
fn is_up_to_date(source: &Path, target: &Path) -> Result<bool> {
    let Ok(target_meta) = fs::symlink_metadata(target) else {
        return Ok(false);
    };
    if !target_meta.file_type().is_file() {
        return Ok(false);
    }
    let source_meta = fs::metadata(source)?;
    if source_meta.len() != target_meta.len() {
        return Ok(false);
    }
    Ok(target_meta.modified()? >= source_meta.modified()?)
}

/// Remove whatever sits at `path` (file, symlink or directory)
fn remove_existing(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(_) => {}
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, target)
        .with_context(|| format!("Failed to link {:?} to {:?}", target, source))
}

#[cfg(not(unix))]
fn symlink(_source: &Path, _target: &Path) -> Result<()> {
    bail!("Symlink mode is only supported on unix")
}
