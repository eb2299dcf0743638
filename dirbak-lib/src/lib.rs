//! Directory backup core: duplicate a tree into `<dir>/<name>-copy` or pack
//! it into `<dir>/<name>.zip`.
//!
//! Front-ends resolve paths however they like and hand them to an
//! [`Archiver`]. Both operations are blocking and publish their output only
//! once it is complete.

use std::path::Path;

use tracing::{debug, info_span};

pub mod backup;
pub mod config;
pub mod error;
pub mod fs_utils;
pub mod naming;
pub mod packaging;

pub use backup::BackupResult;
pub use config::{CollisionPolicy, Config};
pub use error::{ArchiverError, ArchiverResult};
pub use fs_utils::{EntryKind, SkipRules, TreeEntry, encode_size, total_size};
pub use naming::SourceDir;
pub use packaging::ArchiveResult;

/// Runs backups and archives of a source directory.
#[derive(Debug, Clone, Default)]
pub struct Archiver {
    skip: SkipRules,
    zip_collision: CollisionPolicy,
}

impl Archiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves out entries whose relative path matches one of `patterns`.
    pub fn with_skip_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> ArchiverResult<Self> {
        self.skip = SkipRules::new(patterns)?;
        Ok(self)
    }

    pub fn with_zip_collision(mut self, policy: CollisionPolicy) -> Self {
        self.zip_collision = policy;
        self
    }

    pub fn zip_collision(&self) -> CollisionPolicy {
        self.zip_collision
    }

    /// Lists what a backup or archive of `source` would contain.
    pub fn plan(&self, source: &Path) -> ArchiverResult<Vec<TreeEntry>> {
        let source = SourceDir::resolve(source)?;
        fs_utils::plan_tree(&source.root, &self.skip).map_err(|err| {
            let path = err.path().unwrap_or(source.root.as_path()).to_path_buf();
            ArchiverError::copy("plan.walk", path, err.into())
        })
    }

    /// Copies `source` into `backup_dir/<name>-copy`.
    ///
    /// Fails without touching `backup_dir` if the copy folder already
    /// exists. The copy is staged in a hidden sibling directory and renamed
    /// into place on success, so a failure never leaves a partial copy at
    /// the public path. The root directory's permissions and time are
    /// applied after the rename and only logged if they cannot be set.
    pub fn backup(&self, source: &Path, backup_dir: &Path) -> ArchiverResult<BackupResult> {
        let source = SourceDir::resolve(source)?;
        let _span = info_span!("backup", source = %source.root.display()).entered();

        naming::require_destination(backup_dir)?;
        let target = source.backup_target(backup_dir);
        if target.exists() {
            return Err(ArchiverError::DestinationCollision { path: target });
        }

        let entries = fs_utils::plan_tree(&source.root, &self.skip).map_err(|err| {
            let path = err.path().unwrap_or(source.root.as_path()).to_path_buf();
            ArchiverError::copy("backup.walk", path, err.into())
        })?;
        debug!(entries = entries.len(), target = %target.display(), "planned backup");

        backup::copy_staged(&source, &entries, backup_dir, &target)
    }

    /// Packs `source` into `zip_dir/<name>.zip` using deflate compression.
    ///
    /// An existing archive is replaced or refused according to the
    /// configured [`CollisionPolicy`]; a failed run leaves it untouched.
    pub fn archive(&self, source: &Path, zip_dir: &Path) -> ArchiverResult<ArchiveResult> {
        let source = SourceDir::resolve(source)?;
        let _span = info_span!("archive", source = %source.root.display()).entered();

        naming::require_destination(zip_dir)?;
        let target = source.archive_target(zip_dir);

        let mut entries = fs_utils::plan_tree(&source.root, &self.skip).map_err(|err| {
            let path = err.path().unwrap_or(source.root.as_path()).to_path_buf();
            ArchiverError::compression("archive.walk", path, err.into())
        })?;

        // The zip directory may live inside the source tree.
        if let Ok(canonical_target) = target.canonicalize() {
            entries.retain(|entry| entry.path != canonical_target);
        }
        debug!(entries = entries.len(), target = %target.display(), "planned archive");

        packaging::package_zip_staged(&source, &entries, zip_dir, &target, self.zip_collision)
    }
}
