use std::io;
use std::path::{Path, PathBuf};

use tokio::runtime::Builder;
use tracing::{debug, info};

use crate::config::CollisionPolicy;
use crate::error::{ArchiverError, ArchiverResult};
use crate::fs_utils::TreeEntry;
use crate::naming::SourceDir;

pub mod zip;

/// Outcome of a successful archive run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResult {
    pub archive: PathBuf,
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
    /// An archive already existed at `archive` and was replaced.
    pub replaced: bool,
}

/// Writes the zip into a staging file inside `zip_dir` and moves it over
/// `target` only when it is complete.
///
/// The async writer runs on a current-thread runtime owned by this call, so
/// callers see an ordinary blocking function.
pub(crate) fn package_zip_staged(
    source: &SourceDir,
    entries: &[TreeEntry],
    zip_dir: &Path,
    target: &Path,
    policy: CollisionPolicy,
) -> ArchiverResult<ArchiveResult> {
    let replaced = target.exists();
    if replaced && policy == CollisionPolicy::Fail {
        return Err(ArchiverError::DestinationCollision {
            path: target.to_path_buf(),
        });
    }

    let archive_name = target.file_name().unwrap_or(source.name.as_os_str());
    let staged = tempfile::Builder::new()
        .prefix(&SourceDir::staging_prefix(archive_name))
        .suffix(".partial")
        .tempfile_in(zip_dir)
        .map_err(|err| match err.kind() {
            io::ErrorKind::PermissionDenied => {
                ArchiverError::unusable_destination(zip_dir, "not writable")
            }
            _ => ArchiverError::compression("archive.create_staging", zip_dir, err),
        })?;
    debug!(staging = %staged.path().display(), "created staging archive");

    let handle = staged
        .as_file()
        .try_clone()
        .map_err(|err| ArchiverError::compression("archive.open_staging", staged.path(), err))?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| ArchiverError::compression("archive.runtime", target, err))?;

    let stats = runtime.block_on(self::zip::write_zip(
        tokio::fs::File::from_std(handle),
        target,
        entries,
    ))?;

    let persisted = match policy {
        CollisionPolicy::Overwrite => staged.persist(target),
        CollisionPolicy::Fail => staged.persist_noclobber(target),
    };
    persisted.map_err(|err| match err.error.kind() {
        io::ErrorKind::AlreadyExists => ArchiverError::DestinationCollision {
            path: target.to_path_buf(),
        },
        _ => ArchiverError::compression("archive.publish", target, err.error),
    })?;

    // Staging files are created owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(target, std::fs::Permissions::from_mode(0o644))
            .map_err(|err| ArchiverError::compression("archive.set_permissions", target, err))?;
    }

    info!(
        archive = %target.display(),
        files = stats.files,
        directories = stats.directories,
        bytes = stats.bytes,
        replaced,
        "archive complete"
    );

    Ok(ArchiveResult {
        archive: target.to_path_buf(),
        files: stats.files,
        directories: stats.directories,
        bytes: stats.bytes,
        replaced,
    })
}
