use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ArchiverError, ArchiverResult};
use crate::fs_utils::{EntryKind, TreeEntry};
use crate::naming::SourceDir;

/// Outcome of a successful backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupResult {
    pub destination: PathBuf,
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Copies the planned tree into a staging directory next to `target` and
/// renames it into place once every entry has been copied. The staging
/// directory is removed when anything fails.
pub(crate) fn copy_staged(
    source: &SourceDir,
    entries: &[TreeEntry],
    backup_dir: &Path,
    target: &Path,
) -> ArchiverResult<BackupResult> {
    let staging = tempfile::Builder::new()
        .prefix(&SourceDir::staging_prefix(&source.copy_dir_name()))
        .suffix(".staging")
        .tempdir_in(backup_dir)
        .map_err(|err| match err.kind() {
            io::ErrorKind::PermissionDenied => {
                ArchiverError::unusable_destination(backup_dir, "not writable")
            }
            _ => ArchiverError::copy("backup.create_staging", backup_dir, err),
        })?;
    debug!(staging = %staging.path().display(), "created staging directory");

    let staged_root = staging.path().join(source.copy_dir_name());
    fs::create_dir(&staged_root)
        .map_err(|err| ArchiverError::copy("backup.create_root", &staged_root, err))?;

    let mut result = BackupResult {
        destination: target.to_path_buf(),
        files: 0,
        directories: 0,
        bytes: 0,
    };

    for entry in entries {
        let target_path = staged_root.join(&entry.relative);
        match entry.kind {
            EntryKind::Directory => {
                fs::create_dir(&target_path)
                    .map_err(|err| ArchiverError::copy("backup.create_dir", &target_path, err))?;
                result.directories += 1;
            }
            EntryKind::File => {
                result.bytes += fs::copy(&entry.path, &target_path)
                    .map_err(|err| ArchiverError::copy("backup.copy_file", &entry.path, err))?;
                preserve_modified(&entry.path, &target_path);
                result.files += 1;
            }
        }
    }

    // Children first, so read-only directories do not block their own content
    // and copying into a directory no longer bumps its restored mtime.
    for entry in entries.iter().rev().filter(|e| e.is_dir()) {
        let staged_dir = staged_root.join(&entry.relative);
        copy_permissions(&entry.path, &staged_dir)?;
        preserve_modified(&entry.path, &staged_dir);
    }

    // Another process may have created the target while we were copying.
    if target.exists() {
        return Err(ArchiverError::DestinationCollision {
            path: target.to_path_buf(),
        });
    }

    fs::rename(&staged_root, target)
        .map_err(|err| ArchiverError::copy("backup.publish", target, err))?;

    // The tree is already public at this point; root metadata is best-effort.
    if let Err(err) = copy_permissions(&source.root, target) {
        debug!(path = %target.display(), error = %err, "could not copy root permissions");
    }
    preserve_modified(&source.root, target);

    info!(
        destination = %target.display(),
        files = result.files,
        directories = result.directories,
        bytes = result.bytes,
        "backup complete"
    );

    Ok(result)
}

fn copy_permissions(from: &Path, to: &Path) -> ArchiverResult<()> {
    let permissions = fs::metadata(from)
        .map_err(|err| ArchiverError::copy("backup.read_metadata", from, err))?
        .permissions();
    fs::set_permissions(to, permissions)
        .map_err(|err| ArchiverError::copy("backup.set_permissions", to, err))
}

/// Best-effort: not every platform lets us set times on every file.
fn preserve_modified(from: &Path, to: &Path) {
    let applied = fs::metadata(from)
        .and_then(|meta| meta.modified())
        .and_then(|modified| File::open(to)?.set_modified(modified));

    if let Err(err) = applied {
        debug!(path = %to.display(), error = %err, "could not preserve modification time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_utils::{SkipRules, plan_tree};
    use tempfile::TempDir;

    #[test]
    fn staged_copy_leaves_no_staging_behind() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let proj = temp.path().join("proj");
        fs::create_dir_all(proj.join("sub"))?;
        fs::write(proj.join("a.txt"), "hello")?;
        fs::write(proj.join("sub/b.txt"), "world")?;
        let out = temp.path().join("out");
        fs::create_dir(&out)?;

        let source = SourceDir::resolve(&proj)?;
        let entries = plan_tree(&source.root, &SkipRules::default())?;
        let target = source.backup_target(&out);
        let result = copy_staged(&source, &entries, &out, &target)?;

        assert_eq!(result.files, 2);
        assert_eq!(result.directories, 1);
        assert_eq!(result.bytes, 10);

        let leftovers: Vec<_> = fs::read_dir(&out)?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<io::Result<_>>()?;
        assert_eq!(leftovers, vec![std::ffi::OsString::from("proj-copy")]);
        Ok(())
    }

    #[test]
    fn modification_time_is_preserved() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let proj = temp.path().join("proj");
        fs::create_dir(&proj)?;
        let file = proj.join("old.txt");
        fs::write(&file, "old")?;
        let past = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);
        File::options().write(true).open(&file)?.set_modified(past)?;
        let out = temp.path().join("out");
        fs::create_dir(&out)?;

        let source = SourceDir::resolve(&proj)?;
        let entries = plan_tree(&source.root, &SkipRules::default())?;
        let target = source.backup_target(&out);
        copy_staged(&source, &entries, &out, &target)?;

        assert_eq!(fs::metadata(target.join("old.txt"))?.modified()?, past);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn nested_directory_times_are_preserved() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let proj = temp.path().join("proj");
        let deeper = proj.join("sub/deeper");
        fs::create_dir_all(&deeper)?;
        fs::write(deeper.join("c.txt"), "c")?;
        let past = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);
        let older = past - std::time::Duration::from_secs(3600);
        File::open(&deeper)?.set_modified(past)?;
        File::open(proj.join("sub"))?.set_modified(older)?;
        let out = temp.path().join("out");
        fs::create_dir(&out)?;

        let source = SourceDir::resolve(&proj)?;
        let entries = plan_tree(&source.root, &SkipRules::default())?;
        let target = source.backup_target(&out);
        copy_staged(&source, &entries, &out, &target)?;

        assert_eq!(fs::metadata(target.join("sub/deeper"))?.modified()?, past);
        assert_eq!(fs::metadata(target.join("sub"))?.modified()?, older);
        Ok(())
    }
}
