use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{ArchiverError, ArchiverResult};

const COPY_SUFFIX: &str = "-copy";
const ARCHIVE_EXTENSION: &str = "zip";

/// A validated source directory together with the name outputs derive from.
///
/// `root` is canonical and is what gets walked; `name` is the last component
/// of the path as given, so a symlinked source is named after the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDir {
    pub root: PathBuf,
    pub name: OsString,
}

impl SourceDir {
    /// Canonicalizes `input` and checks that it is a named directory.
    pub fn resolve(input: &Path) -> ArchiverResult<Self> {
        let root = fs::canonicalize(input).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ArchiverError::SourceNotFound {
                path: input.to_path_buf(),
            },
            _ => ArchiverError::copy("source.canonicalize", input, err),
        })?;

        if !root.is_dir() {
            return Err(ArchiverError::SourceNotDirectory {
                path: input.to_path_buf(),
            });
        }

        // `.` and `..` carry no name of their own.
        let name = match input.components().next_back() {
            Some(Component::Normal(name)) => name.to_os_string(),
            _ => root
                .file_name()
                .map(OsStr::to_os_string)
                .ok_or_else(|| ArchiverError::SourceUnnamed { path: root.clone() })?,
        };

        Ok(Self { root, name })
    }

    /// `<dir>/<name>-copy`
    pub fn backup_target(&self, dir: &Path) -> PathBuf {
        dir.join(self.copy_dir_name())
    }

    /// `<dir>/<name>.zip`
    pub fn archive_target(&self, dir: &Path) -> PathBuf {
        let mut file_name = self.name.clone();
        file_name.push(".");
        file_name.push(ARCHIVE_EXTENSION);
        dir.join(file_name)
    }

    pub fn copy_dir_name(&self) -> OsString {
        let mut dir_name = self.name.clone();
        dir_name.push(COPY_SUFFIX);
        dir_name
    }

    /// Prefix for hidden staging entries derived from `output_name`.
    pub(crate) fn staging_prefix(output_name: &OsStr) -> OsString {
        let mut prefix = OsString::from(".");
        prefix.push(output_name);
        prefix.push(".");
        prefix
    }
}

/// Checks that `dir` exists and is a directory.
pub fn require_destination(dir: &Path) -> ArchiverResult<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ArchiverError::unusable_destination(dir, "not a directory")),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(ArchiverError::unusable_destination(dir, "missing"))
        }
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            Err(ArchiverError::unusable_destination(dir, "permission denied"))
        }
        Err(_) => Err(ArchiverError::unusable_destination(dir, "inaccessible")),
    }
}

/// Converts a path relative to the source root into a zip entry name.
pub fn archive_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_derives_name_from_last_component() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let proj = temp.path().join("proj");
        fs::create_dir(&proj)?;

        let with_slash = PathBuf::from(format!("{}/", proj.display()));
        let source = SourceDir::resolve(&with_slash)?;
        assert_eq!(source.name, "proj");
        assert_eq!(source.copy_dir_name(), "proj-copy");
        assert_eq!(source.backup_target(Path::new("out")), Path::new("out/proj-copy"));
        assert_eq!(source.archive_target(Path::new("out")), Path::new("out/proj.zip"));
        Ok(())
    }

    #[test]
    fn dot_paths_fall_back_to_the_canonical_name() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let proj = temp.path().join("proj");
        fs::create_dir_all(proj.join("sub"))?;

        let source = SourceDir::resolve(&proj.join("sub").join(".."))?;
        assert_eq!(source.name, "proj");
        assert_eq!(source.root, fs::canonicalize(&proj)?);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_kept_byte_for_byte() -> anyhow::Result<()> {
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new()?;
        let name = OsStr::from_bytes(b"pr\xFFoj");
        let proj = temp.path().join(name);
        if fs::create_dir(&proj).is_err() {
            // Some filesystems only accept UTF-8 names.
            return Ok(());
        }

        let source = SourceDir::resolve(&proj)?;
        assert_eq!(source.name, name);
        assert_eq!(
            source.backup_target(Path::new("out")),
            Path::new("out").join(OsStr::from_bytes(b"pr\xFFoj-copy"))
        );
        assert_eq!(
            source.archive_target(Path::new("out")),
            Path::new("out").join(OsStr::from_bytes(b"pr\xFFoj.zip"))
        );
        Ok(())
    }

    #[test]
    fn resolve_rejects_missing_and_files() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let missing = temp.path().join("missing");
        assert!(matches!(
            SourceDir::resolve(&missing),
            Err(ArchiverError::SourceNotFound { .. })
        ));

        let file = temp.path().join("file.txt");
        fs::write(&file, "x")?;
        assert!(matches!(
            SourceDir::resolve(&file),
            Err(ArchiverError::SourceNotDirectory { .. })
        ));
        Ok(())
    }

    #[test]
    fn resolve_rejects_filesystem_root() {
        assert!(matches!(
            SourceDir::resolve(Path::new("/")),
            Err(ArchiverError::SourceUnnamed { .. })
        ));
    }

    #[test]
    fn require_destination_reports_reason() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        require_destination(temp.path())?;

        let missing = temp.path().join("missing");
        assert!(matches!(
            require_destination(&missing),
            Err(ArchiverError::DestinationMissingOrUnwritable { reason: "missing", .. })
        ));

        let file = temp.path().join("file");
        fs::write(&file, "x")?;
        assert!(matches!(
            require_destination(&file),
            Err(ArchiverError::DestinationMissingOrUnwritable {
                reason: "not a directory",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn archive_entry_names_use_forward_slashes() {
        let relative: PathBuf = ["sub", "deeper", "b.txt"].iter().collect();
        assert_eq!(archive_entry_name(&relative), "sub/deeper/b.txt");
    }
}
