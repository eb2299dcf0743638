use std::path::{Path, PathBuf};

use dirbak_lib::{Archiver, encode_size, total_size};
use tracing::error;

/// Paths resolved from the merged configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub source: PathBuf,
    pub backup_dir: Option<PathBuf>,
    pub zip_dir: Option<PathBuf>,
}

/// What happened to each selected operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub succeeded: usize,
    pub failed: usize,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 { 0 } else { 1 }
    }
}

/// Runs the backup, then the archive. A failed backup does not stop the
/// archive from being attempted.
pub fn run(archiver: &Archiver, selection: &Selection) -> Outcome {
    let mut outcome = Outcome::default();

    if let Some(backup_dir) = &selection.backup_dir {
        match archiver.backup(&selection.source, backup_dir) {
            Ok(result) => {
                println!(
                    "Backup successful! Files copied to: {}",
                    result.destination.display()
                );
                println!(
                    "  {} files, {} directories, {}",
                    result.files,
                    result.directories,
                    encode_size(result.bytes)
                );
                outcome.succeeded += 1;
            }
            Err(err) => {
                error!(error = ?err, "backup failed");
                eprintln!("Error: backup failed: {err}");
                outcome.failed += 1;
            }
        }
    }

    if let Some(zip_dir) = &selection.zip_dir {
        match archiver.archive(&selection.source, zip_dir) {
            Ok(result) => {
                println!(
                    "Zip file {} created successfully!",
                    result.archive.display()
                );
                println!(
                    "  {} files, {} directories, {} before compression{}",
                    result.files,
                    result.directories,
                    encode_size(result.bytes),
                    if result.replaced { " (replaced existing archive)" } else { "" }
                );
                outcome.succeeded += 1;
            }
            Err(err) => {
                error!(error = ?err, "archive failed");
                eprintln!("Error: archive failed: {err}");
                outcome.failed += 1;
            }
        }
    }

    outcome
}

/// Prints what `run` would do without touching the filesystem.
pub fn dry_run(archiver: &Archiver, selection: &Selection) -> anyhow::Result<()> {
    let entries = archiver.plan(&selection.source)?;
    let source = dirbak_lib::SourceDir::resolve(&selection.source)?;

    println!("--- DRY RUN ---");
    println!("Source: {}", source.root.display());
    if let Some(dir) = &selection.backup_dir {
        println!("Backup -> {}", source.backup_target(dir).display());
    }
    if let Some(dir) = &selection.zip_dir {
        println!(
            "Zip    -> {} (on collision: {})",
            source.archive_target(dir).display(),
            archiver.zip_collision()
        );
    }
    println!("Total entries: {}", entries.len());
    println!("Total size: {}", encode_size(total_size(&entries)));
    for entry in &entries {
        println!("  {}", display_entry(&entry.relative, entry.is_dir()));
    }
    Ok(())
}

fn display_entry(relative: &Path, is_dir: bool) -> String {
    let name = dirbak_lib::naming::archive_entry_name(relative);
    if is_dir { format!("{name}/") } else { name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> anyhow::Result<(TempDir, PathBuf)> {
        let temp = TempDir::new()?;
        let proj = temp.path().join("proj");
        fs::create_dir_all(proj.join("sub"))?;
        fs::write(proj.join("a.txt"), "hello")?;
        fs::write(proj.join("sub/b.txt"), "world")?;
        Ok((temp, proj))
    }

    #[test]
    fn both_operations_succeed() -> anyhow::Result<()> {
        let (temp, proj) = project()?;
        let out = temp.path().join("out");
        fs::create_dir(&out)?;
        let selection = Selection {
            source: proj,
            backup_dir: Some(out.clone()),
            zip_dir: Some(out.clone()),
        };

        let outcome = run(&Archiver::new(), &selection);

        assert_eq!(outcome, Outcome { succeeded: 2, failed: 0 });
        assert_eq!(outcome.exit_code(), 0);
        assert!(out.join("proj-copy/sub/b.txt").is_file());
        assert!(out.join("proj.zip").is_file());
        Ok(())
    }

    #[test]
    fn failed_backup_still_attempts_archive() -> anyhow::Result<()> {
        let (temp, proj) = project()?;
        let out = temp.path().join("out");
        fs::create_dir_all(out.join("proj-copy"))?;
        let selection = Selection {
            source: proj,
            backup_dir: Some(out.clone()),
            zip_dir: Some(out.clone()),
        };

        let outcome = run(&Archiver::new(), &selection);

        assert_eq!(outcome, Outcome { succeeded: 1, failed: 1 });
        assert_eq!(outcome.exit_code(), 1);
        assert!(out.join("proj.zip").is_file());
        Ok(())
    }

    #[test]
    fn dry_run_touches_nothing() -> anyhow::Result<()> {
        let (temp, proj) = project()?;
        let out = temp.path().join("out");
        fs::create_dir(&out)?;
        let selection = Selection {
            source: proj,
            backup_dir: Some(out.clone()),
            zip_dir: Some(out.clone()),
        };

        dry_run(&Archiver::new(), &selection)?;

        assert_eq!(fs::read_dir(&out)?.count(), 0);
        Ok(())
    }

    #[test]
    fn directories_are_shown_with_trailing_slash() {
        assert_eq!(display_entry(Path::new("sub"), true), "sub/");
        assert_eq!(display_entry(Path::new("a.txt"), false), "a.txt");
    }
}
