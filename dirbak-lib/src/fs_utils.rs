use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{ArchiverError, ArchiverResult};
use crate::naming::archive_entry_name;

/// Kind of a planned tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One item of the source tree, in walk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    pub relative: PathBuf,
    pub kind: EntryKind,
    pub len: u64,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Compiled skip patterns, matched against `/`-separated relative paths.
#[derive(Debug, Clone, Default)]
pub struct SkipRules {
    patterns: Vec<Pattern>,
}

impl SkipRules {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> ArchiverResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|source| ArchiverError::InvalidSkipPattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<ArchiverResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_skipped(&self, relative: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let name = archive_entry_name(relative);
        self.patterns.iter().any(|p| p.matches(&name))
    }
}

/// Walks `root` in file-name order, following symlinks, and returns every
/// entry below it. Skipped directories are pruned. Special files are left out.
pub fn plan_tree(root: &Path, skip: &SkipRules) -> Result<Vec<TreeEntry>, walkdir::Error> {
    let mut result = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match entry.path().strip_prefix(root) {
            Ok(relative) => !skip.is_skipped(relative),
            Err(_) => true,
        });

    for entry in walker {
        let entry = entry?;
        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };

        let file_type = entry.file_type();
        let (kind, len) = if file_type.is_dir() {
            (EntryKind::Directory, 0)
        } else if file_type.is_file() {
            (EntryKind::File, entry.metadata()?.len())
        } else {
            warn!(path = %entry.path().display(), "skipping special file");
            continue;
        };

        result.push(TreeEntry {
            path: entry.path().to_path_buf(),
            relative,
            kind,
            len,
        });
    }

    Ok(result)
}

/// Sum of file lengths in a plan.
pub fn total_size(entries: &[TreeEntry]) -> u64 {
    entries.iter().map(|e| e.len).sum()
}

/// Convert bytes into a human-friendly string using binary (KiB, MiB, GiB...) units.
pub fn encode_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    // 1.0 MiB prints as 1 MiB
    if (size * 10.0) % 10.0 == 0.0 {
        format!("{:.0} {}", size, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
