use std::path::Path;
use std::time::SystemTime;

use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipDateTime, ZipEntryBuilder};
use chrono::{DateTime, Datelike, Local, Utc};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::trace;

use crate::error::{ArchiverError, ArchiverResult};
use crate::fs_utils::{EntryKind, TreeEntry};
use crate::naming::archive_entry_name;

/// Counters collected while writing an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZipStats {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Writes every planned entry into a deflate zip on `out`, then flushes and
/// syncs the file. `archive_path` is only used for error reporting.
pub async fn write_zip(
    out: File,
    archive_path: &Path,
    entries: &[TreeEntry],
) -> ArchiverResult<ZipStats> {
    let mut writer = ZipFileWriter::with_tokio(out);
    let mut stats = ZipStats::default();

    for entry in entries {
        let name = archive_entry_name(&entry.relative);
        let metadata = tokio::fs::metadata(&entry.path)
            .await
            .map_err(|err| ArchiverError::compression("archive.read_metadata", &entry.path, err))?;

        match entry.kind {
            EntryKind::Directory => {
                let builder = entry_builder(format!("{name}/"), Compression::Stored, &metadata);
                writer
                    .write_entry_whole(builder, &[])
                    .await
                    .map_err(|err| ArchiverError::zip("archive.add_directory", &entry.path, err))?;
                stats.directories += 1;
            }
            EntryKind::File => {
                let builder = entry_builder(name, Compression::Deflate, &metadata);
                let input = File::open(&entry.path)
                    .await
                    .map_err(|err| ArchiverError::compression("archive.open_file", &entry.path, err))?;

                let mut entry_writer = writer
                    .write_entry_stream(builder)
                    .await
                    .map_err(|err| ArchiverError::zip("archive.start_entry", &entry.path, err))?;
                let copied = futures::io::copy(input.compat(), &mut entry_writer)
                    .await
                    .map_err(|err| ArchiverError::compression("archive.write_entry", &entry.path, err))?;
                entry_writer
                    .close()
                    .await
                    .map_err(|err| ArchiverError::zip("archive.finish_entry", &entry.path, err))?;

                trace!(entry = %entry.relative.display(), bytes = copied, "added file");
                stats.files += 1;
                stats.bytes += copied;
            }
        }
    }

    let mut out = writer
        .close()
        .await
        .map_err(|err| ArchiverError::zip("archive.finish", archive_path, err))?
        .into_inner();
    out.flush()
        .await
        .map_err(|err| ArchiverError::compression("archive.flush", archive_path, err))?;
    out.sync_all()
        .await
        .map_err(|err| ArchiverError::compression("archive.sync", archive_path, err))?;

    Ok(stats)
}

fn entry_builder(
    name: String,
    compression: Compression,
    metadata: &std::fs::Metadata,
) -> ZipEntryBuilder {
    let mut builder = ZipEntryBuilder::new(name.into(), compression);

    if let Some(modified) = metadata.modified().ok().and_then(zip_timestamp) {
        builder = builder.last_modification_date(modified);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        builder = builder.unix_permissions(metadata.mode() as u16);
    }

    builder
}

/// MS-DOS timestamps carry no zone and are read back as local wall-clock
/// time, so the local fields are stored as-is. Nothing before 1980 fits.
fn zip_timestamp(modified: SystemTime) -> Option<ZipDateTime> {
    let local = DateTime::<Local>::from(modified);
    if local.year() < 1980 {
        return None;
    }
    let wall_clock = DateTime::<Utc>::from_naive_utc_and_offset(local.naive_local(), Utc);
    Some(ZipDateTime::from_chrono(&wall_clock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::time::Duration;

    #[test]
    fn timestamps_use_local_wall_clock() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        let local = DateTime::<Local>::from(modified);

        let stamp = zip_timestamp(modified).expect("2001 fits in a zip timestamp");
        assert_eq!(stamp.year(), local.year());
        assert_eq!(stamp.month(), local.month());
        assert_eq!(stamp.day(), local.day());
        assert_eq!(stamp.hour(), local.hour());
        assert_eq!(stamp.minute(), local.minute());
        assert_eq!(stamp.second(), local.second() / 2 * 2);
    }

    #[test]
    fn timestamps_before_1980_are_dropped() {
        assert_eq!(zip_timestamp(SystemTime::UNIX_EPOCH), None);
    }
}
