use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::fs;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: usize,
    pub kept: usize,
}

/// Deletes regular files in `dir` last modified before `now - max_age`.
///
/// A missing directory is not an error. Files that vanish or cannot be
/// removed mid-sweep are logged and skipped.
pub async fn sweep(dir: &Path, max_age: Duration, now: SystemTime) -> std::io::Result<SweepReport> {
    let mut report = SweepReport::default();
    let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(dir = %dir.display(), "summary directory does not exist, skipping cleanup");
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        // Follows symlinks, so a link to an old file is swept like the file; the link itself is removed.
        let md = match fs::metadata(&path).await {
            Ok(md) if md.is_file() => md,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot stat file");
                continue;
            }
        };
        let modified = match md.modified() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "no modification time");
                report.kept += 1;
                continue;
            }
        };

        if modified < cutoff {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    report.deleted += 1;
                    let name = entry.file_name();
                    tracing::info!(file = %name.to_string_lossy(), "deleted");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to delete");
                    report.kept += 1;
                }
            }
        } else {
            report.kept += 1;
        }
    }

    Ok(report)
}
