use chrono::Local;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const MAX_NAME_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("summary not found")]
    NotFound,
    #[error("summary storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat directory of immutable summary files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `text` to a fresh file and returns its name.
    pub async fn save(&self, text: &str) -> Result<String, StoreError> {
        fs::create_dir_all(&self.dir).await?;

        let mut attempts = 0;
        loop {
            let filename = new_filename();
            let path = self.dir.join(&filename);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    let written = write_text(&mut file, text).await;
                    drop(file);
                    discard_on_error(&path, written).await?;
                    tracing::debug!(%filename, "summary saved");
                    return Ok(filename);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < MAX_NAME_ATTEMPTS => {
                    attempts += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn load(&self, filename: &str) -> Result<String, StoreError> {
        if !is_plain_name(filename) {
            return Err(StoreError::NotFound);
        }
        let path = self.dir.join(filename);
        match fs::metadata(&path).await {
            Ok(md) if md.is_file() => {}
            Ok(_) => return Err(StoreError::NotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        }
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_text(file: &mut fs::File, text: &str) -> std::io::Result<()> {
    file.write_all(text.as_bytes()).await?;
    file.flush().await
}

/// Removes a partially written artifact so no truncated file outlives a failed save.
async fn discard_on_error(path: &Path, written: std::io::Result<()>) -> Result<(), StoreError> {
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial summary");
        }
        return Err(e.into());
    }
    Ok(())
}

fn new_filename() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("summary_{}_{}.txt", Local::now().format("%Y%m%d_%H%M%S"), &token[..12])
}

/// A single visible path component: no separators, no `..`, no leading dot.
fn is_plain_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
