use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::core::{EncodedImage, ItemId};
use crate::foundation::error::{MemoraError, MemoraResult};

/// Export tier of the active restoration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Watermarked, always available.
    Free,
    /// Unwatermarked, requires a subscribed user.
    Pro,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }
}

/// File name for a download of the active item.
pub fn tier_filename(tier: Tier, id: &ItemId) -> String {
    format!("memora-restoration-{}-{id}.png", tier.as_str())
}

/// File name for a re-download from history.
pub fn history_filename(id: &ItemId) -> String {
    format!("restoration-{id}.png")
}

/// Receives exported images.
pub trait DownloadSink {
    fn save(&mut self, filename: &str, image: &EncodedImage) -> MemoraResult<()>;
}

/// Writes downloads into a directory, creating it on first use.
#[derive(Clone, Debug)]
pub struct DirDownloadSink {
    dir: PathBuf,
}

impl DirDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirDownloadSink {
    fn save(&mut self, filename: &str, image: &EncodedImage) -> MemoraResult<()> {
        if filename.is_empty()
            || filename == ".."
            || filename.contains('/')
            || filename.contains('\\')
        {
            return Err(MemoraError::validation(format!(
                "download name '{filename}' must be a plain file name"
            )));
        }
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create download dir '{}'", self.dir.display()))?;
        let path = self.dir.join(filename);
        std::fs::write(&path, image.bytes())
            .with_context(|| format!("write download '{}'", path.display()))?;
        tracing::info!(path = %path.display(), len = image.len(), "download saved");
        Ok(())
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemoryDownloads {
    files: Vec<(String, EncodedImage)>,
}

impl InMemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved files in save order.
    pub fn files(&self) -> &[(String, EncodedImage)] {
        &self.files
    }
}

impl DownloadSink for InMemoryDownloads {
    fn save(&mut self, filename: &str, image: &EncodedImage) -> MemoraResult<()> {
        self.files.push((filename.to_string(), image.clone()));
        Ok(())
    }
}
