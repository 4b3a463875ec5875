use crate::{error::Result, matcher::Platform};
use chrono::Local;
use rand::Rng;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// A uniquely named spot in the download directory for one request.
///
/// Everything whose file name starts with the slot's stem is removed when
/// the slot is dropped, including partial leftovers the downloader may
/// have written next to the final file.
#[derive(Debug)]
pub struct DownloadSlot {
    dir: PathBuf,
    stem: String,
}

impl DownloadSlot {
    /// Reserve a new slot, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be created.
    pub fn new(dir: &Path, platform: Platform) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            stem: unique_stem(platform.name()),
        })
    }

    /// Path prefix handed to the fetcher; it appends the extension itself.
    #[must_use]
    pub fn prefix(&self) -> PathBuf {
        self.dir.join(&self.stem)
    }

    #[inline]
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    fn cleanup(&self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.filter_map(std::result::Result::ok) {
            let owned = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&self.stem));
            if !owned {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed download"),
                Err(err) => warn!(path = %path.display(), %err, "failed to remove download"),
            }
        }
    }
}

impl Drop for DownloadSlot {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn unique_stem(prefix: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix: u32 = rand::rng().random();
    format!("{prefix}_{timestamp}_{suffix:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_are_unique() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = DownloadSlot::new(dir.path(), Platform::TikTok).expect("slot");
        let b = DownloadSlot::new(dir.path(), Platform::TikTok).expect("slot");
        assert_ne!(a.stem(), b.stem());
        assert!(a.stem().starts_with("tiktok_"));
    }

    #[test]
    fn drop_removes_only_own_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let slot = DownloadSlot::new(dir.path(), Platform::YouTube).expect("slot");

        let video = slot.prefix().with_extension("mp4");
        let partial = dir.path().join(format!("{}.mp4.part", slot.stem()));
        let foreign = dir.path().join("someone_else.mp4");
        for path in [&video, &partial, &foreign] {
            fs::write(path, b"data").expect("write");
        }

        drop(slot);

        assert!(!video.exists());
        assert!(!partial.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("downloads");
        let _slot = DownloadSlot::new(&nested, Platform::Instagram).expect("slot");
        assert!(nested.is_dir());
    }
}
