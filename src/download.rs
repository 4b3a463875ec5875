use crate::utils::{VIDEO_EXTENSIONS, is_video_file};
use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
    process::Stdio,
};
use thiserror::Error;
use tokio::{fs::read_dir, process::Command};
use tracing::{debug, info, warn};

/// Why a video could not be fetched.
///
/// Every variant is reported to the chat the same way; the split exists for
/// logs.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("file is larger than {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("no media found")]
    NoMediaFound,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Retrieves a video into the local filesystem.
#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download `url` next to `destination`, a path prefix without
    /// extension. Returns the path of the file actually written.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<PathBuf, DownloadError>;
}

/// `MediaFetcher` backed by the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    max_file_size: u64,
    cookies_path: Option<PathBuf>,
}

impl YtDlp {
    #[must_use]
    pub fn new(binary: impl Into<String>, max_file_size: u64) -> Self {
        Self {
            binary: binary.into(),
            max_file_size,
            cookies_path: None,
        }
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies_path: Option<PathBuf>) -> Self {
        self.cookies_path = cookies_path;
        self
    }

    fn args(&self, url: &str, destination: &Path) -> Vec<String> {
        let template = format!("{}.%(ext)s", destination.display());
        let mut args = vec![
            "--no-playlist".to_owned(),
            "-f".to_owned(),
            "mp4".to_owned(),
            "--max-filesize".to_owned(),
            self.max_file_size.to_string(),
            "-o".to_owned(),
            template,
        ];
        if let Some(cookies) = &self.cookies_path {
            args.extend(["--cookies".to_owned(), cookies.display().to_string()]);
        }
        args.push(url.to_owned());
        args
    }
}

#[async_trait::async_trait]
impl MediaFetcher for YtDlp {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<PathBuf, DownloadError> {
        let args = self.args(url, destination);
        debug!(binary = %self.binary, ?args, "running downloader");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(classify_failure(&stderr, self.max_file_size));
        }

        if let Some(path) = locate_download(destination).await? {
            info!(path = %path.display(), "download finished");
            return Ok(path);
        }

        // yt-dlp exits cleanly when it skips a file over --max-filesize
        if mentions_size_limit(&stdout) || mentions_size_limit(&stderr) {
            return Err(DownloadError::TooLarge {
                limit: self.max_file_size,
            });
        }
        warn!(destination = %destination.display(), "downloader produced no media");
        Err(DownloadError::NoMediaFound)
    }
}

/// Map downloader stderr onto a failure class.
#[must_use]
pub fn classify_failure(stderr: &str, limit: u64) -> DownloadError {
    if mentions_size_limit(stderr) {
        return DownloadError::TooLarge { limit };
    }

    let lower = stderr.to_lowercase();
    let network = [
        "http error",
        "timed out",
        "connection",
        "unable to download webpage",
        "name or service not known",
        "temporary failure in name resolution",
    ];
    if network.iter().any(|needle| lower.contains(needle)) {
        return DownloadError::Network(stderr.to_owned());
    }

    if stderr.is_empty() {
        return DownloadError::Extraction("downloader exited with an error".into());
    }
    DownloadError::Extraction(stderr.to_owned())
}

fn mentions_size_limit(output: &str) -> bool {
    output.contains("max-filesize")
}

/// Find the file written for `prefix`: known video extensions first, then
/// any sibling sharing the prefix whose content sniffs as video.
async fn locate_download(prefix: &Path) -> Result<Option<PathBuf>, DownloadError> {
    for ext in VIDEO_EXTENSIONS {
        let candidate = prefix.with_extension(ext);
        if tokio::fs::try_exists(&candidate).await? {
            return Ok(Some(candidate));
        }
    }

    let (Some(dir), Some(stem)) = (prefix.parent(), prefix.file_name().and_then(OsStr::to_str))
    else {
        return Ok(None);
    };

    let mut entries = read_dir(dir).await?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let owned = path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| name.starts_with(stem) && !name.ends_with(".part"));
        if owned {
            candidates.push(path);
        }
    }
    candidates.sort();

    for path in candidates {
        if is_video_file(&path).await {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
