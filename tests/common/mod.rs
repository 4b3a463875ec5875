#![allow(dead_code)]

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use teloxide::types::{ChatId, MessageId};
use tg_video_relay::{
    access::AccessPolicy,
    download::{DownloadError, MediaFetcher, classify_failure},
    error::{Error, Result},
    gateway::{IncomingMessage, MediaHandle, MessagingGateway, Sender, VideoReply, VideoSource},
    handler::DirectLinkLookup,
};

pub const ALLOWED_CHAT: ChatId = ChatId(-1001);
pub const STRANGER_CHAT: ChatId = ChatId(-2002);
pub const BANNED_CHAT: ChatId = ChatId(-3003);
pub const MOD_CHAT: ChatId = ChatId(-9009);

pub fn message(chat_id: ChatId, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id,
        message_id: MessageId(1),
        text: text.to_owned(),
        sender: Some(Sender {
            id: 42,
            username: Some("someone".into()),
        }),
        chat_kind: "group".into(),
        chat_title: Some("Test chat".into()),
    }
}

/// Allows `ALLOWED_CHAT` and blacklists `BANNED_CHAT`.
#[derive(Debug, Clone)]
pub struct StaticPolicy {
    allowed: HashSet<i64>,
    blacklisted: HashSet<i64>,
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self {
            allowed: HashSet::from([ALLOWED_CHAT.0]),
            blacklisted: HashSet::from([BANNED_CHAT.0]),
        }
    }
}

impl AccessPolicy for StaticPolicy {
    fn is_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed.contains(&chat_id.0)
    }

    fn is_blacklisted(&self, chat_id: ChatId) -> bool {
        self.blacklisted.contains(&chat_id.0)
    }
}

/// Upload as seen by the fake gateway.
#[derive(Debug, Clone)]
pub struct Upload {
    pub reply: VideoReply,
    /// Whether a file source still existed at upload time.
    pub file_present: bool,
}

#[derive(Debug, Default)]
pub struct FakeGateway {
    pub replies: Mutex<Vec<(ChatId, String)>>,
    pub sent: Mutex<Vec<(ChatId, String)>>,
    pub uploads: Mutex<Vec<Upload>>,
    pub reject_handles: AtomicBool,
    pub fail_uploads: AtomicBool,
    pub unreachable: Mutex<HashSet<i64>>,
    issued: AtomicUsize,
}

impl FakeGateway {
    pub fn replies(&self) -> Vec<(ChatId, String)> {
        self.replies.lock().expect("lock").clone()
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().expect("lock").clone()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().expect("lock").clone()
    }
}

#[async_trait::async_trait]
impl MessagingGateway for FakeGateway {
    async fn reply_text(&self, msg: &IncomingMessage, text: &str) -> Result<()> {
        self.replies
            .lock()
            .expect("lock")
            .push((msg.chat_id, text.to_owned()));
        Ok(())
    }

    async fn reply_video(&self, _msg: &IncomingMessage, reply: VideoReply) -> Result<MediaHandle> {
        let file_present = match &reply.source {
            VideoSource::File(path) => path.is_file(),
            _ => false,
        };
        self.uploads.lock().expect("lock").push(Upload {
            reply: reply.clone(),
            file_present,
        });

        match reply.source {
            VideoSource::Handle(handle) => {
                if self.reject_handles.load(Ordering::SeqCst) {
                    return Err(Error::other("wrong file identifier"));
                }
                Ok(handle)
            }
            VideoSource::File(_) | VideoSource::Url(_) => {
                if self.fail_uploads.load(Ordering::SeqCst) {
                    return Err(Error::other("upload failed"));
                }
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(MediaHandle(format!("file-{n}")))
            }
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        if self.unreachable.lock().expect("lock").contains(&chat_id.0) {
            return Err(Error::other("chat not found"));
        }
        self.sent
            .lock()
            .expect("lock")
            .push((chat_id, text.to_owned()));
        Ok(())
    }
}

/// Writes `<prefix>.mp4` (plus a partial leftover) or fails, counting calls.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    pub calls: Mutex<Vec<(String, PathBuf)>>,
    pub fail: AtomicBool,
    /// Downloader output classified into the returned error when failing.
    pub stderr: Option<String>,
}

impl FakeFetcher {
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn failing_with(stderr: impl Into<String>) -> Self {
        Self {
            stderr: Some(stderr.into()),
            ..Self::failing()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> std::result::Result<PathBuf, DownloadError> {
        self.calls
            .lock()
            .expect("lock")
            .push((url.to_owned(), destination.to_path_buf()));

        // let concurrent requests interleave like real network I/O would
        tokio::task::yield_now().await;

        let partial = destination.with_extension("mp4.part");
        tokio::fs::write(&partial, b"partial").await?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(self
                .stderr
                .as_deref()
                .map_or(DownloadError::TooLarge { limit: 1 }, |stderr| {
                    classify_failure(stderr, 1)
                }));
        }

        let path = destination.with_extension("mp4");
        tokio::fs::write(&path, b"video").await?;
        Ok(path)
    }
}

#[derive(Debug, Default)]
pub struct FakeDirectLinks {
    pub url: Option<String>,
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl DirectLinkLookup for FakeDirectLinks {
    async fn video_url(&self, _url: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.url.clone()
    }
}

/// Files left behind in `dir`.
pub fn leftovers(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|rd| rd.filter_map(std::result::Result::ok).map(|e| e.path()).collect())
        .unwrap_or_default()
}
