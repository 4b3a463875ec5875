use crate::{
    access::AccessPolicy,
    cache::RecencyCache,
    download::MediaFetcher,
    gateway::{IncomingMessage, MediaHandle, MessagingGateway, VideoReply, VideoSource, notify},
    matcher::{Platform, UrlMatcher},
    staging::DownloadSlot,
};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, error, info, warn};

pub const AUTH_PROMPT: &str = "You need to authorize this chat to download videos. Use the /auth command.";

/// Looks up a directly playable URL for a post without downloading it.
#[async_trait::async_trait]
pub trait DirectLinkLookup: Send + Sync {
    async fn video_url(&self, url: &str) -> Option<String>;
}

/// Terminal state reached for one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Chat is not on the allow-list; the user was asked to authorize.
    Unauthorized,
    /// No link for this platform in the text.
    NoMatch,
    /// Cached media was resent.
    Resent,
    /// Video was fetched, uploaded and cached.
    Fetched,
    /// Fetching failed and the chat was told so.
    FetchFailed,
    /// Upload failed; logged only.
    Dropped,
}

/// Per-platform pipeline: authorize, match, resend from cache or fetch,
/// upload and remember the handle.
pub struct Relay {
    matcher: UrlMatcher,
    cache: Mutex<RecencyCache<String, MediaHandle>>,
    fetcher: Arc<dyn MediaFetcher>,
    policy: Arc<dyn AccessPolicy>,
    direct_links: Option<Arc<dyn DirectLinkLookup>>,
    download_dir: PathBuf,
}

impl Relay {
    #[must_use]
    pub fn new(
        platform: Platform,
        fetcher: Arc<dyn MediaFetcher>,
        policy: Arc<dyn AccessPolicy>,
        download_dir: impl Into<PathBuf>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            matcher: UrlMatcher::for_platform(platform),
            cache: Mutex::new(RecencyCache::new(cache_capacity)),
            fetcher,
            policy,
            direct_links: None,
            download_dir: download_dir.into(),
        }
    }

    /// Try `lookup` before downloading on every fresh fetch.
    #[must_use]
    pub fn with_direct_links(mut self, lookup: Arc<dyn DirectLinkLookup>) -> Self {
        self.direct_links = Some(lookup);
        self
    }

    #[inline]
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.matcher.platform()
    }

    #[inline]
    #[must_use]
    pub const fn matcher(&self) -> &UrlMatcher {
        &self.matcher
    }

    /// Handle currently cached for `key`.
    #[must_use]
    pub fn cached(&self, key: &str) -> Option<MediaHandle> {
        self.with_cache(|cache| cache.lookup(key).cloned())
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.with_cache(|cache| cache.len())
    }

    pub async fn handle(&self, gateway: &dyn MessagingGateway, msg: &IncomingMessage) -> Outcome {
        let platform = self.platform();

        if !self.policy.is_allowed(msg.chat_id) {
            info!(%platform, chat_id = %msg.chat_id, "rejecting unauthorized chat");
            notify(gateway, msg, AUTH_PROMPT).await;
            return Outcome::Unauthorized;
        }

        let Some(key) = self.matcher.extract(&msg.text) else {
            return Outcome::NoMatch;
        };
        info!(%platform, url = %key, chat_id = %msg.chat_id, "handling url");

        if let Some(handle) = self.cached(&key) {
            match gateway.reply_video(msg, VideoReply::resend(handle)).await {
                Ok(fresh) => {
                    debug!(%platform, url = %key, "resent cached video");
                    self.remember(key, fresh);
                    return Outcome::Resent;
                }
                Err(err) => {
                    warn!(%platform, url = %key, %err, "cached handle rejected, fetching again");
                    self.with_cache(|cache| cache.evict(key.as_str()));
                }
            }
        }

        self.fetch_fresh(gateway, msg, key).await
    }

    async fn fetch_fresh(
        &self,
        gateway: &dyn MessagingGateway,
        msg: &IncomingMessage,
        key: String,
    ) -> Outcome {
        let platform = self.platform();

        if let Some(lookup) = &self.direct_links {
            if let Some(url) = lookup.video_url(&key).await {
                info!(%platform, url = %key, "got direct video link");
                let reply = VideoReply::portrait(VideoSource::Url(url));
                return self.upload(gateway, msg, key, reply).await;
            }
            debug!(%platform, url = %key, "no direct link, downloading");
        }

        let slot = match DownloadSlot::new(&self.download_dir, platform) {
            Ok(slot) => slot,
            Err(err) => {
                error!(%platform, %err, "failed to prepare download directory");
                return Outcome::Dropped;
            }
        };

        let path = match self.fetcher.fetch(&key, &slot.prefix()).await {
            Ok(path) => path,
            Err(err) => {
                warn!(%platform, url = %key, %err, "download failed");
                notify(gateway, msg, &format!("Failed to download the {platform} video")).await;
                return Outcome::FetchFailed;
            }
        };

        let reply = VideoReply::portrait(VideoSource::File(path));
        // `slot` stays alive until the upload finishes
        let outcome = self.upload(gateway, msg, key, reply).await;
        drop(slot);
        outcome
    }

    async fn upload(
        &self,
        gateway: &dyn MessagingGateway,
        msg: &IncomingMessage,
        key: String,
        reply: VideoReply,
    ) -> Outcome {
        match gateway.reply_video(msg, reply).await {
            Ok(handle) => {
                self.remember(key, handle);
                Outcome::Fetched
            }
            Err(err) => {
                error!(platform = %self.platform(), url = %key, %err, "failed to send video");
                Outcome::Dropped
            }
        }
    }

    fn remember(&self, key: String, handle: MediaHandle) {
        if let Some((evicted, _)) = self.with_cache(|cache| cache.touch_and_store(key, handle)) {
            debug!(platform = %self.platform(), url = %evicted, "evicted oldest cache entry");
        }
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut RecencyCache<String, MediaHandle>) -> T) -> T {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cache)
    }
}
