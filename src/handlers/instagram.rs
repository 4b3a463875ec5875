use crate::{
    access::AccessPolicy,
    config::InstagramConfig,
    download::MediaFetcher,
    error::{Error, Result},
    gateway::{IncomingMessage, MessagingGateway},
    handler::{DirectLinkLookup, Outcome, Relay},
    handlers::SocialHandler,
    matcher::Platform,
};
use regex::Regex;
use reqwest::{
    Client,
    header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT},
};
use serde::Deserialize;
use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
};
use tracing::{debug, warn};

static POST_ID_RE: OnceLock<Regex> = OnceLock::new();

fn post_id_regex() -> &'static Regex {
    POST_ID_RE.get_or_init(|| {
        Regex::new(r"instagram\.com/(?:[A-Za-z0-9_.]+/)?(?:p|reels|reel|stories)/([A-Za-z0-9_-]+)")
            .expect("failed to compile regex")
    })
}

/// Post identifier (shortcode) of an Instagram link.
#[must_use]
pub fn post_id(url: &str) -> Option<&str> {
    post_id_regex()
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Default, Deserialize)]
struct PostInfo {
    #[serde(default)]
    items: Vec<PostItem>,
}

#[derive(Debug, Default, Deserialize)]
struct PostItem {
    #[serde(default)]
    video_versions: Vec<VideoVersion>,
}

#[derive(Debug, Deserialize)]
struct VideoVersion {
    url: Option<String>,
}

impl PostInfo {
    fn first_video_url(self) -> Option<String> {
        self.items
            .into_iter()
            .next()?
            .video_versions
            .into_iter()
            .next()?
            .url
    }
}

/// Asks Instagram's web API for a playable video URL so the messenger can
/// fetch it itself.
#[derive(Debug, Clone)]
pub struct InstagramApi {
    client: Client,
    base_url: String,
}

impl InstagramApi {
    const BASE_URL: &'static str = "https://www.instagram.com";

    /// Build a client carrying the configured headers and session cookies.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured header value is not valid or the
    /// HTTP client cannot be built.
    pub fn new(config: &InstagramConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(agent) = &config.user_agent {
            headers.insert(USER_AGENT, header_value(agent)?);
        }
        if let Some(app_id) = &config.app_id {
            headers.insert(HeaderName::from_static("x-ig-app-id"), header_value(app_id)?);
        }
        for (name, value) in [
            ("sec-fetch-site", "same-origin"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-dest", "empty"),
        ] {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        headers.insert(REFERER, HeaderValue::from_static("https://www.instagram.com"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));
        if let Some(cookie) = config.cookie_header() {
            headers.insert(COOKIE, header_value(&cookie)?);
        }

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            base_url: Self::BASE_URL.into(),
        })
    }

    async fn fetch_video_url(&self, id: &str) -> Result<Option<String>> {
        let info = self
            .client
            .get(format!("{}/p/{id}", self.base_url))
            .query(&[("__a", "1"), ("__d", "dis")])
            .send()
            .await?
            .error_for_status()?
            .json::<PostInfo>()
            .await?;
        Ok(info.first_video_url())
    }
}

#[async_trait::async_trait]
impl DirectLinkLookup for InstagramApi {
    async fn video_url(&self, url: &str) -> Option<String> {
        let id = post_id(url)?;
        match self.fetch_video_url(id).await {
            Ok(found) => {
                debug!(%id, found = found.is_some(), "instagram api lookup");
                found
            }
            Err(err) => {
                warn!(%id, %err, "instagram api lookup failed");
                None
            }
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::other(format!("invalid header value: {e}")))
}

/// Handler for Instagram reels
pub struct InstagramHandler {
    relay: Relay,
}

impl InstagramHandler {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        policy: Arc<dyn AccessPolicy>,
        download_dir: impl Into<PathBuf>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            relay: Relay::new(
                Platform::Instagram,
                fetcher,
                policy,
                download_dir,
                cache_capacity,
            ),
        }
    }

    /// Try `lookup` for a direct video link before downloading.
    #[must_use]
    pub fn with_direct_links(self, lookup: Arc<dyn DirectLinkLookup>) -> Self {
        Self {
            relay: self.relay.with_direct_links(lookup),
        }
    }

    #[inline]
    #[must_use]
    pub const fn relay(&self) -> &Relay {
        &self.relay
    }
}

#[async_trait::async_trait]
impl SocialHandler for InstagramHandler {
    fn name(&self) -> &'static str {
        "instagram"
    }

    fn try_extract(&self, text: &str) -> Option<String> {
        self.relay.matcher().extract(text)
    }

    async fn handle(&self, gateway: &dyn MessagingGateway, msg: &IncomingMessage) -> Outcome {
        self.relay.handle(gateway, msg).await
    }
}
