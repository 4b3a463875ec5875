use crate::{
    access::AccessPolicy,
    download::MediaFetcher,
    gateway::{IncomingMessage, MessagingGateway},
    handler::{Outcome, Relay},
    matcher::Platform,
};
use std::{path::PathBuf, sync::Arc};

use crate::handlers::SocialHandler;

/// Handler for Tiktok
pub struct TiktokHandler {
    relay: Relay,
}

impl TiktokHandler {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        policy: Arc<dyn AccessPolicy>,
        download_dir: impl Into<PathBuf>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            relay: Relay::new(
                Platform::TikTok,
                fetcher,
                policy,
                download_dir,
                cache_capacity,
            ),
        }
    }

    #[inline]
    #[must_use]
    pub const fn relay(&self) -> &Relay {
        &self.relay
    }
}

#[async_trait::async_trait]
impl SocialHandler for TiktokHandler {
    fn name(&self) -> &'static str {
        "tiktok"
    }

    fn try_extract(&self, text: &str) -> Option<String> {
        self.relay.matcher().extract(text)
    }

    async fn handle(&self, gateway: &dyn MessagingGateway, msg: &IncomingMessage) -> Outcome {
        self.relay.handle(gateway, msg).await
    }
}
