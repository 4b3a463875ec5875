#[cfg(feature = "instagram")]
mod instagram;
#[cfg(feature = "tiktok")]
mod tiktok;
#[cfg(feature = "youtube")]
mod youtube;

use crate::{
    gateway::{IncomingMessage, MessagingGateway},
    handler::Outcome,
};

#[cfg(feature = "instagram")]
pub use instagram::{InstagramApi, InstagramHandler};
#[cfg(feature = "tiktok")]
pub use tiktok::TiktokHandler;
#[cfg(feature = "youtube")]
pub use youtube::YouTubeShortsHandler;

#[async_trait::async_trait]
pub trait SocialHandler: Send + Sync {
    /// Short name used for logging etc.
    fn name(&self) -> &'static str;

    /// Try to extract the canonical URL of this platform's link from
    /// arbitrary text. Return `Some` if the handler should handle this message.
    fn try_extract(&self, text: &str) -> Option<String>;

    /// Do the heavy-lifting: authorize, resend or fetch the video, and reply
    /// to `msg`.
    async fn handle(&self, gateway: &dyn MessagingGateway, msg: &IncomingMessage) -> Outcome;
}
