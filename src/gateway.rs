use crate::error::{Error, Result};
use std::{fmt, path::PathBuf};
use teloxide::{
    Bot,
    payloads::{SendMessageSetters, SendVideoSetters},
    prelude::Requester,
    types::{ChatId, FileId, InputFile, Message, MessageId, ReplyParameters},
};
use tracing::warn;
use url::Url;

/// Opaque reference to a video the messenger already stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaHandle(pub String);

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub id: u64,
    pub username: Option<String>,
}

/// The parts of an inbound chat message the relay works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
    pub sender: Option<Sender>,
    pub chat_kind: String,
    pub chat_title: Option<String>,
}

impl IncomingMessage {
    /// Build from a teloxide message. Returns `None` for non-text messages.
    #[must_use]
    pub fn from_message(msg: &Message) -> Option<Self> {
        let text = msg.text()?.to_owned();
        let chat_kind = if msg.chat.is_private() {
            "private"
        } else if msg.chat.is_group() {
            "group"
        } else if msg.chat.is_supergroup() {
            "supergroup"
        } else if msg.chat.is_channel() {
            "channel"
        } else {
            "unknown"
        };
        Some(Self {
            chat_id: msg.chat.id,
            message_id: msg.id,
            text,
            sender: msg.from.as_ref().map(|user| Sender {
                id: user.id.0,
                username: user.username.clone(),
            }),
            chat_kind: chat_kind.into(),
            chat_title: msg.chat.title().map(ToOwned::to_owned),
        })
    }
}

/// Where the video to send comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    File(PathBuf),
    Handle(MediaHandle),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReply {
    pub source: VideoSource,
    pub caption: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl VideoReply {
    /// Resend of already uploaded media: no caption, no dimensions.
    #[must_use]
    pub fn resend(handle: MediaHandle) -> Self {
        Self {
            source: VideoSource::Handle(handle),
            caption: String::new(),
            width: None,
            height: None,
        }
    }

    /// Fresh upload in portrait short-video dimensions.
    #[must_use]
    pub const fn portrait(source: VideoSource) -> Self {
        Self {
            source,
            caption: String::new(),
            width: Some(1080),
            height: Some(1920),
        }
    }
}

/// Outbound side of the messenger.
#[async_trait::async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Reply to `msg` with plain text.
    async fn reply_text(&self, msg: &IncomingMessage, text: &str) -> Result<()>;

    /// Reply to `msg` with a video and return the handle of the stored media.
    async fn reply_video(&self, msg: &IncomingMessage, reply: VideoReply) -> Result<MediaHandle>;

    /// Send plain text to an arbitrary chat.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;
}

/// Reply with `text`, logging instead of propagating a failure.
pub async fn notify(gateway: &dyn MessagingGateway, msg: &IncomingMessage, text: &str) {
    if let Err(err) = gateway.reply_text(msg, text).await {
        warn!(chat_id = %msg.chat_id, %err, "failed to notify chat");
    }
}

/// Send `text` to `chat_id`, logging instead of propagating a failure.
pub async fn notify_chat(gateway: &dyn MessagingGateway, chat_id: ChatId, text: &str) {
    if let Err(err) = gateway.send_text(chat_id, text).await {
        warn!(%chat_id, %err, "failed to notify chat");
    }
}

/// `MessagingGateway` over the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    #[inline]
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait::async_trait]
impl MessagingGateway for TelegramGateway {
    async fn reply_text(&self, msg: &IncomingMessage, text: &str) -> Result<()> {
        self.bot
            .send_message(msg.chat_id, text)
            .reply_parameters(ReplyParameters::new(msg.message_id))
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn reply_video(&self, msg: &IncomingMessage, reply: VideoReply) -> Result<MediaHandle> {
        let video = match reply.source {
            VideoSource::File(path) => InputFile::file(path),
            VideoSource::Handle(handle) => InputFile::file_id(FileId(handle.0)),
            VideoSource::Url(url) => InputFile::url(Url::parse(&url)?),
        };

        let mut req = self
            .bot
            .send_video(msg.chat_id, video)
            .reply_parameters(ReplyParameters::new(msg.message_id));
        if !reply.caption.is_empty() {
            req = req.caption(reply.caption);
        }
        if let Some(width) = reply.width {
            req = req.width(width);
        }
        if let Some(height) = reply.height {
            req = req.height(height);
        }

        let sent = req.await.map_err(Error::from)?;
        sent.video()
            .map(|video| MediaHandle(video.file.id.to_string()))
            .ok_or(Error::MissingVideo)
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.bot
            .send_message(chat_id, text)
            .await
            .map_err(Error::from)?;
        Ok(())
    }
}
