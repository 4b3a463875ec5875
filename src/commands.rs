use crate::{
    access::{AccessPolicy, ChatRegistry},
    error::Result,
    gateway::{IncomingMessage, MessagingGateway, notify_chat},
};
use std::sync::Arc;
use teloxide::{types::ChatId, utils::command::BotCommands};
use tracing::{info, warn};

#[derive(BotCommands, Debug, Clone, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "These commands are supported:")]
pub enum Command {
    /// Display this text.
    #[command(aliases = ["h", "?"])]
    Help,
    /// Ask the moderators to allow this chat.
    Auth,
    /// Allow a chat (moderators only).
    AddAllowedChat(String),
    /// Revoke access of a chat (moderators only).
    RemoveAllowedChat(String),
    /// Block a chat (moderators only).
    AddBlacklistChat(String),
    /// Unblock a chat (moderators only).
    RemoveBlacklistChat(String),
}

/// Authorization workflow: chats request access, the moderation chat edits
/// the allow-list and blacklist.
pub struct Moderation {
    registry: Arc<ChatRegistry>,
    auth_chat_id: Option<ChatId>,
}

impl Moderation {
    #[must_use]
    pub const fn new(registry: Arc<ChatRegistry>, auth_chat_id: Option<ChatId>) -> Self {
        Self {
            registry,
            auth_chat_id,
        }
    }

    /// Handle a command from the user.
    ///
    /// # Errors
    ///
    /// Returns an error if a reply fails to send or the chat lists cannot be
    /// saved.
    pub async fn answer(
        &self,
        gateway: &dyn MessagingGateway,
        msg: &IncomingMessage,
        cmd: Command,
    ) -> Result<()> {
        match cmd {
            Command::Help => {
                gateway
                    .reply_text(msg, &Command::descriptions().to_string())
                    .await
            }
            Command::Auth => self.request_access(gateway, msg).await,
            Command::AddAllowedChat(arg) => {
                self.moderate(gateway, msg, ListChange::Allow, &arg).await
            }
            Command::RemoveAllowedChat(arg) => {
                self.moderate(gateway, msg, ListChange::Revoke, &arg).await
            }
            Command::AddBlacklistChat(arg) => {
                self.moderate(gateway, msg, ListChange::Block, &arg).await
            }
            Command::RemoveBlacklistChat(arg) => {
                self.moderate(gateway, msg, ListChange::Unblock, &arg).await
            }
        }
    }

    async fn request_access(&self, gateway: &dyn MessagingGateway, msg: &IncomingMessage) -> Result<()> {
        let chat_id = msg.chat_id;

        if self.registry.is_blacklisted(chat_id) {
            return gateway.reply_text(msg, "Authorization denied").await;
        }
        if self.registry.is_allowed(chat_id) {
            return gateway.reply_text(msg, "This chat is already authorized").await;
        }
        let Some(auth_chat_id) = self.auth_chat_id else {
            warn!(%chat_id, "authorization requested but AUTH_CHAT_ID is not set");
            return gateway
                .reply_text(msg, "Authorization requests are not available right now")
                .await;
        };

        gateway
            .reply_text(msg, "Wait for the authorization to be approved")
            .await?;

        info!(%chat_id, "relaying authorization request");
        gateway
            .send_text(auth_chat_id, &authorization_request(msg))
            .await?;
        for command in moderation_commands(chat_id) {
            gateway.send_text(auth_chat_id, &command).await?;
        }
        Ok(())
    }

    async fn moderate(
        &self,
        gateway: &dyn MessagingGateway,
        msg: &IncomingMessage,
        change: ListChange,
        arg: &str,
    ) -> Result<()> {
        let command = change.command();
        if self.auth_chat_id != Some(msg.chat_id) {
            warn!(chat_id = %msg.chat_id, %command, "ignoring moderation command outside the moderation chat");
            return Ok(());
        }

        let arg = arg.trim();
        if arg.is_empty() {
            return gateway
                .reply_text(msg, &format!("Usage: /{command} <chat_id>"))
                .await;
        }
        let Some(target) = parse_chat_id(arg) else {
            return gateway.reply_text(msg, "Invalid chat id format").await;
        };

        info!(%command, %target, "moderating chat");
        match change {
            ListChange::Allow => {
                if self.registry.is_blacklisted(target) {
                    return gateway.reply_text(msg, "This chat is blacklisted").await;
                }
                self.registry.add_allowed(target).await?;
                gateway
                    .reply_text(msg, &format!("Chat {target} added to the allowed list"))
                    .await?;
                if let Err(err) = gateway.send_text(target, "Access to the bot granted").await {
                    gateway
                        .reply_text(msg, &format!("Failed to notify the chat: {err}"))
                        .await?;
                }
            }
            ListChange::Revoke => {
                self.registry.remove_allowed(target).await?;
                gateway
                    .reply_text(msg, &format!("Chat {target} removed from the allowed list"))
                    .await?;
                notify_chat(gateway, target, "Access to the bot revoked").await;
            }
            ListChange::Block => {
                self.registry.add_blacklisted(target).await?;
                gateway
                    .reply_text(msg, &format!("Chat {target} added to the blacklist"))
                    .await?;
                notify_chat(gateway, target, "Access to the bot blocked").await;
            }
            ListChange::Unblock => {
                self.registry.remove_blacklisted(target).await?;
                gateway
                    .reply_text(msg, &format!("Chat {target} removed from the blacklist"))
                    .await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListChange {
    Allow,
    Revoke,
    Block,
    Unblock,
}

impl ListChange {
    const fn command(self) -> &'static str {
        match self {
            Self::Allow => "add_allowed_chat",
            Self::Revoke => "remove_allowed_chat",
            Self::Block => "add_blacklist_chat",
            Self::Unblock => "remove_blacklist_chat",
        }
    }
}

fn parse_chat_id(arg: &str) -> Option<ChatId> {
    arg.split_whitespace()
        .next()?
        .parse::<i64>()
        .ok()
        .map(ChatId)
}

fn authorization_request(msg: &IncomingMessage) -> String {
    let (user_id, username) = msg.sender.as_ref().map_or_else(
        || ("N/A".to_owned(), "N/A".to_owned()),
        |s| {
            (
                s.id.to_string(),
                s.username.as_deref().unwrap_or("N/A").to_owned(),
            )
        },
    );
    format!(
        "Authorization request:\nUser: @{username}\nUser ID: {user_id}\nChat ID: {}\nChat Type: {}\nChat Title: {}\n\nModeration commands:",
        msg.chat_id,
        msg.chat_kind,
        msg.chat_title.as_deref().unwrap_or("N/A"),
    )
}

/// Ready-to-copy commands for the moderators.
#[must_use]
pub fn moderation_commands(chat_id: ChatId) -> [String; 4] {
    [
        ListChange::Allow,
        ListChange::Revoke,
        ListChange::Block,
        ListChange::Unblock,
    ]
    .map(|change| format!("/{} {chat_id}", change.command()))
}
