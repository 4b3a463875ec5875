use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};
use teloxide::types::ChatId;
use tracing::{info, warn};

/// Membership queries the relay asks before doing any work for a chat.
pub trait AccessPolicy: Send + Sync {
    fn is_allowed(&self, chat_id: ChatId) -> bool;
    fn is_blacklisted(&self, chat_id: ChatId) -> bool;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AllowedFile {
    #[serde(default)]
    allowed_chats: Vec<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BlacklistFile {
    #[serde(default)]
    blacklist: Vec<i64>,
}

/// Allow-list and blacklist of chats, persisted as two JSON files that are
/// rewritten in full on every change.
#[derive(Debug)]
pub struct ChatRegistry {
    allowed: RwLock<HashSet<i64>>,
    blacklist: RwLock<HashSet<i64>>,
    allowed_path: PathBuf,
    blacklist_path: PathBuf,
}

impl ChatRegistry {
    /// Load both lists. A missing or unreadable file yields an empty list.
    pub async fn load(allowed_path: impl Into<PathBuf>, blacklist_path: impl Into<PathBuf>) -> Self {
        let allowed_path = allowed_path.into();
        let blacklist_path = blacklist_path.into();

        let allowed = read_json::<AllowedFile>(&allowed_path)
            .await
            .allowed_chats
            .into_iter()
            .collect::<HashSet<_>>();
        let blacklist = read_json::<BlacklistFile>(&blacklist_path)
            .await
            .blacklist
            .into_iter()
            .collect::<HashSet<_>>();

        info!(
            allowed = allowed.len(),
            blacklisted = blacklist.len(),
            "loaded chat lists"
        );

        Self {
            allowed: RwLock::new(allowed),
            blacklist: RwLock::new(blacklist),
            allowed_path,
            blacklist_path,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the lists cannot be written back.
    pub async fn add_allowed(&self, chat_id: ChatId) -> Result<()> {
        write_set(&self.allowed).insert(chat_id.0);
        self.save().await
    }

    /// # Errors
    ///
    /// Returns an error if the lists cannot be written back.
    pub async fn remove_allowed(&self, chat_id: ChatId) -> Result<()> {
        write_set(&self.allowed).remove(&chat_id.0);
        self.save().await
    }

    /// Blacklist a chat and drop it from the allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error if the lists cannot be written back.
    pub async fn add_blacklisted(&self, chat_id: ChatId) -> Result<()> {
        write_set(&self.blacklist).insert(chat_id.0);
        write_set(&self.allowed).remove(&chat_id.0);
        self.save().await
    }

    /// # Errors
    ///
    /// Returns an error if the lists cannot be written back.
    pub async fn remove_blacklisted(&self, chat_id: ChatId) -> Result<()> {
        write_set(&self.blacklist).remove(&chat_id.0);
        self.save().await
    }

    async fn save(&self) -> Result<()> {
        let allowed = AllowedFile {
            allowed_chats: sorted(&self.allowed),
        };
        let blacklist = BlacklistFile {
            blacklist: sorted(&self.blacklist),
        };
        write_json(&self.allowed_path, &allowed).await?;
        write_json(&self.blacklist_path, &blacklist).await
    }
}

impl AccessPolicy for ChatRegistry {
    fn is_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&chat_id.0)
    }

    fn is_blacklisted(&self, chat_id: ChatId) -> bool {
        self.blacklist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&chat_id.0)
    }
}

fn write_set(set: &RwLock<HashSet<i64>>) -> std::sync::RwLockWriteGuard<'_, HashSet<i64>> {
    set.write().unwrap_or_else(PoisonError::into_inner)
}

fn sorted(set: &RwLock<HashSet<i64>>) -> Vec<i64> {
    let mut ids = set
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .copied()
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids
}

async fn read_json<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read chat list");
            return T::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|err| {
        warn!(path = %path.display(), %err, "failed to parse chat list");
        T::default()
    })
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_mean_empty_lists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ChatRegistry::load(dir.path().join("a.json"), dir.path().join("b.json")).await;
        assert!(!registry.is_allowed(ChatId(1)));
        assert!(!registry.is_blacklisted(ChatId(1)));
    }

    #[tokio::test]
    async fn malformed_file_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let allowed = dir.path().join("allowed.json");
        tokio::fs::write(&allowed, "{not json").await.expect("write");
        let registry = ChatRegistry::load(&allowed, dir.path().join("b.json")).await;
        assert!(!registry.is_allowed(ChatId(1)));
    }

    #[tokio::test]
    async fn mutations_persist_in_expected_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        let allowed = dir.path().join("config/allowed_chats.json");
        let blacklist = dir.path().join("config/blacklist_chats.json");

        let registry = ChatRegistry::load(&allowed, &blacklist).await;
        registry.add_allowed(ChatId(-100)).await.expect("add");
        registry.add_allowed(ChatId(7)).await.expect("add");
        registry.add_blacklisted(ChatId(9)).await.expect("blacklist");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&allowed).expect("read")).expect("json");
        assert_eq!(raw, serde_json::json!({ "allowed_chats": [-100, 7] }));
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&blacklist).expect("read")).expect("json");
        assert_eq!(raw, serde_json::json!({ "blacklist": [9] }));

        let reloaded = ChatRegistry::load(&allowed, &blacklist).await;
        assert!(reloaded.is_allowed(ChatId(-100)));
        assert!(reloaded.is_blacklisted(ChatId(9)));
    }

    #[tokio::test]
    async fn blacklisting_revokes_access() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = ChatRegistry::load(dir.path().join("a.json"), dir.path().join("b.json")).await;

        registry.add_allowed(ChatId(5)).await.expect("add");
        registry.add_blacklisted(ChatId(5)).await.expect("blacklist");
        assert!(!registry.is_allowed(ChatId(5)));
        assert!(registry.is_blacklisted(ChatId(5)));

        registry.remove_blacklisted(ChatId(5)).await.expect("remove");
        assert!(!registry.is_blacklisted(ChatId(5)));
    }
}
