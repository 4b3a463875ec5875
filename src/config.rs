use crate::cache::DEFAULT_CAPACITY;
use std::{env, path::PathBuf};
use teloxide::types::ChatId;

/// 50 MiB, the Bot API upload limit for videos.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: Option<String>,
    /// Chat that receives authorization requests and moderates chat lists.
    pub auth_chat_id: Option<ChatId>,
    pub download_dir: PathBuf,
    pub max_file_size: u64,
    pub cache_capacity: usize,
    pub allowed_chats_path: PathBuf,
    pub blacklist_chats_path: PathBuf,
    pub ytdlp_path: String,
    pub youtube: YoutubeConfig,
    pub instagram: InstagramConfig,
    pub tiktok: TiktokConfig,
}

#[derive(Debug, Clone, Default)]
pub struct YoutubeConfig {
    pub cookies_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct InstagramConfig {
    pub cookies_path: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub app_id: Option<String>,
    /// Session cookies sent with web API lookups.
    pub cookies: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct TiktokConfig {
    pub cookies_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bot_token: non_empty_env("BOT_TOKEN"),
            auth_chat_id: non_empty_env("AUTH_CHAT_ID")
                .and_then(|id| id.parse::<i64>().ok().map(ChatId)),
            download_dir: non_empty_env("DOWNLOAD_PATH").map_or(defaults.download_dir, PathBuf::from),
            max_file_size: parse_env("MAX_FILE_SIZE").unwrap_or(defaults.max_file_size),
            cache_capacity: parse_env("CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            allowed_chats_path: non_empty_env("ALLOWED_CHATS_PATH")
                .map_or(defaults.allowed_chats_path, PathBuf::from),
            blacklist_chats_path: non_empty_env("BLACKLIST_CHATS_PATH")
                .map_or(defaults.blacklist_chats_path, PathBuf::from),
            ytdlp_path: non_empty_env("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            youtube: YoutubeConfig::from_env(),
            instagram: InstagramConfig::from_env(),
            tiktok: TiktokConfig::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            auth_chat_id: None,
            download_dir: PathBuf::from("downloads"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            cache_capacity: DEFAULT_CAPACITY,
            allowed_chats_path: PathBuf::from("config/allowed_chats.json"),
            blacklist_chats_path: PathBuf::from("config/blacklist_chats.json"),
            ytdlp_path: "yt-dlp".into(),
            youtube: YoutubeConfig::default(),
            instagram: InstagramConfig::default(),
            tiktok: TiktokConfig::default(),
        }
    }
}

impl YoutubeConfig {
    fn from_env() -> Self {
        Self {
            cookies_path: get_path_from_env("YOUTUBE_SESSION_COOKIE_PATH"),
        }
    }
}

impl InstagramConfig {
    fn from_env() -> Self {
        Self {
            cookies_path: get_path_from_env("IG_SESSION_COOKIE_PATH"),
            user_agent: non_empty_env("USER_AGENT"),
            app_id: non_empty_env("X_IG_APP_ID"),
            cookies: env::var("COOKIES")
                .map(|raw| parse_cookies(&raw))
                .unwrap_or_default(),
        }
    }

    /// Cookies joined into a `Cookie` header value.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let header = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }
}

impl TiktokConfig {
    fn from_env() -> Self {
        Self {
            cookies_path: get_path_from_env("TIKTOK_SESSION_COOKIE_PATH"),
        }
    }
}

/// Split `k=v; k2=v2` into pairs. Pairs without `=` are skipped.
#[must_use]
pub fn parse_cookies(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| item.split_once('='))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .collect()
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    non_empty_env(key).and_then(|v| v.parse().ok())
}

fn get_path_from_env(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.is_file())
}
