use regex::Regex;
use std::{fmt, sync::OnceLock};
use tracing::debug;
use url::Url;

const TIKTOK_PATTERN: &str = r"https?://(\w+\.)?tiktok\.com/[^\s]+";
const INSTAGRAM_PATTERN: &str =
    r"https?://(?:www\.)?instagram\.com(?:/[A-Za-z0-9_.]+)?/reel/[A-Za-z0-9_-]+/?(?:\?[^\s]*)?";
const YOUTUBE_PATTERN: &str = r"https?://(www\.)?youtube\.com/shorts/[^\s]+";

static TIKTOK_RE: OnceLock<Regex> = OnceLock::new();
static INSTAGRAM_RE: OnceLock<Regex> = OnceLock::new();
static YOUTUBE_RE: OnceLock<Regex> = OnceLock::new();

/// Short-form video platforms the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    TikTok,
    Instagram,
    YouTube,
}

impl Platform {
    /// Short name used for logging, temp-file prefixes etc.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TikTok => "tiktok",
            Self::Instagram => "instagram",
            Self::YouTube => "youtube",
        }
    }

    fn regex(self) -> &'static Regex {
        let (cell, pattern) = match self {
            Self::TikTok => (&TIKTOK_RE, TIKTOK_PATTERN),
            Self::Instagram => (&INSTAGRAM_RE, INSTAGRAM_PATTERN),
            Self::YouTube => (&YOUTUBE_RE, YOUTUBE_PATTERN),
        };
        cell.get_or_init(|| Regex::new(pattern).expect("failed to compile url regex"))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Finds the first link of one platform in free-form text and reduces it to
/// the canonical form used as a cache key.
#[derive(Debug, Clone, Copy)]
pub struct UrlMatcher {
    platform: Platform,
}

impl UrlMatcher {
    #[inline]
    #[must_use]
    pub const fn for_platform(platform: Platform) -> Self {
        Self { platform }
    }

    #[inline]
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Whether `text` contains a link of this platform at all.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.platform.regex().is_match(text)
    }

    /// Canonical URL of the first link in `text`, if any.
    #[must_use]
    pub fn extract(&self, text: &str) -> Option<String> {
        let found = self.platform.regex().find(text)?.as_str();
        match self.platform {
            Platform::TikTok => rebuild_without_query(found),
            Platform::Instagram | Platform::YouTube => Some(canonicalize(found)),
        }
    }
}

/// Strip the query string and a single trailing slash.
#[must_use]
pub fn canonicalize(url: &str) -> String {
    let without_query = url.split_once('?').map_or(url, |(base, _)| base);
    without_query
        .strip_suffix('/')
        .unwrap_or(without_query)
        .to_owned()
}

/// Parse `url`, drop query and fragment, and serialize it back with one
/// trailing slash removed. Unparseable candidates are skipped.
fn rebuild_without_query(url: &str) -> Option<String> {
    let mut parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(%url, %err, "skipping unparseable url");
            return None;
        }
    };
    parsed.set_query(None);
    parsed.set_fragment(None);

    let rebuilt = parsed.as_str();
    Some(rebuilt.strip_suffix('/').unwrap_or(rebuilt).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIKTOK: UrlMatcher = UrlMatcher::for_platform(Platform::TikTok);
    const INSTAGRAM: UrlMatcher = UrlMatcher::for_platform(Platform::Instagram);
    const YOUTUBE: UrlMatcher = UrlMatcher::for_platform(Platform::YouTube);

    #[test]
    fn canonicalize_strips_query_and_slash() {
        assert_eq!(
            canonicalize("https://www.youtube.com/shorts/abc/?feature=share"),
            "https://www.youtube.com/shorts/abc"
        );
        assert_eq!(canonicalize("https://x.com/a/"), "https://x.com/a");
        assert_eq!(canonicalize("https://x.com/a"), "https://x.com/a");
    }

    #[test]
    fn query_does_not_change_key() {
        let cases = [
            (TIKTOK, "https://www.tiktok.com/@user/video/123"),
            (TIKTOK, "https://vm.tiktok.com/ZMabcdef"),
            (INSTAGRAM, "https://www.instagram.com/reel/C0ffee_-1"),
            (INSTAGRAM, "https://instagram.com/someone/reel/Xyz"),
            (YOUTUBE, "https://www.youtube.com/shorts/dQw4w9WgXcQ"),
        ];
        for (matcher, url) in cases {
            let plain = matcher.extract(url);
            assert_eq!(plain.as_deref(), Some(url));
            assert_eq!(matcher.extract(&format!("{url}?x=1")), plain);
            assert_eq!(matcher.extract(&format!("see {url}/?x=1 lol")), plain);
        }
    }

    #[test]
    fn tiktok_in_free_text() {
        assert_eq!(
            TIKTOK
                .extract("check this https://www.tiktok.com/@user/video/123?x=1")
                .as_deref(),
            Some("https://www.tiktok.com/@user/video/123")
        );
    }

    #[test]
    fn tiktok_drops_fragment() {
        assert_eq!(
            TIKTOK
                .extract("https://www.tiktok.com/@user/video/123#comments")
                .as_deref(),
            Some("https://www.tiktok.com/@user/video/123")
        );
    }

    #[test]
    fn only_one_trailing_slash_is_stripped() {
        assert_eq!(
            TIKTOK
                .extract("https://www.tiktok.com/@user/video/1//?x=1")
                .as_deref(),
            Some("https://www.tiktok.com/@user/video/1/")
        );
        assert_eq!(
            YOUTUBE
                .extract("https://www.youtube.com/shorts/abc//?x=1")
                .as_deref(),
            Some("https://www.youtube.com/shorts/abc/")
        );
    }

    #[test]
    fn only_first_match_is_used() {
        let text = "https://www.youtube.com/shorts/first and https://www.youtube.com/shorts/second";
        assert_eq!(
            YOUTUBE.extract(text).as_deref(),
            Some("https://www.youtube.com/shorts/first")
        );
    }

    #[test]
    fn no_match() {
        assert!(TIKTOK.extract("nothing to see here").is_none());
        assert!(INSTAGRAM.extract("https://www.instagram.com/p/abc").is_none());
        assert!(YOUTUBE.extract("https://www.youtube.com/watch?v=abc").is_none());
        assert!(!YOUTUBE.is_match("https://www.tiktok.com/@user/video/1"));
    }
}
