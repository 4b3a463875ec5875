use std::{ffi::OsStr, path::Path};
use tokio::{fs::File, io::AsyncReadExt};

/// Extensions the downloader may produce, in order of preference.
pub static VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv"];

/// Whether the extension alone marks `path` as a video.
#[must_use]
pub fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Check the extension first, otherwise read a small prefix asynchronously
/// and sniff it with `infer`.
pub async fn is_video_file(path: &Path) -> bool {
    if has_video_extension(path) {
        return true;
    }

    let Ok(mut f) = File::open(path).await else {
        return false;
    };
    let mut buf = vec![0u8; 8192];
    match f.read(&mut buf).await {
        Ok(n) if n > 0 => {
            buf.truncate(n);
            infer::get(&buf).is_some_and(|k| k.mime_type().starts_with("video/"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_extensions() {
        assert!(has_video_extension(Path::new("clip.mp4")));
        assert!(has_video_extension(Path::new("clip.MKV")));
        assert!(!has_video_extension(Path::new("clip.mp4.part")));
        assert!(!has_video_extension(Path::new("info.json")));
        assert!(!has_video_extension(Path::new("noext")));
    }

    #[tokio::test]
    async fn sniffs_content_without_extension() {
        let dir = tempfile::tempdir().expect("tempdir");

        // minimal ISO BMFF header: size, "ftyp", brand "isom"
        let mp4 = dir.path().join("clip");
        let mut header = vec![0, 0, 0, 0x18];
        header.extend_from_slice(b"ftypisom");
        header.extend_from_slice(&[0; 12]);
        tokio::fs::write(&mp4, &header).await.expect("write");
        assert!(is_video_file(&mp4).await);

        let text = dir.path().join("notes");
        tokio::fs::write(&text, b"hello").await.expect("write");
        assert!(!is_video_file(&text).await);

        assert!(!is_video_file(&dir.path().join("missing")).await);
    }
}
