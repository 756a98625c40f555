use anyhow::Result;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// Upload size cap: 50 MiB.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    fn dir(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photos",
            MediaKind::Video => "videos",
        }
    }
}

/// Classify a declared MIME type against the upload allow-list. Anything
/// starting with `video/` is a video, everything else a photo.
pub fn classify(mime: &str) -> Option<(MediaKind, &'static str)> {
    let ext = match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/webm" => "webm",
        _ => return None,
    };
    let kind = if mime.starts_with("video/") {
        MediaKind::Video
    } else {
        MediaKind::Photo
    };
    Some((kind, ext))
}

/// On-disk storage for gallery media under `{root}/uploads/{photos|videos}`.
/// Rows store web paths like `/uploads/photos/{uuid}.png`, resolved back to
/// disk paths here.
#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        for dir in ["photos", "videos"] {
            fs::create_dir_all(root.join("uploads").join(dir)).await?;
        }
        info!("Media storage root: {}", root.display());
        Ok(Self { root })
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    /// Persist the payload under a collision-resistant generated name and
    /// return the web path to store in the gallery row.
    pub async fn save(&self, kind: MediaKind, ext: &str, data: &[u8]) -> Result<String> {
        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        let rel = format!("/uploads/{}/{}", kind.dir(), filename);
        fs::write(self.root.join("uploads").join(kind.dir()).join(&filename), data).await?;
        Ok(rel)
    }

    /// Best-effort removal of the backing file. Failures are logged, never
    /// propagated — the row deletion already succeeded.
    pub async fn remove(&self, web_path: &str) {
        let Some(disk_path) = self.resolve(web_path) else {
            warn!("Refusing to delete suspicious media path: {}", web_path);
            return;
        };
        if let Err(e) = fs::remove_file(&disk_path).await {
            warn!("Error deleting file {}: {}", disk_path.display(), e);
        }
    }

    pub async fn exists(&self, web_path: &str) -> bool {
        match self.resolve(web_path) {
            Some(path) => fs::metadata(path).await.is_ok(),
            None => false,
        }
    }

    /// Map a stored web path back to a disk path, rejecting anything that
    /// escapes the uploads directory.
    fn resolve(&self, web_path: &str) -> Option<PathBuf> {
        let rel = web_path.strip_prefix('/').unwrap_or(web_path);
        if !rel.starts_with("uploads/") || rel.contains("..") {
            return None;
        }
        Some(self.root.join(rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_follows_the_allow_list() {
        assert_eq!(classify("image/png"), Some((MediaKind::Photo, "png")));
        assert_eq!(classify("image/gif"), Some((MediaKind::Photo, "gif")));
        assert_eq!(classify("video/mp4"), Some((MediaKind::Video, "mp4")));
        assert_eq!(classify("video/quicktime"), Some((MediaKind::Video, "mov")));
        assert_eq!(classify("application/pdf"), None);
        assert_eq!(classify("text/html"), None);
    }

    #[tokio::test]
    async fn save_and_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf()).await.unwrap();

        let web_path = store.save(MediaKind::Photo, "png", b"fake-png").await.unwrap();
        assert!(web_path.starts_with("/uploads/photos/"));
        assert!(store.exists(&web_path).await);

        store.remove(&web_path).await;
        assert!(!store.exists(&web_path).await);
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf()).await.unwrap();
        assert!(!store.exists("/uploads/../secret").await);
        assert!(!store.exists("/etc/passwd").await);
        // removal of a bad path is a no-op
        store.remove("/uploads/../secret").await;
    }
}
