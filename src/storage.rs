use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

/// Filesystem-backed storage for post images.
///
/// Only generated file names are handed out; callers never see paths.
#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub async fn put(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await?;
        fs::write(self.root.join(file_name), bytes).await
    }

    /// Deleting a file that is already gone is not an error.
    pub async fn delete(&self, file_name: &str) -> std::io::Result<()> {
        match fs::remove_file(self.root.join(file_name)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Strip everything outside `[A-Za-z0-9_-]` from the client-provided file
/// name's stem. An empty result falls back to a fixed name.
#[must_use]
pub fn sanitize_file_stem(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    let safe: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if safe.is_empty() {
        String::from("image")
    } else {
        safe
    }
}

/// Collision-free storage name: `{sanitized-stem}-{uuid}.{ext}`
#[must_use]
pub fn unique_file_name(original: &str, extension: &str) -> String {
    format!(
        "{}-{}.{}",
        sanitize_file_stem(original),
        Uuid::now_v7(),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_allowed_characters() {
        assert_eq!(sanitize_file_stem("holiday_pic-3.png"), "holiday_pic-3");
    }

    #[test]
    fn sanitize_strips_everything_else() {
        assert_eq!(sanitize_file_stem("my photo (1)!.jpg"), "myphoto1");
        assert_eq!(sanitize_file_stem("../../etc/passwd.png"), "passwd");
    }

    #[test]
    fn sanitize_falls_back_when_empty() {
        assert_eq!(sanitize_file_stem("útil·lísima.gif"), "image");
        assert_eq!(sanitize_file_stem(".gif"), "image");
    }

    #[test]
    fn unique_names_do_not_collide() {
        let a = unique_file_name("cat.png", "png");
        let b = unique_file_name("cat.png", "png");
        assert!(a.starts_with("cat-"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn put_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("posts"));

        storage.put("a.png", b"pixels").await.unwrap();
        assert!(dir.path().join("posts/a.png").exists());

        storage.delete("a.png").await.unwrap();
        assert!(!dir.path().join("posts/a.png").exists());

        // already gone, still fine
        storage.delete("a.png").await.unwrap();
    }
}
