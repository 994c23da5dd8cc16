//! Local file descriptors handed to the tracker for upload.

use std::io;
use std::path::Path;

/// One audio file selected for transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    /// Original filename, used as the task's display name.
    pub name: String,
    pub content: Vec<u8>,
}

impl AudioFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// Size of the file in bytes.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Read a file from disk, keeping only its final path component as
    /// the name.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", path.display()),
                )
            })?
            .to_string();
        let content = tokio::fs::read(path).await?;
        Ok(Self { name, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_path_uses_file_name_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.wav");
        tokio::fs::write(&path, b"RIFF....").await.unwrap();

        let file = AudioFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "memo.wav");
        assert_eq!(file.size(), 8);
    }

    #[tokio::test]
    async fn from_path_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AudioFile::from_path(dir.path().join("nope.mp3"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
