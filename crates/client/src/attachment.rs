//! Image attachments for a record.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use needlelog_core::BackendRequest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported image type {0:?}; please select a PNG or JPEG image")]
    UnsupportedType(String),
    #[error("image is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

/// Size and type constraints for attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentLimits {
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            allowed_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/jpg".to_string(),
            ],
        }
    }
}

impl AttachmentLimits {
    pub fn check(&self, mime_type: &str, size: u64) -> Result<(), AttachmentError> {
        if !self.allowed_types.iter().any(|t| t == mime_type) {
            return Err(AttachmentError::UnsupportedType(mime_type.to_string()));
        }
        if size > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// An image read fully into memory, ready to upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl ImageAttachment {
    /// Validate and wrap bytes already in memory.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
        limits: &AttachmentLimits,
    ) -> Result<Self, AttachmentError> {
        let mime_type = mime_type.into();
        limits.check(&mime_type, bytes.len() as u64)?;
        Ok(Self {
            name: name.into(),
            mime_type,
            bytes,
        })
    }

    /// Read a file to completion and validate it.
    ///
    /// The type is taken from the file extension; the size check happens
    /// before the contents are read.
    pub async fn read(path: &Path, limits: &AttachmentLimits) -> Result<Self, AttachmentError> {
        let display = path.display().to_string();
        let mime_type = mime_from_path(path);

        let metadata = tokio::fs::metadata(path).await.map_err(|source| AttachmentError::Read {
            path: display.clone(),
            source,
        })?;
        limits.check(&mime_type, metadata.len())?;

        let bytes = tokio::fs::read(path).await.map_err(|source| AttachmentError::Read {
            path: display,
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Self::from_bytes(name, mime_type, bytes, limits)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Name the file is stored under: `needle_break_{epoch_ms}_{name}`.
    pub fn upload_name(&self, epoch_ms: i64) -> String {
        format!("needle_break_{}_{}", epoch_ms, self.name)
    }

    /// Placeholder written to the record when the upload fails.
    pub fn failure_placeholder(&self) -> String {
        format!("Upload failed - {}", self.name)
    }

    pub fn upload_request(&self, epoch_ms: i64) -> BackendRequest {
        BackendRequest::UploadImage {
            file_name: self.upload_name(epoch_ms),
            file_data: STANDARD.encode(&self.bytes),
            mime_type: self.mime_type.clone(),
        }
    }
}

fn mime_from_path(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png".to_string(),
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "gif" => "image/gif".to_string(),
        "webp" => "image/webp".to_string(),
        "" => "application/octet-stream".to_string(),
        other => format!("application/x-{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG fake").unwrap();

        let image = ImageAttachment::read(&path, &AttachmentLimits::default()).await.unwrap();
        assert_eq!(image.name(), "broken.png");
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.size(), 9);
    }

    #[tokio::test]
    async fn rejects_other_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let err = ImageAttachment::read(&path, &AttachmentLimits::default()).await.unwrap_err();
        assert!(matches!(err, AttachmentError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.jpg");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();
        let limits = AttachmentLimits {
            max_bytes: 1024,
            ..AttachmentLimits::default()
        };

        let err = ImageAttachment::read(&path, &limits).await.unwrap_err();
        assert!(matches!(err, AttachmentError::TooLarge { size: 2048, limit: 1024 }));
    }

    #[tokio::test]
    async fn missing_files_are_read_errors() {
        let err = ImageAttachment::read(Path::new("/definitely/not/here.png"), &AttachmentLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AttachmentError::Read { .. }));
    }

    #[test]
    fn upload_request_is_named_and_encoded() {
        let image =
            ImageAttachment::from_bytes("a.jpeg", "image/jpeg", b"hi".to_vec(), &AttachmentLimits::default())
                .unwrap();
        match image.upload_request(1714551300000) {
            BackendRequest::UploadImage {
                file_name,
                file_data,
                mime_type,
            } => {
                assert_eq!(file_name, "needle_break_1714551300000_a.jpeg");
                assert_eq!(file_data, "aGk=");
                assert_eq!(mime_type, "image/jpeg");
            }
            other => panic!("unexpected request {other:?}"),
        }
        assert_eq!(image.failure_placeholder(), "Upload failed - a.jpeg");
    }
}
