//! Inbound problem images.
//!
//! Only JPEG and PNG are accepted. The format is decided by magic bytes,
//! never by file extension.

use base64::Engine as _;
use std::path::Path;
use thiserror::Error;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Errors loading an image.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported image format (expected JPEG or PNG)")]
    UnsupportedFormat,

    #[error("Image is empty")]
    Empty,
}

/// Accepted image encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    /// Detect the format from leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(JPEG_MAGIC) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(PNG_MAGIC) {
            Some(ImageFormat::Png)
        } else {
            None
        }
    }
}

/// One problem image held in memory.
#[derive(Clone)]
pub struct ImageInput {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl ImageInput {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        let format = ImageFormat::sniff(&bytes).ok_or(ImageError::UnsupportedFormat)?;
        Ok(Self { bytes, format })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Self::from_bytes(bytes)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 of the raw bytes, as inline request data.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

impl std::fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageInput")
            .field("format", &self.format)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// A tiny valid-looking PNG header for tests.
#[cfg(test)]
pub(crate) fn sample_png() -> ImageInput {
    let mut bytes = PNG_MAGIC.to_vec();
    bytes.extend_from_slice(b"\0\0\0\rIHDR");
    ImageInput::from_bytes(bytes).unwrap()
}
