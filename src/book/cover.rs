//! Cover image decoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};

/// Image formats accepted as covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    /// Identify an image from its magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else {
            None
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
        }
    }
}

/// A decoded cover image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    pub data: Vec<u8>,
    pub kind: ImageKind,
}

impl Cover {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let kind = ImageKind::sniff(&data)
            .ok_or_else(|| Error::InvalidInput("unrecognized cover image format".into()))?;
        Ok(Self { data, kind })
    }

    /// Decode a base64 cover, accepting a `data:image/...;base64,` prefix.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let payload = match encoded.split_once(',') {
            Some((_, rest)) => rest,
            None => encoded,
        };
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let data = STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("cover is not valid base64: {e}")))?;
        Self::from_bytes(data)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.kind.media_type(), self.to_base64())
    }
}
