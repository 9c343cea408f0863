use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{AppError, AppResult};
use crate::validation::AVATAR_MAX_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Sniff the format from magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    pub fn subtype(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

/// Validate an uploaded avatar and encode it as a `data:` URI.
pub fn to_data_uri(bytes: &[u8]) -> AppResult<String> {
    if bytes.len() > AVATAR_MAX_BYTES {
        return Err(AppError::PayloadTooLarge("Avatar must be <= 2 MB.".into()));
    }
    let format = ImageFormat::detect(bytes).ok_or_else(|| {
        AppError::UnsupportedMediaType("Only JPEG, PNG, GIF, WEBP allowed.".into())
    })?;
    Ok(format!(
        "data:image/{};base64,{}",
        format.subtype(),
        STANDARD.encode(bytes)
    ))
}
