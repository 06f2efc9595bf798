//! Core image types: formats, uploaded references and generated results.

use crate::error::{ArchitectError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
    /// GIF format (first frame is what the model sees).
    Gif,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Gif => "gif",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Attempts to detect format from a MIME type.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        // RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        None
    }
}

/// Encodes raw bytes as a `data:` URL.
pub fn to_data_url(mime_type: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

/// Splits a base64 `data:` URL into its MIME type and payload.
///
/// Returns `None` if the string is not a base64 data URL.
pub fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    Some((mime, payload))
}

fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (_, payload) = split_data_url(url)
        .ok_or_else(|| ArchitectError::Decode("not a base64 data URL".into()))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ArchitectError::Decode(e.to_string()))
}

/// A user-supplied image held as a data URL.
///
/// Copies are independent: the upload set, history entries and the product
/// slot each hold their own clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    /// Opaque identifier.
    pub id: String,
    /// `data:<mime>;base64,<payload>` encoding of the image.
    pub data_url: String,
    /// MIME type of the image.
    pub mime_type: String,
}

impl UploadedImage {
    /// Creates an image from raw bytes with a fresh identifier.
    ///
    /// The format is sniffed from magic bytes, falling back to `name`'s
    /// extension when the bytes are not recognized.
    pub fn from_bytes(data: &[u8], name: Option<&str>) -> Result<Self> {
        Self::from_bytes_with_id(new_id(), data, name)
    }

    /// Same as [`UploadedImage::from_bytes`] with an explicit identifier.
    pub fn from_bytes_with_id(id: impl Into<String>, data: &[u8], name: Option<&str>) -> Result<Self> {
        if data.is_empty() {
            return Err(ArchitectError::Decode("image file is empty".into()));
        }

        let format = ImageFormat::from_magic_bytes(data)
            .or_else(|| {
                name.and_then(|n| Path::new(n).extension())
                    .and_then(|e| e.to_str())
                    .and_then(ImageFormat::from_extension)
            })
            .ok_or_else(|| ArchitectError::Decode("unrecognized image format".into()))?;

        let mime_type = format.mime_type().to_string();
        Ok(Self {
            id: id.into(),
            data_url: to_data_url(&mime_type, data),
            mime_type,
        })
    }

    /// Returns the base64 payload of the data URL (the part after the comma).
    pub fn base64_payload(&self) -> &str {
        self.data_url
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or("")
    }

    /// Decodes the image back to raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_data_url(&self.data_url)
    }
}

/// An image produced by a generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Opaque identifier.
    pub id: String,
    /// `data:` URL of the generated image.
    pub url: String,
}

impl GeneratedImage {
    /// Creates a generated image with a fresh identifier.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            url: url.into(),
        }
    }

    /// Returns the MIME type declared by the data URL.
    pub fn mime_type(&self) -> Option<&str> {
        split_data_url(&self.url).map(|(mime, _)| mime)
    }

    /// Returns the format declared by the data URL.
    pub fn format(&self) -> Option<ImageFormat> {
        self.mime_type().and_then(ImageFormat::from_mime_type)
    }

    /// Decodes the image to raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_data_url(&self.url)
    }

    /// Saves the decoded image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.decode()?)?;
        Ok(())
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
