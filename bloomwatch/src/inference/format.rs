//! Image format detection from leading magic bytes.

use std::fmt;

/// Image payloads the inference endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Tiff,
    Png,
    Jpeg,
}

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const TIFF_LE_MAGIC: &[u8] = &[b'I', b'I', 0x2A, 0x00];
const TIFF_BE_MAGIC: &[u8] = &[b'M', b'M', 0x00, 0x2A];
// BigTIFF, as written for large GeoTIFF scenes
const BIGTIFF_LE_MAGIC: &[u8] = &[b'I', b'I', 0x2B, 0x00];
const BIGTIFF_BE_MAGIC: &[u8] = &[b'M', b'M', 0x00, 0x2B];

impl ImageFormat {
    /// Detects the format, or `None` for anything unrecognised.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_MAGIC) {
            Some(Self::Png)
        } else if bytes.starts_with(JPEG_MAGIC) {
            Some(Self::Jpeg)
        } else if [TIFF_LE_MAGIC, TIFF_BE_MAGIC, BIGTIFF_LE_MAGIC, BIGTIFF_BE_MAGIC]
            .iter()
            .any(|magic| bytes.starts_with(magic))
        {
            Some(Self::Tiff)
        } else {
            None
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Tiff => "image/tiff",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tiff => "TIFF",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
        };
        write!(f, "{}", name)
    }
}

/// Short human-readable description of an unrecognised payload.
pub(crate) fn describe_unknown(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "empty payload".to_string();
    }
    let head: Vec<String> = bytes.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    format!("unrecognised leading bytes {}", head.join(" "))
}
