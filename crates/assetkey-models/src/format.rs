//! Image format sniffing from magic bytes.
//!
//! Classification only: nothing here decodes image data. Every function is
//! total and returns `None`/`false` for empty, short or unknown input, so
//! it can sit on the fail-fast path in front of an upload.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upper bound on how much of a buffer the markup heuristic looks at.
const MARKUP_SNIFF_WINDOW: usize = 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Ico,
    Tiff,
    Webp,
    Svg,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Ico => "ico",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Webp => "webp",
            ImageFormat::Svg => "svg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Ico => "image/x-icon",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Svg => "image/svg+xml",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Signatures
// ============================================================================

/// A fixed byte pattern at a fixed offset.
struct Signature {
    format: ImageFormat,
    offset: usize,
    bytes: &'static [u8],
}

impl Signature {
    fn min_len(&self) -> usize {
        self.offset + self.bytes.len()
    }

    fn matches(&self, data: &[u8]) -> bool {
        data.len() >= self.min_len() && &data[self.offset..self.min_len()] == self.bytes
    }
}

/// Fixed-pattern signatures, checked in order.
const SIGNATURES: &[Signature] = &[
    Signature {
        format: ImageFormat::Png,
        offset: 0,
        bytes: &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
    },
    Signature {
        format: ImageFormat::Jpeg,
        offset: 0,
        bytes: &[0xFF, 0xD8, 0xFF],
    },
    Signature {
        format: ImageFormat::Gif,
        offset: 0,
        bytes: b"GIF87a",
    },
    Signature {
        format: ImageFormat::Gif,
        offset: 0,
        bytes: b"GIF89a",
    },
    Signature {
        format: ImageFormat::Bmp,
        offset: 0,
        bytes: b"BM",
    },
    Signature {
        format: ImageFormat::Ico,
        offset: 0,
        bytes: &[0x00, 0x00, 0x01, 0x00],
    },
    Signature {
        format: ImageFormat::Tiff,
        offset: 0,
        bytes: b"II*\0",
    },
    Signature {
        format: ImageFormat::Tiff,
        offset: 0,
        bytes: b"MM\0*",
    },
];

/// RIFF container check: the `RIFF` tag, plus `WEBP` at 8..12 when the
/// buffer is long enough to carry it.
fn is_webp(data: &[u8]) -> bool {
    if data.len() < 4 || &data[..4] != b"RIFF" {
        return false;
    }
    if data.len() >= 12 {
        return &data[8..12] == b"WEBP";
    }
    true
}

/// Prefix heuristic for SVG markup; not a parser.
fn is_svg_markup(data: &[u8]) -> bool {
    let window = &data[..data.len().min(MARKUP_SNIFF_WINDOW)];
    let mut rest = window.strip_prefix(UTF8_BOM).unwrap_or(window);
    rest = trim_ascii_start(rest);

    if starts_with_ignore_case(rest, b"<?xml") {
        match find(rest, b"?>") {
            Some(end) => rest = trim_ascii_start(&rest[end + 2..]),
            None => return false,
        }
    }

    if !starts_with_ignore_case(rest, b"<svg") {
        return false;
    }
    match rest.get(4) {
        Some(b) => b.is_ascii_whitespace() || *b == b'>' || *b == b'/',
        None => false,
    }
}

fn trim_ascii_start(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn starts_with_ignore_case(data: &[u8], needle: &[u8]) -> bool {
    data.len() >= needle.len() && data[..needle.len()].eq_ignore_ascii_case(needle)
}

fn find(data: &[u8], needle: &[u8]) -> Option<usize> {
    data.windows(needle.len()).position(|w| w == needle)
}

// ============================================================================
// Public API
// ============================================================================

/// Detect the image format of a buffer from its leading bytes.
pub fn detect_image_format(data: &[u8]) -> Option<ImageFormat> {
    if data.is_empty() {
        return None;
    }

    if let Some(sig) = SIGNATURES.iter().find(|sig| sig.matches(data)) {
        return Some(sig.format);
    }

    if is_webp(data) {
        return Some(ImageFormat::Webp);
    }

    if is_svg_markup(data) {
        return Some(ImageFormat::Svg);
    }

    None
}

/// True if the buffer looks like one of the supported image formats.
pub fn is_supported_image(data: &[u8]) -> bool {
    detect_image_format(data).is_some()
}

/// Total entry point for possibly-absent input.
pub fn classify_buffer_as_image(input: Option<&[u8]>) -> bool {
    input.map(is_supported_image).unwrap_or(false)
}
