//! Image transform engine
//!
//! This module turns request parameters into a validated transform and
//! applies it to raw image bytes:
//! - `resize`: square buckets of 256, 512, 1024 or 2048 pixels
//! - `format`: re-encode as PNG or JPEG (`jpg` is an alias)
//!
//! Nothing here knows about HTTP or storage.

pub mod raster;

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::content_type::ImageKind;
use crate::error::TransformError;

pub use raster::{reformat, resize};

/// Square sizes accepted by `?resize=`
pub const RESIZE_BUCKETS: [u32; 4] = [256, 512, 1024, 2048];

/// Query parameter selecting a resize bucket
pub const RESIZE_PARAM: &str = "resize";

/// Query parameter selecting an output format
pub const FORMAT_PARAM: &str = "format";

/// Encodings the engine can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Parse a `?format=` value
    pub fn parse(value: &str) -> Result<Self, TransformError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            _ => Err(TransformError::InvalidFormat(value.to_string())),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }
}

impl From<ImageKind> for OutputFormat {
    fn from(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Png => OutputFormat::Png,
            ImageKind::Jpeg => OutputFormat::Jpeg,
        }
    }
}

/// Parse a `?resize=` value into a square edge length
pub fn parse_resize(value: &str) -> Result<u32, TransformError> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|size| RESIZE_BUCKETS.contains(size))
        .ok_or_else(|| TransformError::InvalidResize(value.to_string()))
}

/// Raw transform parameters taken from a query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformRequest {
    pub resize: Option<String>,
    pub format: Option<String>,
}

impl TransformRequest {
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        Self {
            resize: query.get(RESIZE_PARAM).cloned(),
            format: query.get(FORMAT_PARAM).cloned(),
        }
    }

    /// Whether any recognized parameter is present
    pub fn is_empty(&self) -> bool {
        self.resize.is_none() && self.format.is_none()
    }

    /// Validate the parameters against the source image
    ///
    /// `resize` wins over `format`; when both are present `format` is
    /// ignored and the source encoding is kept.
    pub fn plan(&self, source: ImageKind) -> Result<Option<Transform>, TransformError> {
        if let Some(resize) = &self.resize {
            let size = parse_resize(resize)?;
            return Ok(Some(Transform::Resize {
                size,
                format: source.into(),
            }));
        }

        if let Some(format) = &self.format {
            return Ok(Some(Transform::Reformat(OutputFormat::parse(format)?)));
        }

        Ok(None)
    }
}

/// A validated transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Resize { size: u32, format: OutputFormat },
    Reformat(OutputFormat),
}

impl Transform {
    /// Run the transform over the source bytes (blocking)
    pub fn apply(self, data: &[u8]) -> Result<Bytes, TransformError> {
        match self {
            Transform::Resize { size, format } => resize(data, format, size, size),
            Transform::Reformat(format) => reformat(data, format),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Resize { size, format } => {
                write!(f, "resize={}x{}.{}", size, size, format.name())
            }
            Transform::Reformat(format) => write!(f, "format={}", format.name()),
        }
    }
}
