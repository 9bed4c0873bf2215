//! Content-type resolution for served objects

use mime::Mime;

use crate::storage::{sniff::OCTET_STREAM, ContentTypeHint, StoragePort};

/// Image formats the transform engine accepts as input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

/// The MIME type chosen for a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContentType {
    /// Full value sent in the `Content-Type` header, parameters included
    pub header: String,
    /// Lowercased `type/subtype` with parameters stripped
    pub essence: String,
}

impl ResolvedContentType {
    /// Parse a raw MIME string, falling back to `application/octet-stream`
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<Mime>() {
            Ok(m) => Self {
                header: raw.trim().to_string(),
                essence: m.essence_str().to_ascii_lowercase(),
            },
            Err(_) => Self {
                header: OCTET_STREAM.to_string(),
                essence: OCTET_STREAM.to_string(),
            },
        }
    }

    /// Which transformable image format this is, if any
    pub fn image_kind(&self) -> Option<ImageKind> {
        match self.essence.as_str() {
            "image/png" => Some(ImageKind::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            _ => None,
        }
    }
}

/// Resolve the content type of a payload
///
/// A known hint is trusted as-is; an unresolved hint is replaced by
/// whatever the backend sniffs from the bytes.
pub fn resolve(
    hint: &ContentTypeHint,
    data: &[u8],
    storage: &dyn StoragePort,
) -> ResolvedContentType {
    match hint {
        ContentTypeHint::Known(raw) => ResolvedContentType::parse(raw),
        ContentTypeHint::Unresolved => ResolvedContentType::parse(&storage.sniff_content_type(data)),
    }
}
