//! Media assets and display URLs.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Prefix of display URLs allocated locally for previews and binary results.
pub const LOCAL_URL_PREFIX: &str = "blob:safewatch/";

/// Media classification derived from a MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a MIME type. Anything outside `image/*` and `video/*` is `None`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        let (top, sub) = essence.split_once('/')?;
        if sub.trim().is_empty() {
            return None;
        }

        match top.to_ascii_lowercase().as_str() {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// MIME type for a file extension, if it is a supported image or video format.
    pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
        let mime = match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "bmp" => "image/bmp",
            "gif" => "image/gif",
            "mp4" => "video/mp4",
            "mov" => "video/quicktime",
            "webm" => "video/webm",
            "avi" => "video/x-msvideo",
            "mkv" => "video/x-matroska",
            _ => return None,
        };
        Some(mime)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A URL the UI can render media from.
///
/// Either a locally allocated handle (see [`LOCAL_URL_PREFIX`]) that must be
/// released by its owner, or a remote URL served by the inference backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayUrl(String);

impl DisplayUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for handles allocated by the local registry.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_URL_PREFIX)
    }
}

impl fmt::Display for DisplayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A captured or chosen media blob plus its preview URL.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    /// Human-readable filename sent with the upload
    pub filename: String,
    /// Full MIME type (e.g. `image/jpeg`)
    pub mime: String,
    /// Image or video
    pub kind: MediaKind,
    /// Raw bytes, shared between the preview and the upload
    pub data: Arc<[u8]>,
    /// Preview URL owned by the flow that captured it
    pub display_url: DisplayUrl,
}

impl MediaAsset {
    pub fn is_video(&self) -> bool {
        self.kind.is_video()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
