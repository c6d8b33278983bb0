//! Capture sources: chosen files and camera snapshots.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat};
use tracing::debug;

use safewatch_models::{MediaAsset, MediaKind};

use crate::error::{CaptureError, CaptureResult};
use crate::registry::DisplayUrlRegistry;

/// Filename given to camera snapshots.
pub const SNAPSHOT_FILENAME: &str = "webcam_capture.jpg";
/// JPEG quality for camera snapshots.
pub const SNAPSHOT_QUALITY: u8 = 92;

/// A still-frame source.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Grab one frame. `Ok(None)` means the camera answered without a frame.
    async fn snapshot(&self) -> CaptureResult<Option<DynamicImage>>;
}

/// Camera backed by a frame file that an external grabber keeps updating.
#[derive(Debug, Clone)]
pub struct FrameFileCamera {
    path: PathBuf,
}

impl FrameFileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Camera for FrameFileCamera {
    async fn snapshot(&self) -> CaptureResult<Option<DynamicImage>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CaptureError::camera_unavailable(format!(
                    "no frame source at {}",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.is_empty() {
            return Ok(None);
        }

        Ok(Some(image::load_from_memory(&bytes)?))
    }
}

/// Media obtained from a capture source, before it has a display URL.
#[derive(Debug, Clone)]
pub struct CapturedMedia {
    pub filename: String,
    pub mime: String,
    pub kind: MediaKind,
    pub data: Arc<[u8]>,
}

impl CapturedMedia {
    /// Accept a chosen file if its MIME type is image/* or video/*.
    pub fn from_file(
        filename: impl Into<String>,
        mime: impl Into<String>,
        data: Vec<u8>,
    ) -> CaptureResult<Self> {
        let filename = filename.into();
        let mime = mime.into();

        let kind = MediaKind::from_mime(&mime).ok_or_else(|| CaptureError::unsupported(&mime))?;
        if data.is_empty() {
            return Err(CaptureError::EmptyFile(filename));
        }

        Ok(Self {
            filename,
            mime,
            kind,
            data: Arc::from(data),
        })
    }

    /// Load a file from disk, inferring the MIME type from its extension.
    pub async fn from_path(path: &Path) -> CaptureResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let mime = MediaKind::mime_for_extension(extension)
            .ok_or_else(|| CaptureError::unsupported(format!("extension '{}'", extension)))?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let data = tokio::fs::read(path).await?;
        debug!(path = %path.display(), mime, bytes = data.len(), "Loaded media file");

        Self::from_file(filename, mime, data)
    }

    /// Take a camera snapshot and re-encode it as JPEG.
    pub async fn from_camera(camera: &dyn Camera) -> CaptureResult<Self> {
        let frame = camera.snapshot().await?.ok_or(CaptureError::NoFrame)?;
        let data = encode_jpeg(&frame)?;
        debug!(
            width = frame.width(),
            height = frame.height(),
            bytes = data.len(),
            "Captured camera snapshot"
        );

        Ok(Self {
            filename: SNAPSHOT_FILENAME.to_string(),
            mime: "image/jpeg".to_string(),
            kind: MediaKind::Image,
            data: Arc::from(data),
        })
    }

    /// Allocate a preview URL and turn this into a [`MediaAsset`].
    pub fn into_asset(self, registry: &DisplayUrlRegistry) -> MediaAsset {
        let display_url = registry.allocate(Arc::clone(&self.data), &self.mime);
        MediaAsset {
            filename: self.filename,
            mime: self.mime,
            kind: self.kind,
            data: self.data,
            display_url,
        }
    }
}

fn encode_jpeg(frame: &DynamicImage) -> CaptureResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(frame.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, ImageOutputFormat::Jpeg(SNAPSHOT_QUALITY))?;
    Ok(buf.into_inner())
}
