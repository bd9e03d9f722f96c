//! Persisted upload storage (PRD-22).
//!
//! The submission gateway must durably store input artifacts *before* the
//! core records their references. Uploads are sanity-checked by decoding
//! image header dimensions only — never the full pixel data.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageReader;
use uuid::Uuid;

use tryon_core::error::CoreError;
use tryon_core::types::ArtifactRef;

/// Uploads larger than this are rejected outright.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Smallest accepted image edge, in pixels.
const MIN_DIMENSION: u32 = 64;

/// Writes uploaded images into a flat directory and hands back their
/// ownership-stable path references.
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn init(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Validate and persist one uploaded image.
    ///
    /// `role` tags the filename (`model` / `garment`) for operator-friendly
    /// directory listings. Returns the stored artifact reference.
    pub async fn save_image(&self, role: &str, bytes: &[u8]) -> Result<ArtifactRef, CoreError> {
        let (format, (width, height)) = inspect_image(bytes)?;

        let ext = format.extensions_str().first().copied().unwrap_or("img");
        let filename = format!("{}_{role}.{ext}", Uuid::new_v4());
        let path = self.dir.join(&filename);

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to persist upload: {e}")))?;

        tracing::debug!(
            role,
            width,
            height,
            path = %path.display(),
            "Upload stored",
        );
        Ok(path.to_string_lossy().into_owned())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Check size bounds and decode the image header.
///
/// Returns the detected format and `(width, height)`. The pixel data is
/// never decoded.
fn inspect_image(bytes: &[u8]) -> Result<(image::ImageFormat, (u32, u32)), CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::Validation("Uploaded image is empty".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "Uploaded image exceeds the {MAX_UPLOAD_BYTES} byte limit"
        )));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CoreError::Validation(format!("Unreadable image data: {e}")))?;

    let format = reader.format().ok_or_else(|| {
        CoreError::Validation("Unrecognized image format; expected PNG, JPEG, or WebP".to_string())
    })?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CoreError::Validation(format!("Failed to read image dimensions: {e}")))?;

    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(CoreError::Validation(format!(
            "Image is {width}x{height}; both edges must be at least {MIN_DIMENSION}px"
        )));
    }

    Ok((format, (width, height)))
}
