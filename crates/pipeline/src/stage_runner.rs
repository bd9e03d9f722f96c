//! Stage function interface contract (PRD-20).
//!
//! Each method is one pipeline stage with its declared inputs and outputs.
//! Implementations are external collaborators (ML inference backends); the
//! executor never inspects their internals, only the returned artifact
//! references and the [`StageError`] classification on failure.

use async_trait::async_trait;

use tryon_core::error::StageError;
use tryon_core::stage::MaskSet;
use tryon_core::types::ArtifactRef;

/// The four try-on stage operations.
///
/// All methods may block for a long time and may fail; transient failures
/// are retried by the executor, permanent ones end the task.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Derive person and clothing masks from the model image.
    async fn segment(&self, model_image: &str) -> Result<MaskSet, StageError>;

    /// Produce the composited try-on image from model, garment, and masks.
    async fn synthesize(
        &self,
        model_image: &str,
        garment_image: &str,
        masks: &MaskSet,
    ) -> Result<ArtifactRef, StageError>;

    /// Correct facial artifacts introduced by synthesis.
    ///
    /// Only invoked for tryon mode.
    async fn restore_face(
        &self,
        model_image: &str,
        composite: &str,
    ) -> Result<ArtifactRef, StageError>;

    /// Stamp the output artifact.
    async fn watermark(&self, composite: &str) -> Result<ArtifactRef, StageError>;
}
