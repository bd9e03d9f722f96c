//! Placeholder stage runner.
//!
//! Derives deterministic artifact references from its inputs without doing
//! any image work. This is the integration point for the real inference
//! backends (segmentation, try-on synthesis, face restoration,
//! watermarking); wiring those in replaces this type and nothing else.

use async_trait::async_trait;

use tryon_core::error::StageError;
use tryon_core::stage::MaskSet;
use tryon_core::types::ArtifactRef;

use crate::stage_runner::StageRunner;

/// Stage runner that fabricates artifact paths and always succeeds.
#[derive(Debug, Default, Clone)]
pub struct StubRunner;

/// Swap an upload path into the results namespace with a new suffix.
///
/// `uploads/abc_model.jpg` + `"composite"` -> `results/abc_model.composite.jpg`.
fn derive_ref(source: &str, suffix: &str) -> ArtifactRef {
    let name = source.rsplit('/').next().unwrap_or(source);
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    format!("results/{stem}.{suffix}.jpg")
}

#[async_trait]
impl StageRunner for StubRunner {
    async fn segment(&self, model_image: &str) -> Result<MaskSet, StageError> {
        Ok(MaskSet {
            person_mask: derive_ref(model_image, "person_mask"),
            clothing_mask: derive_ref(model_image, "clothing_mask"),
        })
    }

    async fn synthesize(
        &self,
        _model_image: &str,
        garment_image: &str,
        _masks: &MaskSet,
    ) -> Result<ArtifactRef, StageError> {
        Ok(derive_ref(garment_image, "composite"))
    }

    async fn restore_face(
        &self,
        _model_image: &str,
        composite: &str,
    ) -> Result<ArtifactRef, StageError> {
        Ok(derive_ref(composite, "restored"))
    }

    async fn watermark(&self, composite: &str) -> Result<ArtifactRef, StageError> {
        Ok(derive_ref(composite, "output"))
    }
}
