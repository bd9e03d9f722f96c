//! Pipeline stage identity and mode-dependent sequencing (PRD-20).
//!
//! The stage *implementations* are external collaborators behind the
//! `StageRunner` trait in `tryon-pipeline`; this module only knows which
//! stages exist and in what order they run for a given mode.

use serde::{Deserialize, Serialize};

use crate::types::ArtifactRef;

/// Processing mode requested at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TryonMode {
    /// Full try-on: the composited face is restored after synthesis.
    Tryon,
    /// Garment swap only: no face restoration pass.
    SwapOnly,
}

impl TryonMode {
    /// String representation for snapshots and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TryonMode::Tryon => "tryon",
            TryonMode::SwapOnly => "swap_only",
        }
    }

    /// Parse a mode from its submission form value.
    ///
    /// Accepts the original API's `"tryon"` / `"swap-only"` spellings as
    /// well as the snake_case form used in snapshots.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tryon" => Some(TryonMode::Tryon),
            "swap-only" | "swap_only" => Some(TryonMode::SwapOnly),
            _ => None,
        }
    }
}

/// One stage of the try-on pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Derive person and clothing masks from the model image.
    Segment,
    /// Composite the garment onto the model using the masks.
    Synthesize,
    /// Correct facial artifacts introduced by synthesis (tryon mode only).
    RestoreFace,
    /// Stamp the output artifact.
    Watermark,
}

/// Stage order for full try-on mode.
const SEQUENCE_TRYON: &[Stage] = &[
    Stage::Segment,
    Stage::Synthesize,
    Stage::RestoreFace,
    Stage::Watermark,
];

/// Stage order for swap-only mode: face restoration is skipped entirely.
const SEQUENCE_SWAP_ONLY: &[Stage] = &[Stage::Segment, Stage::Synthesize, Stage::Watermark];

impl Stage {
    /// Human-readable stage name for logs and structured errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Segment => "segment",
            Stage::Synthesize => "synthesize",
            Stage::RestoreFace => "restore_face",
            Stage::Watermark => "watermark",
        }
    }

    /// The ordered stage sequence for a mode.
    pub fn sequence_for(mode: TryonMode) -> &'static [Stage] {
        match mode {
            TryonMode::Tryon => SEQUENCE_TRYON,
            TryonMode::SwapOnly => SEQUENCE_SWAP_ONLY,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage artifacts
// ---------------------------------------------------------------------------

/// Masks produced by the segment stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskSet {
    pub person_mask: ArtifactRef,
    pub clothing_mask: ArtifactRef,
}

/// Outputs accumulated as the pipeline advances, persisted after every
/// stage so a retried task resumes with its predecessors' outputs intact.
///
/// Each stage reads only the declared outputs of its predecessor: segment
/// fills `masks`, synthesize and restore-face write `composite`, watermark
/// writes `output`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageArtifacts {
    pub masks: Option<MaskSet>,
    pub composite: Option<ArtifactRef>,
    pub output: Option<ArtifactRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tryon_runs_all_four_stages() {
        assert_eq!(
            Stage::sequence_for(TryonMode::Tryon),
            &[
                Stage::Segment,
                Stage::Synthesize,
                Stage::RestoreFace,
                Stage::Watermark,
            ]
        );
    }

    #[test]
    fn swap_only_skips_restore_face() {
        let seq = Stage::sequence_for(TryonMode::SwapOnly);
        assert_eq!(seq.len(), 3);
        assert!(!seq.contains(&Stage::RestoreFace));
    }

    #[test]
    fn watermark_is_always_last() {
        for mode in [TryonMode::Tryon, TryonMode::SwapOnly] {
            assert_eq!(Stage::sequence_for(mode).last(), Some(&Stage::Watermark));
        }
    }

    #[test]
    fn segment_is_always_first() {
        for mode in [TryonMode::Tryon, TryonMode::SwapOnly] {
            assert_eq!(Stage::sequence_for(mode).first(), Some(&Stage::Segment));
        }
    }

    #[test]
    fn mode_parse_accepts_both_spellings() {
        assert_eq!(TryonMode::parse("tryon"), Some(TryonMode::Tryon));
        assert_eq!(TryonMode::parse("swap-only"), Some(TryonMode::SwapOnly));
        assert_eq!(TryonMode::parse("swap_only"), Some(TryonMode::SwapOnly));
        assert_eq!(TryonMode::parse("video"), None);
    }

    #[test]
    fn mode_as_str_round_trips() {
        for mode in [TryonMode::Tryon, TryonMode::SwapOnly] {
            assert_eq!(TryonMode::parse(mode.as_str()), Some(mode));
        }
    }
}
