//! What one `step` hands back to the host.

use crate::diagnostics::Diagnostics;
use crate::preview::PreviewFrame;
use serde::{Deserialize, Serialize};

/// Audio-derived signals for the coloring stage. Carried through the frame
/// untouched; nothing in the pipeline reads them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSignals {
    /// Pitch detection confidence in [0, 1].
    pub clarity: f32,
    pub beat_envelope: f32,
    /// 0 = C .. 11 = B, when a pitch was detected.
    pub pitch_class: Option<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    /// A computed surface is on screen.
    pub drew: bool,
    /// Tiles done / total of the current or last pass.
    pub progress01: f64,
    pub frame: PreviewFrame,
    pub diagnostics: Option<Diagnostics>,
    pub audio: Option<AudioSignals>,
}
