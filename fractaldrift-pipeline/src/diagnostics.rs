//! Per-frame diagnostics snapshot.

use crate::governor::GovernorOutput;
use fractaldrift_compute::{PassProgress, PassState, SafetyStats, SafetyVerdict, ZoomMode};
use fractaldrift_core::View;
use serde::Serialize;

/// Everything an overlay might want to show about the pipeline, gathered
/// in one place. Attached to the frame report when enabled in the config.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Diagnostics {
    pub zoom_mode: ZoomMode,
    pub desired_view: View,
    pub smoothed_view: View,
    pub displayed_view: View,

    pub pass_id: u64,
    pub pass_state: PassState,
    pub pass_progress: PassProgress,
    pub pass_view: Option<View>,
    pub pass_max_iterations: Option<u32>,
    /// Whole-pass sample statistics.
    pub pass_stats: SafetyStats,

    pub last_verdict: Option<SafetyVerdict>,
    pub bad_streak: u32,
    pub last_flip_zoom_level: Option<f64>,

    pub governor: GovernorOutput,

    pub cover_factor: f64,
    pub cover_needed_zoom: Option<f64>,
    pub cover_cap_zoom: Option<f64>,

    pub swap_pending: bool,
    pub fade_progress: f64,
    pub front_view: Option<View>,
    pub surface_size: (u32, u32),
}
