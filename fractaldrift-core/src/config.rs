//! Pipeline configuration.
//!
//! Every tunable of the progressive renderer lives here. All structs
//! deserialize with `#[serde(default)]`, so a partial JSON document only
//! overrides the fields it names. Values are clamped by `sanitized()`
//! rather than rejected: a running animation should degrade, not stop.

use crate::error::ConfigError;
use crate::tiles::DEFAULT_SPIRAL_TIGHTNESS;
use crate::View;
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_2;

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn non_negative(value: f64, fallback: f64) -> f64 {
    finite_or(value, fallback).max(0.0)
}

fn fraction(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

/// Escape-time iteration parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscapeConfig {
    /// Iteration budget while the view is still.
    pub max_iterations: u32,
    /// Reduced budget while animating, to protect the frame budget.
    pub animating_max_iterations: u32,
    pub bailout_radius: f64,
    /// Store smooth (fractional) escape times instead of integer ones.
    pub smooth: bool,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 600,
            animating_max_iterations: 250,
            bailout_radius: 256.0,
            smooth: true,
        }
    }
}

/// How far surfaces extend beyond the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverscanMode {
    /// Surfaces match the viewport.
    None,
    /// Square surfaces with side = viewport diagonal, covering any rotation.
    Diagonal,
}

/// Tiled progressive compute settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    pub tile_size: u32,
    pub spiral_tightness: f64,
    /// Per-frame compute budget while animating.
    pub frame_budget_ms: f64,
    /// Per-frame compute budget while still.
    pub still_budget_ms: f64,
    /// Every Nth pixel in each axis feeds Zoom Safety.
    pub safety_sample_stride: u32,
    /// Surface pixels per screen pixel.
    pub render_scale: f64,
    pub overscan: OverscanMode,
    /// Upload the back surface after every budget period, not only when
    /// the pass finishes.
    pub upload_partial: bool,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            tile_size: 16,
            spiral_tightness: DEFAULT_SPIRAL_TIGHTNESS,
            frame_budget_ms: 6.0,
            still_budget_ms: 12.0,
            safety_sample_stride: 4,
            render_scale: 0.5,
            overscan: OverscanMode::Diagonal,
            upload_partial: false,
        }
    }
}

/// View animation and kick throttling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub base_view: View,
    /// Plane units spanned by the shorter viewport side at zoom 1.
    pub base_span: f64,
    /// Change of ln(zoom) per second.
    pub zoom_breath_speed: f64,
    /// Radians per second.
    pub rotation_speed: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Exponential smoothing rate toward the desired view (1/s).
    pub smoothing_rate: f64,
    pub min_update_interval_seconds: f64,
    pub min_pan_pixels: f64,
    pub min_zoom_relative: f64,
    pub min_rotation_radians: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            base_view: View::new(-0.743_643_887_037_151, 0.131_825_904_205_33, 1.0, 0.0),
            base_span: 3.0,
            zoom_breath_speed: 0.18,
            rotation_speed: 0.05,
            min_zoom: 1.0,
            max_zoom: 1.0e12,
            smoothing_rate: 4.0,
            min_update_interval_seconds: 0.25,
            min_pan_pixels: 2.0,
            min_zoom_relative: 0.02,
            min_rotation_radians: 0.01,
        }
    }
}

/// When the soft-trigger bad streak is forgiven.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreakPolicy {
    /// Any good evaluation clears the streak.
    ResetOnGood,
    /// Each good evaluation removes one bad evaluation.
    DecayOnGood,
    /// The streak only counts evaluations inside one compute pass.
    ResetEachPass,
    /// The streak lapses when no bad evaluation happened for `seconds`.
    ExpireAfter { seconds: f64 },
}

/// Zoom Safety thresholds. Fractions are of all samples taken so far in
/// the pass; escape times are normalized to [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomSafetyConfig {
    /// Checkpoint cadence in new samples. Fewer samples yield no decision.
    pub min_samples: u32,
    /// Zoom at which `zoom_level = ln(zoom / baseline)` is zero.
    pub zoom_baseline: f64,
    /// Escape times below this count as fast escapes.
    pub fast_escape_max: f32,
    pub mid_band_low: f32,
    pub mid_band_high: f32,

    pub inside_high: f32,
    pub fast_escape_high: f32,
    /// Hard triggers only fire once zoomed at least this far.
    pub hard_min_zoom_level: f64,

    pub soft_min_zoom_level: f64,
    /// Outside escape-time spread below this looks flat.
    pub soft_range_min: f32,
    pub soft_mid_min: f32,
    pub soft_non_fast_min: f32,
    pub soft_bad_streak_min: u32,
    pub streak_policy: StreakPolicy,

    pub min_switch_delta_z_out: f64,
    pub min_switch_delta_z_in: f64,

    /// Zooming out past this level always recovers (cooldown permitting).
    pub recover_zoom_level: f64,
    /// Statistics-based recovery only happens when no deeper than this.
    pub reenter_max_zoom_level: f64,
    pub recover_inside_max: f32,
    pub recover_fast_max: f32,
    pub recover_range_min: f32,
    pub recover_non_fast_min: f32,
}

impl Default for ZoomSafetyConfig {
    fn default() -> Self {
        Self {
            min_samples: 64,
            zoom_baseline: 1.0,
            fast_escape_max: 0.02,
            mid_band_low: 0.08,
            mid_band_high: 0.9,
            inside_high: 0.9,
            fast_escape_high: 0.95,
            hard_min_zoom_level: 1.0,
            soft_min_zoom_level: 2.0,
            soft_range_min: 0.015,
            soft_mid_min: 0.01,
            soft_non_fast_min: 0.05,
            soft_bad_streak_min: 3,
            streak_policy: StreakPolicy::ResetOnGood,
            min_switch_delta_z_out: 0.5,
            min_switch_delta_z_in: 0.5,
            recover_zoom_level: 0.5,
            reenter_max_zoom_level: 24.0,
            recover_inside_max: 0.5,
            recover_fast_max: 0.6,
            recover_range_min: 0.05,
            recover_non_fast_min: 0.2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    pub fade_seconds: f64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self { fade_seconds: 0.35 }
    }
}

/// Zoom-out rate limiting, in natural-log zoom levels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub max_speed_zoom_levels_per_sec: f64,
    pub max_lag_zoom_levels: f64,
    /// Lifetime of the post-flip settle anchor.
    pub settle_seconds: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_speed_zoom_levels_per_sec: 0.45,
            max_lag_zoom_levels: LN_2,
            settle_seconds: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Extra cover margin while zooming out.
    pub zoom_out_headroom: f64,
    pub max_preview_rot_speed_rad_per_sec: f64,
    /// Require cover for any rotation, not only the current one.
    pub rotation_safe_cover: bool,
    /// Scale used when no finite scale can cover the viewport.
    pub max_cover_scale: f64,
    /// How fast a snapshotted cover floor relaxes, in ln-scale per second.
    pub cover_cap_release_per_sec: f64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            zoom_out_headroom: 1.05,
            max_preview_rot_speed_rad_per_sec: 1.5,
            rotation_safe_cover: false,
            max_cover_scale: 64.0,
            cover_cap_release_per_sec: 0.5,
        }
    }
}

/// Everything the frame loop needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub escape: EscapeConfig,
    pub compute: ComputeConfig,
    pub animation: AnimationConfig,
    pub safety: ZoomSafetyConfig,
    pub swap: SwapConfig,
    pub governor: GovernorConfig,
    pub preview: PreviewConfig,
    /// Attach a diagnostics snapshot to every frame report.
    pub diagnostics: bool,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp every field into its usable range.
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        let mut c = *self;

        c.escape.max_iterations = c.escape.max_iterations.max(1);
        c.escape.animating_max_iterations = c
            .escape
            .animating_max_iterations
            .clamp(1, c.escape.max_iterations);
        c.escape.bailout_radius = finite_or(c.escape.bailout_radius, d.escape.bailout_radius).max(2.0);

        c.compute.tile_size = c.compute.tile_size.max(1);
        c.compute.spiral_tightness = non_negative(c.compute.spiral_tightness, d.compute.spiral_tightness);
        c.compute.frame_budget_ms = non_negative(c.compute.frame_budget_ms, d.compute.frame_budget_ms);
        c.compute.still_budget_ms = non_negative(c.compute.still_budget_ms, d.compute.still_budget_ms);
        c.compute.safety_sample_stride = c.compute.safety_sample_stride.max(1);
        c.compute.render_scale = finite_or(c.compute.render_scale, d.compute.render_scale).clamp(0.05, 4.0);

        let a = &mut c.animation;
        a.base_view = a.base_view.sanitized();
        a.base_span = finite_or(a.base_span, d.animation.base_span).max(f64::MIN_POSITIVE);
        a.zoom_breath_speed = non_negative(a.zoom_breath_speed, d.animation.zoom_breath_speed);
        a.rotation_speed = finite_or(a.rotation_speed, d.animation.rotation_speed);
        a.min_zoom = finite_or(a.min_zoom, 1.0).max(1.0);
        a.max_zoom = finite_or(a.max_zoom, d.animation.max_zoom).max(a.min_zoom);
        a.smoothing_rate = non_negative(a.smoothing_rate, d.animation.smoothing_rate);
        a.min_update_interval_seconds =
            non_negative(a.min_update_interval_seconds, d.animation.min_update_interval_seconds);
        a.min_pan_pixels = non_negative(a.min_pan_pixels, d.animation.min_pan_pixels);
        a.min_zoom_relative = non_negative(a.min_zoom_relative, d.animation.min_zoom_relative);
        a.min_rotation_radians = non_negative(a.min_rotation_radians, d.animation.min_rotation_radians);

        let s = &mut c.safety;
        s.min_samples = s.min_samples.max(1);
        s.zoom_baseline = finite_or(s.zoom_baseline, 1.0).max(f64::MIN_POSITIVE);
        s.fast_escape_max = fraction(s.fast_escape_max, d.safety.fast_escape_max);
        s.mid_band_low = fraction(s.mid_band_low, d.safety.mid_band_low);
        s.mid_band_high = fraction(s.mid_band_high, d.safety.mid_band_high).max(s.mid_band_low);
        s.inside_high = fraction(s.inside_high, d.safety.inside_high);
        s.fast_escape_high = fraction(s.fast_escape_high, d.safety.fast_escape_high);
        s.hard_min_zoom_level = finite_or(s.hard_min_zoom_level, d.safety.hard_min_zoom_level);
        s.soft_min_zoom_level = finite_or(s.soft_min_zoom_level, d.safety.soft_min_zoom_level);
        s.soft_range_min = fraction(s.soft_range_min, d.safety.soft_range_min);
        s.soft_mid_min = fraction(s.soft_mid_min, d.safety.soft_mid_min);
        s.soft_non_fast_min = fraction(s.soft_non_fast_min, d.safety.soft_non_fast_min);
        s.min_switch_delta_z_out = non_negative(s.min_switch_delta_z_out, d.safety.min_switch_delta_z_out);
        s.min_switch_delta_z_in = non_negative(s.min_switch_delta_z_in, d.safety.min_switch_delta_z_in);
        s.recover_zoom_level = finite_or(s.recover_zoom_level, d.safety.recover_zoom_level);
        s.reenter_max_zoom_level =
            finite_or(s.reenter_max_zoom_level, d.safety.reenter_max_zoom_level).max(s.recover_zoom_level);
        s.recover_inside_max = fraction(s.recover_inside_max, d.safety.recover_inside_max);
        s.recover_fast_max = fraction(s.recover_fast_max, d.safety.recover_fast_max);
        s.recover_range_min = fraction(s.recover_range_min, d.safety.recover_range_min);
        s.recover_non_fast_min = fraction(s.recover_non_fast_min, d.safety.recover_non_fast_min);
        if let StreakPolicy::ExpireAfter { seconds } = s.streak_policy {
            s.streak_policy = StreakPolicy::ExpireAfter {
                seconds: non_negative(seconds, 1.0),
            };
        }

        c.swap.fade_seconds = non_negative(c.swap.fade_seconds, d.swap.fade_seconds);

        let g = &mut c.governor;
        g.max_speed_zoom_levels_per_sec =
            non_negative(g.max_speed_zoom_levels_per_sec, d.governor.max_speed_zoom_levels_per_sec);
        g.max_lag_zoom_levels = non_negative(g.max_lag_zoom_levels, d.governor.max_lag_zoom_levels);
        g.settle_seconds = non_negative(g.settle_seconds, d.governor.settle_seconds);

        let p = &mut c.preview;
        p.zoom_out_headroom = finite_or(p.zoom_out_headroom, d.preview.zoom_out_headroom).max(1.0);
        p.max_preview_rot_speed_rad_per_sec = non_negative(
            p.max_preview_rot_speed_rad_per_sec,
            d.preview.max_preview_rot_speed_rad_per_sec,
        );
        p.max_cover_scale = finite_or(p.max_cover_scale, d.preview.max_cover_scale).max(1.0);
        p.cover_cap_release_per_sec =
            non_negative(p.cover_cap_release_per_sec, d.preview.cover_cap_release_per_sec);

        c
    }
}
