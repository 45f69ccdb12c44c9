//! View Animator: integrates the desired view and throttles recomputes.

use fractaldrift_compute::ZoomMode;
use fractaldrift_core::{shortest_angle_delta, wrap_angle, AnimationConfig, View};
use serde::Serialize;

/// Long-lived animation state. `step` is pure: it returns the next state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimatorState {
    /// Animation time, frozen while paused.
    pub elapsed_seconds: f64,
    /// ln(zoom) of the desired view.
    pub log_zoom: f64,
    smoothed: Option<SmoothedView>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct SmoothedView {
    center_x: f64,
    center_y: f64,
    log_zoom: f64,
    /// Kept in (-PI, PI].
    rotation: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimatorInput {
    pub dt: f64,
    pub mode: ZoomMode,
    pub paused: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AnimatorOutput {
    pub desired: View,
    pub smoothed: View,
}

impl AnimatorState {
    pub fn new(config: &AnimationConfig) -> Self {
        let zoom = config.base_view.zoom.clamp(config.min_zoom, config.max_zoom);
        Self {
            elapsed_seconds: 0.0,
            log_zoom: zoom.ln(),
            smoothed: None,
        }
    }

    pub fn step(&self, input: &AnimatorInput, config: &AnimationConfig) -> (Self, AnimatorOutput) {
        let dt = if input.dt.is_finite() { input.dt.max(0.0) } else { 0.0 };
        let mut next = *self;

        if !input.paused {
            next.elapsed_seconds += dt;
            let direction = match input.mode {
                ZoomMode::In => 1.0,
                ZoomMode::Out => -1.0,
            };
            next.log_zoom += direction * config.zoom_breath_speed * dt;
        }
        next.log_zoom = next
            .log_zoom
            .clamp(config.min_zoom.ln(), config.max_zoom.ln());

        let base = config.base_view;
        let desired = View::new(
            base.center_x,
            base.center_y,
            next.log_zoom.exp(),
            wrap_angle(base.rotation + config.rotation_speed * next.elapsed_seconds),
        );

        let smoothed = match self.smoothed {
            None => SmoothedView {
                center_x: desired.center_x,
                center_y: desired.center_y,
                log_zoom: next.log_zoom,
                rotation: desired.rotation,
            },
            Some(prev) => {
                let alpha = 1.0 - (-config.smoothing_rate * dt).exp();
                SmoothedView {
                    center_x: prev.center_x + (desired.center_x - prev.center_x) * alpha,
                    center_y: prev.center_y + (desired.center_y - prev.center_y) * alpha,
                    log_zoom: prev.log_zoom + (next.log_zoom - prev.log_zoom) * alpha,
                    rotation: wrap_angle(
                        prev.rotation + shortest_angle_delta(prev.rotation, desired.rotation) * alpha,
                    ),
                }
            }
        };
        next.smoothed = Some(smoothed);

        let output = AnimatorOutput {
            desired,
            smoothed: View::new(
                smoothed.center_x,
                smoothed.center_y,
                smoothed.log_zoom.exp().max(1.0),
                smoothed.rotation,
            ),
        };
        (next, output)
    }

    /// Move the desired and smoothed zoom to `zoom` without a transition.
    ///
    /// Used when the displayed zoom has been held back and the animation
    /// must continue from what is on screen.
    pub fn rebase_zoom(&mut self, zoom: f64, config: &AnimationConfig) {
        if !zoom.is_finite() || zoom <= 0.0 {
            return;
        }
        let log_zoom = zoom.clamp(config.min_zoom, config.max_zoom).ln();
        self.log_zoom = log_zoom;
        if let Some(smoothed) = self.smoothed.as_mut() {
            smoothed.log_zoom = log_zoom;
        }
    }
}

/// What `should_kick_render` compares.
#[derive(Clone, Copy, Debug)]
pub struct KickInput {
    pub now_seconds: f64,
    pub swap_pending: bool,
    pub compute_in_flight: bool,
    pub last_kick_seconds: Option<f64>,
    /// View of the most recently started pass.
    pub last_computed: Option<View>,
    pub desired: View,
    pub viewport: (u32, u32),
}

/// Whether the view has drifted far enough, for long enough, to justify a
/// new full-surface pass.
pub fn should_kick_render(input: &KickInput, config: &AnimationConfig) -> bool {
    if input.swap_pending || input.compute_in_flight {
        return false;
    }
    if let Some(last) = input.last_kick_seconds {
        if input.now_seconds - last < config.min_update_interval_seconds {
            return false;
        }
    }
    let Some(last) = input.last_computed else {
        return true;
    };

    let (width, height) = input.viewport;
    let pixels_per_unit = input.desired.pixels_per_unit(width, height, config.base_span);
    let pan = (input.desired.center_x - last.center_x).hypot(input.desired.center_y - last.center_y);
    if pan * pixels_per_unit >= config.min_pan_pixels {
        return true;
    }

    let zoom_relative = (input.desired.zoom / last.zoom.max(f64::MIN_POSITIVE) - 1.0).abs();
    if zoom_relative >= config.min_zoom_relative {
        return true;
    }

    shortest_angle_delta(last.rotation, input.desired.rotation).abs() >= config.min_rotation_radians
}
