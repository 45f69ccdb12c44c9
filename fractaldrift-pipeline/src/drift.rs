//! The per-frame orchestrator.
//!
//! One `step` runs View Animator, Compute Pass (with Zoom Safety attached
//! to its checkpoints), Swap Controller, Zoom-Out Governor and Preview
//! Transform, in that order.

use crate::animator::{should_kick_render, AnimatorInput, AnimatorOutput, AnimatorState, KickInput};
use crate::diagnostics::Diagnostics;
use crate::frame::{AudioSignals, FrameReport};
use crate::governor::{GovernorInput, GovernorOutput, GovernorState};
use crate::preview::{PreviewFrame, PreviewInput, PreviewState};
use crate::swap::{SwapBegin, SwapController, SwapFinalize};
use fractaldrift_compute::{
    ComputePass, EscapeParams, PassJob, SafetyDecision, SafetyInput, SafetyVerdict, StepOutcome,
    ZoomMode, ZoomSafetyState,
};
use fractaldrift_core::{
    Clock, EscapeSurface, OverscanMode, PipelineConfig, SurfaceAllocator, SurfaceError,
    SurfacePair, SystemClock, View,
};
use std::ops::ControlFlow;

/// Surface size for a viewport at a render scale.
pub fn surface_dimensions(
    viewport: (u32, u32),
    render_scale: f64,
    overscan: OverscanMode,
) -> (u32, u32) {
    let (w, h) = (viewport.0 as f64, viewport.1 as f64);
    let scaled = |v: f64| (v * render_scale).ceil() as u32;
    match overscan {
        OverscanMode::None => (scaled(w), scaled(h)),
        OverscanMode::Diagonal => {
            let side = if viewport.0 == 0 || viewport.1 == 0 {
                0
            } else {
                scaled(w.hypot(h))
            };
            (side, side)
        }
    }
}

/// Things that happened inside the compute stage this frame.
#[derive(Default)]
struct ComputeEvents {
    flipped: Option<SafetyVerdict>,
    finished: bool,
}

pub struct FractalDrift<A: SurfaceAllocator> {
    allocator: A,
    config: PipelineConfig,
    viewport: (u32, u32),
    clock: Box<dyn Clock>,

    swap: SwapController<A::Surface>,
    pass: ComputePass,
    /// Reduced iteration budget was used for the current/last pass.
    pass_reduced: bool,
    refine_pending: bool,
    last_kick_seconds: Option<f64>,
    last_computed_view: Option<View>,

    mode: ZoomMode,
    safety: ZoomSafetyState,
    last_verdict: Option<SafetyVerdict>,

    paused: bool,
    animator: AnimatorState,
    governor: GovernorState,
    preview: PreviewState,
    last_animation: Option<AnimatorOutput>,
    last_governor: Option<GovernorOutput>,
    last_frame: Option<PreviewFrame>,
}

impl<A: SurfaceAllocator> FractalDrift<A> {
    /// Allocate both surfaces for a `width x height` viewport.
    pub fn new(
        mut allocator: A,
        config: PipelineConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, SurfaceError> {
        let config = config.sanitized();
        let viewport = (width, height);
        let (sw, sh) = surface_dimensions(viewport, config.compute.render_scale, config.compute.overscan);
        let pair = SurfacePair::allocate(&mut allocator, sw, sh)?;
        log::info!("Allocated {sw}x{sh} surfaces for {width}x{height} viewport");

        Ok(Self {
            allocator,
            viewport,
            clock: Box::new(SystemClock::new()),
            swap: SwapController::new(pair, config.swap.fade_seconds),
            pass: ComputePass::new(
                config.compute.tile_size,
                config.compute.spiral_tightness,
                config.compute.safety_sample_stride,
                config.safety,
            ),
            pass_reduced: false,
            refine_pending: false,
            last_kick_seconds: None,
            last_computed_view: None,
            mode: ZoomMode::In,
            safety: ZoomSafetyState::new(),
            last_verdict: None,
            paused: false,
            animator: AnimatorState::new(&config.animation),
            governor: GovernorState::new(),
            preview: PreviewState::new(),
            last_animation: None,
            last_governor: None,
            last_frame: None,
            config,
        })
    }

    /// Replace the clock used for compute budgets.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Advance one frame.
    pub fn step(&mut self, dt: f64, now_ms: f64) -> FrameReport {
        self.advance(dt, now_ms, None)
    }

    /// Advance one frame, carrying audio signals through to the report.
    pub fn step_with_audio(&mut self, dt: f64, now_ms: f64, audio: AudioSignals) -> FrameReport {
        self.advance(dt, now_ms, Some(audio))
    }

    fn advance(&mut self, dt: f64, now_ms: f64, audio: Option<AudioSignals>) -> FrameReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let now_seconds = if now_ms.is_finite() { now_ms / 1000.0 } else { 0.0 };
        let animating = !self.paused;

        let (animator, mut animation) = self.animator.step(
            &AnimatorInput {
                dt,
                mode: self.mode,
                paused: self.paused,
            },
            &self.config.animation,
        );
        self.animator = animator;

        let events = self.advance_compute(animation.smoothed, now_seconds, animating);
        let mut snapshot_cover = events.finished;

        if let Some(verdict) = events.flipped {
            let stats = verdict.stats;
            log::debug!(
                "Zoom safety flipped to {} ({:?}) at level {:.2}: inside {:.3}, fast {:.3}, mid {:.3}, range {:.4}",
                self.mode.label(),
                verdict.decision.reason(),
                verdict.zoom_level,
                stats.inside_frac,
                stats.fast_escape_frac,
                stats.mid_frac,
                stats.outside_range
            );
            snapshot_cover = true;
            if self.mode == ZoomMode::In {
                self.resume_from_displayed_zoom(&mut animation);
            }
        }

        if let SwapFinalize::Committed { view } = self.swap.finalize_swap_if_ready(dt) {
            log::debug!("Swap committed at zoom {:.3e}", view.zoom);
            snapshot_cover = true;
        }

        let front_view = self.swap.front_view();
        let (governor, governed) = self.governor.step(
            &GovernorInput {
                mode: self.mode,
                desired_zoom: animation.smoothed.zoom,
                dt,
                now_seconds,
                front_zoom: front_view.map(|v| v.zoom),
                back_ready_zoom: self.swap.pending_view().map(|v| v.zoom),
                compute: if self.pass.is_active() {
                    self.pass.job().map(|job| (job.view.zoom, self.pass.progress01()))
                } else {
                    None
                },
            },
            &self.config.governor,
        );
        self.governor = governor;

        let smoothed = animation.smoothed;
        let (preview, frame) = self.preview.step(
            &PreviewInput {
                viewport: self.viewport,
                surface: self.swap.dimensions(),
                render_scale: self.config.compute.render_scale,
                base_span: self.config.animation.base_span,
                mode: self.mode,
                view: View::new(smoothed.center_x, smoothed.center_y, governed.displayed_zoom, smoothed.rotation),
                front: front_view,
                back: self.swap.pending_view(),
                back_alpha: self.swap.back_alpha(),
                dt,
                snapshot_cover,
            },
            &self.config.preview,
        );
        self.preview = preview;

        self.last_animation = Some(animation);
        self.last_governor = Some(governed);
        self.last_frame = Some(frame);

        FrameReport {
            drew: self.swap.front_ready(),
            progress01: self.pass.progress01(),
            frame,
            diagnostics: self.config.diagnostics.then(|| self.diagnostics(&animation, &governed, &frame)),
            audio,
        }
    }

    /// After a flip back to zoom-in, continue from the zoom on screen
    /// instead of the further-out desired zoom.
    fn resume_from_displayed_zoom(&mut self, animation: &mut AnimatorOutput) {
        let Some(shown) = self.last_frame.map(|f| f.displayed_view.zoom) else {
            return;
        };
        if shown > animation.smoothed.zoom {
            self.animator.rebase_zoom(shown, &self.config.animation);
            animation.desired = animation.desired.with_zoom(shown);
            animation.smoothed = animation.smoothed.with_zoom(shown);
        }
    }

    fn units_per_pixel(&self) -> f64 {
        let short_side = self.viewport.0.min(self.viewport.1).max(1) as f64;
        self.config.animation.base_span / (short_side * self.config.compute.render_scale)
    }

    fn advance_compute(&mut self, view: View, now_seconds: f64, animating: bool) -> ComputeEvents {
        let mut events = ComputeEvents::default();
        let budget_ms = if animating {
            self.config.compute.frame_budget_ms
        } else {
            self.config.compute.still_budget_ms
        };

        if !self.pass.is_active() && !self.swap.is_pending() {
            let refine = !animating && self.refine_pending;
            let kick = refine
                || should_kick_render(
                    &KickInput {
                        now_seconds,
                        swap_pending: false,
                        compute_in_flight: false,
                        last_kick_seconds: self.last_kick_seconds,
                        last_computed: self.last_computed_view,
                        desired: view,
                        viewport: self.viewport,
                    },
                    &self.config.animation,
                );
            if kick {
                self.start_pass(view, now_seconds, animating);
            }
        }

        if !self.pass.is_active() {
            return events;
        }
        let Some(job) = self.pass.job().copied() else {
            return events;
        };
        let Some(back) = self.swap.back_for_compute() else {
            return events;
        };

        let safety_config = self.config.safety;
        let pass_id = self.pass.pass_id();
        let mode = &mut self.mode;
        let safety = &mut self.safety;
        let last_verdict = &mut self.last_verdict;
        let mut flipped = None;

        let outcome = self.pass.step(back, budget_ms, self.clock.as_ref(), |samples| {
            let input = SafetyInput {
                samples,
                current_mode: *mode,
                sampled_zoom: job.view.zoom,
                pass_id,
                now_seconds,
            };
            let (next, verdict) = safety.evaluate(&input, &safety_config);
            *safety = next;
            *last_verdict = Some(verdict);
            match verdict.decision {
                // This view is about to be discarded: stop computing it.
                SafetyDecision::Switch {
                    next_mode: ZoomMode::Out,
                    ..
                } if animating => ControlFlow::Break(verdict),
                SafetyDecision::Switch { next_mode, .. } => {
                    *mode = next_mode;
                    flipped = Some(verdict);
                    ControlFlow::Continue(())
                }
                SafetyDecision::Stay { .. } => ControlFlow::Continue(()),
            }
        });
        events.flipped = flipped;

        match outcome {
            StepOutcome::Aborted(verdict) => {
                self.mode = ZoomMode::Out;
                events.flipped = Some(verdict);
                log::debug!(
                    "Pass {} abandoned at {:.0}% for zoom-out",
                    pass_id,
                    self.pass.progress01() * 100.0
                );
            }
            StepOutcome::Finished => {
                events.finished = true;
                self.refine_pending = self.pass_reduced;
                match self.swap.begin_swap_to_back(job.view) {
                    SwapBegin::Immediate => log::info!("First frame ready at zoom {:.3e}", job.view.zoom),
                    SwapBegin::FadeStarted => {}
                    SwapBegin::NoOp => log::warn!("Finished pass {pass_id} while a swap was pending"),
                }
            }
            StepOutcome::Suspended => {
                if self.config.compute.upload_partial {
                    if let Some(back) = self.swap.back_for_compute() {
                        back.upload();
                    }
                }
            }
            StepOutcome::Idle => {}
        }
        events
    }

    fn start_pass(&mut self, view: View, now_seconds: f64, animating: bool) {
        let job = PassJob {
            view: view.sanitized().with_wrapped_rotation(),
            units_per_pixel: self.units_per_pixel(),
            params: EscapeParams::from_config(&self.config.escape, animating),
        };
        let Some(back) = self.swap.back_for_compute() else {
            return;
        };
        self.pass.start(back, job);
        self.pass_reduced = animating;
        self.refine_pending = false;
        self.last_kick_seconds = Some(now_seconds);
        self.last_computed_view = Some(job.view);
    }

    fn diagnostics(
        &self,
        animation: &AnimatorOutput,
        governed: &GovernorOutput,
        frame: &PreviewFrame,
    ) -> Diagnostics {
        let job = self.pass.job();
        Diagnostics {
            zoom_mode: self.mode,
            desired_view: animation.desired,
            smoothed_view: animation.smoothed,
            displayed_view: frame.displayed_view,
            pass_id: self.pass.pass_id(),
            pass_state: self.pass.state(),
            pass_progress: self.pass.progress(),
            pass_view: job.map(|j| j.view),
            pass_max_iterations: job.map(|j| j.params.max_iterations),
            pass_stats: self.pass.pass_samples().stats(),
            last_verdict: self.last_verdict,
            bad_streak: self.safety.bad_streak,
            last_flip_zoom_level: self.safety.last_flip_zoom_level,
            governor: *governed,
            cover_factor: frame.cover_factor,
            cover_needed_zoom: frame.needed_zoom,
            cover_cap_zoom: frame.cover_cap_zoom,
            swap_pending: self.swap.is_pending(),
            fade_progress: self.swap.back_alpha(),
            front_view: self.swap.front_view(),
            surface_size: self.swap.dimensions(),
        }
    }

    /// Reallocate both surfaces for a new viewport size.
    ///
    /// On failure the previous surfaces stay in place.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        self.reallocate((width, height), self.config.compute.render_scale)
    }

    /// Change surface pixels per screen pixel. Reallocates the surfaces.
    pub fn set_render_scale(&mut self, render_scale: f64) -> Result<(), SurfaceError> {
        let render_scale = if render_scale.is_finite() {
            render_scale.clamp(0.05, 4.0)
        } else {
            self.config.compute.render_scale
        };
        self.reallocate(self.viewport, render_scale)
    }

    /// Replace the configuration while running.
    ///
    /// Changes to the surface layout or the tile pass reallocate the
    /// surfaces and start over from a blank pass; everything else applies
    /// from the next frame. On failure the previous configuration stays.
    pub fn set_config(&mut self, config: PipelineConfig) -> Result<(), SurfaceError> {
        let config = config.sanitized();
        let (old, new) = (&self.config.compute, &config.compute);
        let relayout = old.render_scale != new.render_scale
            || old.overscan != new.overscan
            || old.tile_size != new.tile_size
            || old.spiral_tightness != new.spiral_tightness
            || old.safety_sample_stride != new.safety_sample_stride;

        if relayout {
            let previous = std::mem::replace(&mut self.config, config);
            if let Err(err) = self.reallocate(self.viewport, config.compute.render_scale) {
                self.config = previous;
                return Err(err);
            }
            self.pass = ComputePass::new(
                config.compute.tile_size,
                config.compute.spiral_tightness,
                config.compute.safety_sample_stride,
                config.safety,
            );
        } else {
            self.config = config;
            self.pass.set_safety_config(config.safety);
        }
        self.swap.set_fade_seconds(config.swap.fade_seconds);
        log::info!("Configuration replaced (relayout: {relayout})");
        Ok(())
    }

    fn reallocate(&mut self, viewport: (u32, u32), render_scale: f64) -> Result<(), SurfaceError> {
        let (sw, sh) = surface_dimensions(viewport, render_scale, self.config.compute.overscan);
        let pair = SurfacePair::allocate(&mut self.allocator, sw, sh)?;

        let old = std::mem::replace(
            &mut self.swap,
            SwapController::new(pair, self.config.swap.fade_seconds),
        );
        old.into_pair().destroy();

        self.viewport = viewport;
        self.config.compute.render_scale = render_scale;
        self.pass.reset();
        self.governor = GovernorState::new();
        self.preview = PreviewState::new();
        self.last_kick_seconds = None;
        self.last_computed_view = None;
        self.refine_pending = false;
        self.last_frame = None;

        log::info!(
            "Reallocated {sw}x{sh} surfaces for {}x{} viewport at scale {render_scale}",
            viewport.0,
            viewport.1
        );
        Ok(())
    }

    /// Start the animation over from the base view. Surfaces are kept.
    pub fn restart(&mut self) {
        self.pass.stop();
        self.swap.reset();
        self.animator = AnimatorState::new(&self.config.animation);
        self.mode = ZoomMode::In;
        self.safety = ZoomSafetyState::new();
        self.last_verdict = None;
        self.governor = GovernorState::new();
        self.preview = PreviewState::new();
        self.last_kick_seconds = None;
        self.last_computed_view = None;
        self.refine_pending = false;
        self.last_animation = None;
        self.last_governor = None;
        self.last_frame = None;
        log::info!("Animation restarted");
    }

    /// Halt the pass in flight. Written tiles stay until overwritten.
    pub fn stop(&mut self) {
        self.pass.stop();
    }

    /// Freeze animation time. A still view is recomputed once at the full
    /// iteration budget.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            log::debug!("{}", if paused { "Paused" } else { "Resumed" });
        }
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn smoothed_desired_view(&self) -> View {
        self.last_animation
            .map(|a| a.smoothed)
            .unwrap_or(self.config.animation.base_view)
    }

    pub fn zoom_mode(&self) -> ZoomMode {
        self.mode
    }

    pub fn front_surface(&self) -> &EscapeSurface<A::Surface> {
        self.swap.front()
    }

    pub fn back_surface(&self) -> &EscapeSurface<A::Surface> {
        self.swap.back()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn surface_dimensions(&self) -> (u32, u32) {
        self.swap.dimensions()
    }

    pub fn progress01(&self) -> f64 {
        self.pass.progress01()
    }

    pub fn last_verdict(&self) -> Option<SafetyVerdict> {
        self.last_verdict
    }

    pub fn last_governor_output(&self) -> Option<GovernorOutput> {
        self.last_governor
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_overscan_is_square() {
        assert_eq!(surface_dimensions((800, 600), 0.5, OverscanMode::Diagonal), (500, 500));
        assert_eq!(surface_dimensions((800, 600), 0.5, OverscanMode::None), (400, 300));
    }

    #[test]
    fn partial_pixels_round_up() {
        assert_eq!(surface_dimensions((101, 33), 0.5, OverscanMode::None), (51, 17));
    }

    #[test]
    fn empty_viewport_has_empty_surface() {
        assert_eq!(surface_dimensions((0, 600), 1.0, OverscanMode::Diagonal), (0, 0));
        assert_eq!(surface_dimensions((0, 600), 1.0, OverscanMode::None), (0, 600));
    }
}
