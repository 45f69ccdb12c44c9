//! Time-budgeted, resumable fill of the back surface.
//!
//! A pass computes one view tile by tile in spiral order. `step` runs until
//! the pass finishes or the wall-clock budget runs out, and picks up at the
//! next unfinished tile on the following call. Subsampled escape values
//! accumulate over the whole pass; every `min_samples` new samples the
//! caller sees the pass so far and may abort it (for example when Zoom
//! Safety wants to reverse).

use crate::escape_time::{escape_time, EscapeParams};
use crate::pass_progress::PassProgress;
use crate::zoom_safety::SafetySamples;
use fractaldrift_core::{
    Clock, EscapeSurface, PixelRect, PlaneMapping, PresentSurface, TileGrid, TileScheduler, View,
    ZoomSafetyConfig,
};
use serde::Serialize;
use std::ops::ControlFlow;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    Idle,
    Active,
    Finished,
    Aborted,
}

/// Result of one `step` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome<B> {
    /// No pass in flight.
    Idle,
    /// Budget exhausted; call `step` again next frame.
    Suspended,
    /// Every tile has been computed and the surface uploaded.
    Finished,
    /// A checkpoint callback broke out of the pass.
    Aborted(B),
}

/// What to compute.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassJob {
    pub view: View,
    /// Plane units per surface pixel at zoom 1.
    pub units_per_pixel: f64,
    pub params: EscapeParams,
}

pub struct ComputePass {
    tile_size: u32,
    grid: Option<TileGrid>,
    scheduler: TileScheduler,
    state: PassState,
    next_tile_index: usize,
    job: Option<PassJob>,
    mapping: Option<PlaneMapping>,
    sample_stride: u32,
    safety: ZoomSafetyConfig,
    /// Samples recorded since the last checkpoint.
    unchecked: u32,
    pass_samples: SafetySamples,
    pass_id: u64,
    progress: PassProgress,
}

impl ComputePass {
    pub fn new(tile_size: u32, spiral_tightness: f64, sample_stride: u32, safety: ZoomSafetyConfig) -> Self {
        Self {
            tile_size: tile_size.max(1),
            grid: None,
            scheduler: TileScheduler::new(spiral_tightness),
            state: PassState::Idle,
            next_tile_index: 0,
            job: None,
            mapping: None,
            sample_stride: sample_stride.max(1),
            safety,
            unchecked: 0,
            pass_samples: SafetySamples::default(),
            pass_id: 0,
            progress: PassProgress::default(),
        }
    }

    /// Begin a new pass over `surface`, discarding any pass in flight.
    ///
    /// The surface is reset to the uncomputed sentinel.
    pub fn start<S: PresentSurface>(&mut self, surface: &mut EscapeSurface<S>, job: PassJob) {
        let (width, height) = (surface.width(), surface.height());
        let grid = match self.grid {
            Some(grid) if grid.width == width && grid.height == height => grid,
            _ => {
                let grid = TileGrid::new(width, height, self.tile_size);
                self.grid = Some(grid);
                grid
            }
        };

        let view = job.view.sanitized();
        surface.fill_uncomputed();
        self.mapping = Some(PlaneMapping::new(&view, width, height, job.units_per_pixel));
        self.job = Some(PassJob { view, ..job });
        self.state = PassState::Active;
        self.next_tile_index = 0;
        self.unchecked = 0;
        self.pass_samples.reset();
        self.pass_id += 1;
        self.progress = PassProgress::new(grid.tile_count());

        log::debug!(
            "Pass {} started: {}x{} in {} tiles, zoom {:.3e}, {} iterations",
            self.pass_id,
            width,
            height,
            grid.tile_count(),
            view.zoom,
            job.params.max_iterations
        );
    }

    /// Resume the pass for at most `budget_ms` of wall-clock time.
    ///
    /// The budget is checked after each tile, so every call on an active
    /// pass computes at least one tile. Once `min_samples` new safety
    /// samples have been recorded, `on_checkpoint` receives everything
    /// sampled in this pass so far; returning `Break` aborts the pass.
    pub fn step<S, B, F>(
        &mut self,
        surface: &mut EscapeSurface<S>,
        budget_ms: f64,
        clock: &dyn Clock,
        mut on_checkpoint: F,
    ) -> StepOutcome<B>
    where
        S: PresentSurface,
        F: FnMut(&SafetySamples) -> ControlFlow<B>,
    {
        if self.state != PassState::Active {
            return StepOutcome::Idle;
        }
        let (Some(grid), Some(job), Some(mapping)) = (self.grid, self.job, self.mapping) else {
            self.state = PassState::Idle;
            return StepOutcome::Idle;
        };
        if grid.width != surface.width() || grid.height != surface.height() {
            log::warn!("Surface changed size under an active pass; stopping it");
            self.state = PassState::Idle;
            return StepOutcome::Idle;
        }

        let budget_ms = if budget_ms.is_nan() { 0.0 } else { budget_ms.max(0.0) };
        let start_ms = clock.now_ms();
        let total = grid.tile_count() as usize;
        let min_samples = self.safety.min_samples.max(1);

        let outcome = loop {
            if self.next_tile_index >= total {
                break StepOutcome::Finished;
            }

            let tile_index = self.scheduler.order(grid.tiles_w, grid.tiles_h)[self.next_tile_index];
            self.compute_tile(surface, grid.tile_rect(tile_index), &mapping, &job.params);
            self.next_tile_index += 1;
            self.progress.completed_tiles = self.next_tile_index as u32;

            if self.unchecked >= min_samples {
                self.unchecked = 0;
                if let ControlFlow::Break(b) = on_checkpoint(&self.pass_samples) {
                    break StepOutcome::Aborted(b);
                }
            }

            if self.next_tile_index >= total {
                break StepOutcome::Finished;
            }
            if clock.now_ms() - start_ms >= budget_ms {
                break StepOutcome::Suspended;
            }
        };

        self.progress.elapsed_ms += clock.now_ms() - start_ms;

        match outcome {
            StepOutcome::Finished => {
                self.state = PassState::Finished;
                self.progress.is_complete = true;
                surface.upload();
                log::debug!(
                    "Pass {} finished in {:.1}ms",
                    self.pass_id,
                    self.progress.elapsed_ms
                );
            }
            StepOutcome::Aborted(_) => {
                self.state = PassState::Aborted;
                log::debug!(
                    "Pass {} aborted at {}/{} tiles",
                    self.pass_id,
                    self.next_tile_index,
                    total
                );
            }
            StepOutcome::Suspended | StepOutcome::Idle => {}
        }

        outcome
    }

    fn compute_tile<S: PresentSurface>(
        &mut self,
        surface: &mut EscapeSurface<S>,
        rect: PixelRect,
        mapping: &PlaneMapping,
        params: &EscapeParams,
    ) {
        let stride = self.sample_stride;
        for py in rect.y..rect.bottom() {
            let sample_row = py % stride == 0;
            for px in rect.x..rect.right() {
                let (cx, cy) = mapping.pixel_to_plane(px, py);
                let value = escape_time(cx, cy, params);
                surface.set(px, py, value);
                if sample_row && px % stride == 0 {
                    self.pass_samples.record(value, &self.safety);
                    self.unchecked += 1;
                }
            }
        }
    }

    /// Halt the pass. Tiles already written stay until the next pass
    /// overwrites them.
    pub fn stop(&mut self) {
        if self.state == PassState::Active {
            log::debug!("Pass {} stopped", self.pass_id);
        }
        self.state = PassState::Idle;
        self.unchecked = 0;
    }

    /// Forget the grid and tile order (after a surface reallocation).
    pub fn reset(&mut self) {
        self.stop();
        self.grid = None;
        self.job = None;
        self.mapping = None;
        self.scheduler.reset();
        self.progress = PassProgress::default();
    }

    pub fn set_safety_config(&mut self, safety: ZoomSafetyConfig) {
        self.safety = safety;
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == PassState::Active
    }

    pub fn is_finished(&self) -> bool {
        self.state == PassState::Finished
    }

    /// Tiles done / total tiles of the current (or last) pass.
    pub fn progress01(&self) -> f64 {
        self.progress.fraction()
    }

    pub fn progress(&self) -> PassProgress {
        self.progress
    }

    pub fn next_tile_index(&self) -> usize {
        self.next_tile_index
    }

    pub fn pass_id(&self) -> u64 {
        self.pass_id
    }

    /// The job of the current (or last) pass.
    pub fn job(&self) -> Option<&PassJob> {
        self.job.as_ref()
    }

    /// All samples taken in the current (or last) pass.
    pub fn pass_samples(&self) -> &SafetySamples {
        &self.pass_samples
    }

    pub fn grid(&self) -> Option<&TileGrid> {
        self.grid.as_ref()
    }
}
