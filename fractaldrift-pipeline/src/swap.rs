//! Swap Controller: hands finished back surfaces to the display.

use fractaldrift_core::{EscapeSurface, PresentSurface, SurfacePair, View};
use serde::Serialize;

/// Time-bounded alpha ramp from 0 to 1.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Crossfader {
    duration_seconds: f64,
    progress: f64,
    active: bool,
}

impl Crossfader {
    pub fn new(duration_seconds: f64) -> Self {
        Self {
            duration_seconds: duration_seconds.max(0.0),
            progress: 0.0,
            active: false,
        }
    }

    pub fn start(&mut self) {
        self.progress = 0.0;
        self.active = true;
    }

    /// Advance by `dt` seconds. Zero duration completes on the first call.
    pub fn advance(&mut self, dt: f64) -> f64 {
        if !self.active {
            return self.progress;
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.progress = if self.duration_seconds <= 0.0 {
            1.0
        } else {
            (self.progress + dt / self.duration_seconds).min(1.0)
        };
        self.progress
    }

    pub fn finish(&mut self) {
        self.active = false;
        self.progress = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn set_duration(&mut self, duration_seconds: f64) {
        self.duration_seconds = duration_seconds.max(0.0);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapBegin {
    /// Nothing was on screen yet; swapped without a fade.
    Immediate,
    FadeStarted,
    /// A swap is already pending.
    NoOp,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapFinalize {
    /// No swap pending.
    Idle,
    NotReady { progress: f64 },
    /// The back surface is now the front and shows `view`.
    Committed { view: View },
}

/// Owns the front/back surface pair and the crossfade between them.
pub struct SwapController<S: PresentSurface> {
    pair: SurfacePair<S>,
    fader: Crossfader,
    front_view: Option<View>,
    pending_view: Option<View>,
}

impl<S: PresentSurface> SwapController<S> {
    pub fn new(pair: SurfacePair<S>, fade_seconds: f64) -> Self {
        Self {
            pair,
            fader: Crossfader::new(fade_seconds),
            front_view: None,
            pending_view: None,
        }
    }

    /// True once a completed frame has been shown.
    pub fn front_ready(&self) -> bool {
        self.front_view.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending_view.is_some()
    }

    /// The view the front surface was computed for.
    pub fn front_view(&self) -> Option<View> {
        self.front_view
    }

    pub fn pending_view(&self) -> Option<View> {
        self.pending_view
    }

    /// Alpha of the back surface while fading in, else 0.
    pub fn back_alpha(&self) -> f64 {
        if self.is_pending() {
            self.fader.progress()
        } else {
            0.0
        }
    }

    /// Hand `view`'s freshly computed back surface to the display.
    pub fn begin_swap_to_back(&mut self, view: View) -> SwapBegin {
        if !self.front_ready() {
            self.pair.back_mut().upload();
            self.pair.swap();
            self.front_view = Some(view);
            return SwapBegin::Immediate;
        }
        if self.is_pending() || self.fader.is_active() {
            return SwapBegin::NoOp;
        }
        self.pair.back_mut().upload();
        self.pending_view = Some(view);
        self.fader.start();
        SwapBegin::FadeStarted
    }

    /// Advance the fade; swap once it has completed.
    pub fn finalize_swap_if_ready(&mut self, dt: f64) -> SwapFinalize {
        let Some(view) = self.pending_view else {
            return SwapFinalize::Idle;
        };
        let progress = self.fader.advance(dt);
        if progress < 1.0 {
            return SwapFinalize::NotReady { progress };
        }
        self.pair.swap();
        self.fader.finish();
        self.pending_view = None;
        self.front_view = Some(view);
        SwapFinalize::Committed { view }
    }

    /// The back surface, unless it is being faded in.
    pub fn back_for_compute(&mut self) -> Option<&mut EscapeSurface<S>> {
        if self.is_pending() {
            None
        } else {
            Some(self.pair.back_mut())
        }
    }

    pub fn front(&self) -> &EscapeSurface<S> {
        self.pair.front()
    }

    pub fn back(&self) -> &EscapeSurface<S> {
        self.pair.back()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pair.dimensions()
    }

    pub fn set_fade_seconds(&mut self, fade_seconds: f64) {
        self.fader.set_duration(fade_seconds);
    }

    /// Forget what is on screen; the next finished pass swaps immediately.
    pub fn reset(&mut self) {
        self.fader.finish();
        self.pending_view = None;
        self.front_view = None;
    }

    pub fn into_pair(self) -> SurfacePair<S> {
        self.pair
    }
}
