//! Progressive compute, safety-gated zoom and crossfaded presentation of an
//! animated Mandelbrot view.

pub mod animator;
pub mod diagnostics;
pub mod drift;
pub mod frame;
pub mod governor;
pub mod preview;
pub mod swap;

pub use animator::{should_kick_render, AnimatorInput, AnimatorOutput, AnimatorState, KickInput};
pub use diagnostics::Diagnostics;
pub use drift::{surface_dimensions, FractalDrift};
pub use frame::{AudioSignals, FrameReport};
pub use governor::{Anchor, AnchorSource, GovernorInput, GovernorOutput, GovernorState};
pub use preview::{cover_scale, PreviewFrame, PreviewInput, PreviewState, SpriteTransform};
pub use swap::{Crossfader, SwapBegin, SwapController, SwapFinalize};

pub use fractaldrift_compute::ZoomMode;
pub use fractaldrift_core::{PipelineConfig, View};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Route `log` output to the browser console and panics to `console.error`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn init_browser_logging() {
    console_error_panic_hook::set_once();
    _ = console_log::init_with_level(log::Level::Debug);
}
