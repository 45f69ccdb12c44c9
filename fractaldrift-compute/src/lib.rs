pub mod compute_pass;
pub mod escape_time;
pub mod pass_progress;
pub mod zoom_safety;

pub use compute_pass::{ComputePass, PassJob, PassState, StepOutcome};
pub use escape_time::{escape_time, EscapeParams};
pub use pass_progress::PassProgress;
pub use zoom_safety::{
    SafetyDecision, SafetyInput, SafetyReason, SafetySamples, SafetyStats, SafetyVerdict,
    ZoomMode, ZoomSafetyState,
};
