//! Zoom Safety: decides from sampled escape statistics whether the
//! animation may keep zooming in.
//!
//! Zooming into the interior of the set (all inside), or far into the
//! exterior (everything escapes at once, flat colors) produces a boring
//! image. The decision is hysteretic: hard triggers act at once, soft
//! triggers must persist for a streak of evaluations, and every flip must
//! be separated from the previous one by a minimum zoom-level distance.

use fractaldrift_core::{StreakPolicy, ZoomSafetyConfig};
use serde::{Deserialize, Serialize};

/// Direction the view animator is currently zooming.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomMode {
    #[default]
    In,
    Out,
}

impl ZoomMode {
    pub fn opposite(self) -> Self {
        match self {
            Self::In => Self::Out,
            Self::Out => Self::In,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Running counts over the sampled pixels of one pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafetySamples {
    pub total: u32,
    pub inside: u32,
    pub fast_escape: u32,
    pub mid_band: u32,
    pub outside: u32,
    pub outside_min: f32,
    pub outside_max: f32,
}

impl Default for SafetySamples {
    fn default() -> Self {
        Self {
            total: 0,
            inside: 0,
            fast_escape: 0,
            mid_band: 0,
            outside: 0,
            outside_min: f32::INFINITY,
            outside_max: f32::NEG_INFINITY,
        }
    }
}

impl SafetySamples {
    /// Record one normalized escape value (negative = inside the set).
    pub fn record(&mut self, value: f32, config: &ZoomSafetyConfig) {
        self.total += 1;
        if value < 0.0 {
            self.inside += 1;
            return;
        }
        self.outside += 1;
        self.outside_min = self.outside_min.min(value);
        self.outside_max = self.outside_max.max(value);
        if value < config.fast_escape_max {
            self.fast_escape += 1;
        }
        if value >= config.mid_band_low && value <= config.mid_band_high {
            self.mid_band += 1;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn stats(&self) -> SafetyStats {
        let total = self.total.max(1) as f32;
        let outside_range = if self.outside > 0 {
            self.outside_max - self.outside_min
        } else {
            0.0
        };
        let outside_non_fast_frac = if self.outside > 0 {
            (self.outside - self.fast_escape) as f32 / self.outside as f32
        } else {
            0.0
        };
        SafetyStats {
            total_samples: self.total,
            inside_frac: self.inside as f32 / total,
            fast_escape_frac: self.fast_escape as f32 / total,
            mid_frac: self.mid_band as f32 / total,
            outside_range,
            outside_non_fast_frac,
        }
    }
}

/// Derived fractions the decision rules compare against thresholds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SafetyStats {
    pub total_samples: u32,
    pub inside_frac: f32,
    pub fast_escape_frac: f32,
    pub mid_frac: f32,
    /// max - min escape time among outside samples.
    pub outside_range: f32,
    /// Share of outside samples that are not fast escapes.
    pub outside_non_fast_frac: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyReason {
    InsufficientSamples,
    Healthy,
    Cooldown,
    HardInside,
    HardFastEscape,
    SoftFlat,
    SoftPending,
    RecoveredDepth,
    RecoveredStats,
    NotRecovered,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum SafetyDecision {
    Stay { reason: SafetyReason },
    Switch { next_mode: ZoomMode, reason: SafetyReason },
}

impl SafetyDecision {
    pub fn next_mode(&self) -> Option<ZoomMode> {
        match self {
            Self::Switch { next_mode, .. } => Some(*next_mode),
            Self::Stay { .. } => None,
        }
    }

    pub fn reason(&self) -> SafetyReason {
        match self {
            Self::Stay { reason } | Self::Switch { reason, .. } => *reason,
        }
    }
}

/// What one evaluation looks at.
#[derive(Clone, Copy, Debug)]
pub struct SafetyInput<'a> {
    pub samples: &'a SafetySamples,
    pub current_mode: ZoomMode,
    /// Zoom of the view the samples were computed for.
    pub sampled_zoom: f64,
    /// Identifies the compute pass; used by `StreakPolicy::ResetEachPass`.
    pub pass_id: u64,
    pub now_seconds: f64,
}

/// Result of one evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SafetyVerdict {
    pub decision: SafetyDecision,
    pub stats: SafetyStats,
    pub zoom_level: f64,
}

/// Hysteresis state carried between evaluations.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZoomSafetyState {
    pub bad_streak: u32,
    pub last_flip_zoom_level: Option<f64>,
    streak_pass: Option<u64>,
    last_bad_seconds: Option<f64>,
}

impl ZoomSafetyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the samples taken so far in a pass.
    ///
    /// Pure: returns the next state together with the verdict.
    pub fn evaluate(&self, input: &SafetyInput<'_>, config: &ZoomSafetyConfig) -> (Self, SafetyVerdict) {
        let stats = input.samples.stats();
        let zoom_level = (input.sampled_zoom.max(f64::MIN_POSITIVE) / config.zoom_baseline).ln();
        let mut next = *self;

        let verdict = |decision| SafetyVerdict {
            decision,
            stats,
            zoom_level,
        };

        if stats.total_samples < config.min_samples {
            return (
                next,
                verdict(SafetyDecision::Stay {
                    reason: SafetyReason::InsufficientSamples,
                }),
            );
        }

        let decision = match input.current_mode {
            ZoomMode::In => next.evaluate_zooming_in(&stats, zoom_level, input, config),
            ZoomMode::Out => next.evaluate_zooming_out(&stats, zoom_level, config),
        };

        if let SafetyDecision::Switch { .. } = decision {
            next.bad_streak = 0;
            next.last_bad_seconds = None;
            next.last_flip_zoom_level = Some(zoom_level);
        }

        (next, verdict(decision))
    }

    fn cooldown_elapsed(&self, zoom_level: f64, min_delta: f64) -> bool {
        self.last_flip_zoom_level
            .map_or(true, |last| (zoom_level - last).abs() >= min_delta)
    }

    fn evaluate_zooming_in(
        &mut self,
        stats: &SafetyStats,
        zoom_level: f64,
        input: &SafetyInput<'_>,
        config: &ZoomSafetyConfig,
    ) -> SafetyDecision {
        self.apply_streak_policy(input, config);

        let hard_reason = if zoom_level < config.hard_min_zoom_level {
            None
        } else if stats.inside_frac > config.inside_high {
            Some(SafetyReason::HardInside)
        } else if stats.fast_escape_frac > config.fast_escape_high {
            Some(SafetyReason::HardFastEscape)
        } else {
            None
        };

        let flat = zoom_level >= config.soft_min_zoom_level
            && (stats.outside_range < config.soft_range_min
                || (stats.mid_frac < config.soft_mid_min
                    && stats.outside_non_fast_frac < config.soft_non_fast_min));

        if flat {
            self.bad_streak += 1;
            self.last_bad_seconds = Some(input.now_seconds);
        } else {
            self.forgive_streak(config);
        }

        let soft_reason = if self.bad_streak >= config.soft_bad_streak_min.max(1) {
            Some(SafetyReason::SoftFlat)
        } else {
            None
        };

        match hard_reason.or(soft_reason) {
            Some(reason) => {
                if self.cooldown_elapsed(zoom_level, config.min_switch_delta_z_out) {
                    SafetyDecision::Switch {
                        next_mode: ZoomMode::Out,
                        reason,
                    }
                } else {
                    SafetyDecision::Stay {
                        reason: SafetyReason::Cooldown,
                    }
                }
            }
            None if flat => SafetyDecision::Stay {
                reason: SafetyReason::SoftPending,
            },
            None => SafetyDecision::Stay {
                reason: SafetyReason::Healthy,
            },
        }
    }

    fn evaluate_zooming_out(
        &mut self,
        stats: &SafetyStats,
        zoom_level: f64,
        config: &ZoomSafetyConfig,
    ) -> SafetyDecision {
        let by_depth = zoom_level <= config.recover_zoom_level;
        let by_stats = zoom_level <= config.reenter_max_zoom_level
            && stats.inside_frac < config.recover_inside_max
            && stats.fast_escape_frac < config.recover_fast_max
            && stats.outside_range >= config.recover_range_min
            && stats.outside_non_fast_frac >= config.recover_non_fast_min;

        let reason = if by_depth {
            SafetyReason::RecoveredDepth
        } else if by_stats {
            SafetyReason::RecoveredStats
        } else {
            return SafetyDecision::Stay {
                reason: SafetyReason::NotRecovered,
            };
        };

        if self.cooldown_elapsed(zoom_level, config.min_switch_delta_z_in) {
            SafetyDecision::Switch {
                next_mode: ZoomMode::In,
                reason,
            }
        } else {
            SafetyDecision::Stay {
                reason: SafetyReason::Cooldown,
            }
        }
    }

    fn apply_streak_policy(&mut self, input: &SafetyInput<'_>, config: &ZoomSafetyConfig) {
        match config.streak_policy {
            StreakPolicy::ResetEachPass => {
                if self.streak_pass != Some(input.pass_id) {
                    self.bad_streak = 0;
                }
            }
            StreakPolicy::ExpireAfter { seconds } => {
                if let Some(last) = self.last_bad_seconds {
                    if input.now_seconds - last > seconds {
                        self.bad_streak = 0;
                        self.last_bad_seconds = None;
                    }
                }
            }
            StreakPolicy::ResetOnGood | StreakPolicy::DecayOnGood => {}
        }
        self.streak_pass = Some(input.pass_id);
    }

    fn forgive_streak(&mut self, config: &ZoomSafetyConfig) {
        match config.streak_policy {
            StreakPolicy::DecayOnGood => self.bad_streak = self.bad_streak.saturating_sub(1),
            StreakPolicy::ResetOnGood | StreakPolicy::ResetEachPass => self.bad_streak = 0,
            // Healthy checkpoints don't clear the streak; only time does.
            StreakPolicy::ExpireAfter { .. } => {}
        }
    }
}
