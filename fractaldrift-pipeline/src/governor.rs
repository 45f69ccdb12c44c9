//! Zoom-Out Governor.
//!
//! While zooming out, the displayed zoom must not run ahead of imagery that
//! has actually been computed. Everything here works in zoom-out levels
//! `u = -ln(zoom)`: larger means further out. The displayed level moves
//! toward the desired level at a capped speed and may not exceed
//! `anchor + max_lag_zoom_levels`, where the anchor is the most trustworthy
//! computed zoom. Once that ceiling clamps, the anchor is locked until the
//! live anchor alone would no longer clamp.

use fractaldrift_compute::ZoomMode;
use fractaldrift_core::GovernorConfig;
use serde::Serialize;

pub fn out_level(zoom: f64) -> f64 {
    -zoom.max(f64::MIN_POSITIVE).ln()
}

pub fn zoom_from_out_level(level: f64) -> f64 {
    (-level).exp()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorSource {
    /// Displayed level when the mode flipped to zoom-out.
    Settle,
    /// A finished back surface waiting to be faded in.
    BackReady,
    /// Interpolated between front and the in-flight pass by its progress.
    ComputeProgress,
    Front,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Anchor {
    pub source: AnchorSource,
    pub level: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GovernorState {
    displayed_level: Option<f64>,
    locked_anchor: Option<Anchor>,
    settle: Option<(f64, f64)>,
    last_mode: ZoomMode,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GovernorInput {
    pub mode: ZoomMode,
    pub desired_zoom: f64,
    pub dt: f64,
    pub now_seconds: f64,
    /// Zoom the front surface was computed at, if anything is shown.
    pub front_zoom: Option<f64>,
    /// Zoom of a finished back surface awaiting its swap.
    pub back_ready_zoom: Option<f64>,
    /// Zoom and progress of the pass in flight.
    pub compute: Option<(f64, f64)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GovernorOutput {
    pub displayed_zoom: f64,
    pub anchor: Option<Anchor>,
    /// Highest allowed out level this frame.
    pub ceiling_level: Option<f64>,
    pub clamped: bool,
    pub locked: bool,
}

impl GovernorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked_anchor.is_some()
    }

    pub fn displayed_zoom(&self) -> Option<f64> {
        self.displayed_level.map(zoom_from_out_level)
    }

    /// Live anchor in priority order.
    fn select_anchor(&self, input: &GovernorInput) -> Option<Anchor> {
        if let Some((level, expires)) = self.settle {
            if input.now_seconds < expires {
                return Some(Anchor {
                    source: AnchorSource::Settle,
                    level,
                });
            }
        }
        if let Some(zoom) = input.back_ready_zoom {
            return Some(Anchor {
                source: AnchorSource::BackReady,
                level: out_level(zoom),
            });
        }
        if let (Some((job_zoom, progress)), Some(front_zoom)) = (input.compute, input.front_zoom) {
            let front = out_level(front_zoom);
            let job = out_level(job_zoom);
            let t = if progress.is_finite() { progress.clamp(0.0, 1.0) } else { 0.0 };
            return Some(Anchor {
                source: AnchorSource::ComputeProgress,
                level: front + (job - front) * t,
            });
        }
        input.front_zoom.map(|zoom| Anchor {
            source: AnchorSource::Front,
            level: out_level(zoom),
        })
    }

    pub fn step(&self, input: &GovernorInput, config: &GovernorConfig) -> (Self, GovernorOutput) {
        let mut next = *self;
        let desired = out_level(input.desired_zoom);

        if input.mode == ZoomMode::In {
            if next.locked_anchor.is_some() {
                log::debug!("Governor unlocked: zoom-in");
            }
            next.displayed_level = Some(desired);
            next.locked_anchor = None;
            next.settle = None;
            next.last_mode = ZoomMode::In;
            return (
                next,
                GovernorOutput {
                    displayed_zoom: input.desired_zoom,
                    anchor: None,
                    ceiling_level: None,
                    clamped: false,
                    locked: false,
                },
            );
        }

        let previous = self.displayed_level.unwrap_or(desired);
        if self.last_mode == ZoomMode::In {
            next.settle = Some((previous, input.now_seconds + config.settle_seconds));
            next.locked_anchor = None;
        }
        next.last_mode = ZoomMode::Out;

        let dt = if input.dt.is_finite() { input.dt.max(0.0) } else { 0.0 };
        let max_step = config.max_speed_zoom_levels_per_sec * dt;
        let candidate = previous + (desired - previous).clamp(-max_step, max_step);

        let live = next.select_anchor(input);
        let Some(live) = live else {
            // Nothing computed yet: nothing to protect.
            next.displayed_level = Some(candidate);
            return (
                next,
                GovernorOutput {
                    displayed_zoom: zoom_from_out_level(candidate),
                    anchor: None,
                    ceiling_level: None,
                    clamped: false,
                    locked: false,
                },
            );
        };

        if let Some(locked) = next.locked_anchor {
            if candidate <= live.level + config.max_lag_zoom_levels {
                log::debug!(
                    "Governor unlocked: {:?} anchor at {:.3} covers {:.3}",
                    live.source,
                    live.level,
                    candidate
                );
                next.locked_anchor = None;
            } else {
                log::trace!("Governor holding locked anchor {:.3}", locked.level);
            }
        }

        let anchor = next.locked_anchor.unwrap_or(live);
        let ceiling = anchor.level + config.max_lag_zoom_levels;
        let clamped = candidate > ceiling;
        let displayed = if clamped {
            // The ceiling stops outward motion but never drags the view in.
            ceiling.max(previous.min(candidate))
        } else {
            candidate
        };

        if clamped && next.locked_anchor.is_none() {
            log::debug!(
                "Governor locked: {:?} anchor at {:.3}, ceiling {:.3}",
                anchor.source,
                anchor.level,
                ceiling
            );
            next.locked_anchor = Some(anchor);
        }

        next.displayed_level = Some(displayed);
        (
            next,
            GovernorOutput {
                displayed_zoom: zoom_from_out_level(displayed),
                anchor: Some(anchor),
                ceiling_level: Some(ceiling),
                clamped,
                locked: next.locked_anchor.is_some(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::LN_2;

    fn config() -> GovernorConfig {
        GovernorConfig {
            max_speed_zoom_levels_per_sec: 0.45,
            max_lag_zoom_levels: LN_2,
            settle_seconds: 0.5,
        }
    }

    fn input(mode: ZoomMode, desired_zoom: f64, now_seconds: f64) -> GovernorInput {
        GovernorInput {
            mode,
            desired_zoom,
            dt: 1.0 / 60.0,
            now_seconds,
            front_zoom: None,
            back_ready_zoom: None,
            compute: None,
        }
    }

    #[test]
    fn transparent_when_zooming_in() {
        let (state, out) = GovernorState::new().step(&input(ZoomMode::In, 42.0, 0.0), &config());
        assert_eq!(out.displayed_zoom, 42.0);
        assert!(!out.clamped);
        assert!(!state.is_locked());
    }

    #[test]
    fn speed_is_capped() {
        let config = config();
        let (state, _) = GovernorState::new().step(&input(ZoomMode::In, 1000.0, 0.0), &config);
        let mut zoom_out = input(ZoomMode::Out, 1.0, 10.0);
        zoom_out.dt = 1.0;
        let (_, out) = state.step(&zoom_out, &config);
        let moved = out_level(out.displayed_zoom) - out_level(1000.0);
        assert!((moved - 0.45).abs() < 1e-9, "moved {moved}");
    }

    #[test]
    fn anchor_priority() {
        let state = GovernorState {
            settle: Some((1.0, 5.0)),
            ..GovernorState::default()
        };
        let mut i = input(ZoomMode::Out, 1.0, 0.0);
        i.front_zoom = Some(100.0);
        i.compute = Some((10.0, 0.5));
        i.back_ready_zoom = Some(50.0);
        assert_eq!(state.select_anchor(&i).unwrap().source, AnchorSource::Settle);

        i.now_seconds = 6.0;
        assert_eq!(state.select_anchor(&i).unwrap().source, AnchorSource::BackReady);

        i.back_ready_zoom = None;
        let anchor = state.select_anchor(&i).unwrap();
        assert_eq!(anchor.source, AnchorSource::ComputeProgress);
        let expected = (out_level(100.0) + out_level(10.0)) / 2.0;
        assert!((anchor.level - expected).abs() < 1e-12);

        i.compute = None;
        assert_eq!(state.select_anchor(&i).unwrap().source, AnchorSource::Front);

        i.front_zoom = None;
        assert_eq!(state.select_anchor(&i), None);
    }

    #[test]
    fn flip_to_out_sets_settle_anchor() {
        let config = config();
        let (state, _) = GovernorState::new().step(&input(ZoomMode::In, 64.0, 1.0), &config);
        let mut i = input(ZoomMode::Out, 60.0, 1.0);
        i.front_zoom = Some(1000.0);
        let (state, out) = state.step(&i, &config);
        assert_eq!(out.anchor.unwrap().source, AnchorSource::Settle);
        assert!((out.anchor.unwrap().level - out_level(64.0)).abs() < 1e-12);

        i.now_seconds = 2.0;
        let (_, out) = state.step(&i, &config);
        assert_eq!(out.anchor.unwrap().source, AnchorSource::Front);
    }

    #[test]
    fn display_never_exceeds_anchor_plus_lag() {
        // Zoom-out factors relative to 1e6: anchor at 10x out, desired 100x out.
        let config = config();
        let base = 1.0e6;
        let state = GovernorState {
            displayed_level: Some(out_level(base / 10.0)),
            last_mode: ZoomMode::Out,
            ..GovernorState::default()
        };
        let mut i = input(ZoomMode::Out, base / 100.0, 0.0);
        i.front_zoom = Some(base / 10.0);
        i.dt = 0.05;

        let limit = out_level(base / 20.0);
        let mut state = state;
        for frame in 0..400 {
            i.now_seconds = frame as f64 * 0.05;
            let (next, out) = state.step(&i, &config);
            assert!(
                out_level(out.displayed_zoom) <= limit + 1e-9,
                "frame {frame}: {} out of {}",
                base / out.displayed_zoom,
                base / zoom_from_out_level(limit)
            );
            state = next;
        }
        assert!(state.is_locked());

        // The anchor advancing releases the display
        i.front_zoom = Some(base / 40.0);
        let mut released = false;
        for _ in 0..200 {
            let (next, out) = state.step(&i, &config);
            if out_level(out.displayed_zoom) > limit + 1e-6 {
                released = true;
            }
            assert!(out_level(out.displayed_zoom) <= out_level(base / 80.0) + 1e-9);
            state = next;
        }
        assert!(released);
    }

    #[test]
    fn lock_freezes_rising_anchor() {
        let config = config();
        let state = GovernorState {
            displayed_level: Some(out_level(100.0)),
            last_mode: ZoomMode::Out,
            ..GovernorState::default()
        };
        let mut i = input(ZoomMode::Out, 1.0, 0.0);
        i.front_zoom = Some(100.0);
        i.compute = Some((1.0, 0.0));
        i.dt = 10.0;
        let (state, out) = state.step(&i, &config);
        assert!(out.clamped && out.locked);
        let locked_level = out.anchor.unwrap().level;

        // Progress moves the live anchor out, but not enough to stop clamping
        i.compute = Some((1.0, 0.01));
        let (_, out) = state.step(&i, &config);
        assert!(out.locked);
        assert_eq!(out.anchor.unwrap().level, locked_level);
    }

    #[test]
    fn zoom_in_releases_lock() {
        let config = config();
        let state = GovernorState {
            displayed_level: Some(out_level(100.0)),
            locked_anchor: Some(Anchor {
                source: AnchorSource::Front,
                level: out_level(100.0),
            }),
            last_mode: ZoomMode::Out,
            ..GovernorState::default()
        };
        let (state, out) = state.step(&input(ZoomMode::In, 90.0, 0.0), &config);
        assert!(!state.is_locked());
        assert_eq!(out.displayed_zoom, 90.0);
    }
}
