use serde::Serialize;

/// Progress of a tiled compute pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PassProgress {
    pub completed_tiles: u32,
    pub total_tiles: u32,
    /// Wall-clock time spent inside `step` calls for this pass.
    pub elapsed_ms: f64,
    pub is_complete: bool,
}

impl PassProgress {
    pub fn new(total_tiles: u32) -> Self {
        Self {
            completed_tiles: 0,
            total_tiles,
            elapsed_ms: 0.0,
            is_complete: false,
        }
    }

    /// Completed fraction in [0, 1].
    pub fn fraction(&self) -> f64 {
        if self.total_tiles == 0 {
            0.0
        } else {
            (self.completed_tiles as f64 / self.total_tiles as f64).min(1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_progress_starts_at_zero() {
        let progress = PassProgress::new(64);
        assert_eq!(progress.completed_tiles, 0);
        assert_eq!(progress.fraction(), 0.0);
        assert!(!progress.is_complete);
    }

    #[test]
    fn fraction_of_partial_pass() {
        let mut progress = PassProgress::new(16);
        progress.completed_tiles = 4;
        assert!((progress.fraction() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn zero_tiles_is_zero_not_nan() {
        assert_eq!(PassProgress::new(0).fraction(), 0.0);
    }
}
