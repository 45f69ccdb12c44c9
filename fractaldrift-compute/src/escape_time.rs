use fractaldrift_core::{EscapeConfig, INSIDE_SET};

/// Parameters of one escape-time evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EscapeParams {
    pub max_iterations: u32,
    pub bailout_radius: f64,
    pub smooth: bool,
}

impl EscapeParams {
    pub fn new(max_iterations: u32, bailout_radius: f64, smooth: bool) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            bailout_radius: if bailout_radius.is_finite() {
                bailout_radius.max(2.0)
            } else {
                2.0
            },
            smooth,
        }
    }

    /// Full budget when still, reduced budget while animating.
    pub fn from_config(config: &EscapeConfig, animating: bool) -> Self {
        let iterations = if animating {
            config.animating_max_iterations
        } else {
            config.max_iterations
        };
        Self::new(iterations, config.bailout_radius, config.smooth)
    }
}

/// Main cardioid and period-2 bulb membership.
///
/// Both regions never escape, so skipping their iterations changes nothing
/// but the cost.
#[inline]
fn in_main_components(cx: f64, cy: f64) -> bool {
    let y2 = cy * cy;
    let q = (cx - 0.25) * (cx - 0.25) + y2;
    if q * (q + (cx - 0.25)) <= 0.25 * y2 {
        return true;
    }
    (cx + 1.0) * (cx + 1.0) + y2 <= 0.0625
}

/// Normalized escape time of `c = cx + i*cy` under `z <- z^2 + c`.
///
/// Returns [`INSIDE_SET`] when the orbit stays within the bailout radius
/// for `max_iterations`, otherwise the escape iteration divided by
/// `max_iterations` in [0, 1]. With `smooth`, the iteration count is
/// replaced by `mu = n + 1 - log2(ln|z|)`.
pub fn escape_time(cx: f64, cy: f64, params: &EscapeParams) -> f32 {
    if in_main_components(cx, cy) {
        return INSIDE_SET;
    }

    let bailout_sq = params.bailout_radius * params.bailout_radius;
    let max_iterations = params.max_iterations;
    let mut zx = 0.0_f64;
    let mut zy = 0.0_f64;

    for i in 0..max_iterations {
        let zx_sq = zx * zx;
        let zy_sq = zy * zy;
        let z_norm_sq = zx_sq + zy_sq;

        if z_norm_sq > bailout_sq {
            let n = if params.smooth {
                // ln|z| = ln(|z|^2) / 2
                let log_z = z_norm_sq.ln() / 2.0;
                let nu = log_z.ln() / std::f64::consts::LN_2;
                i as f64 + 1.0 - nu
            } else {
                i as f64
            };
            return (n / max_iterations as f64).clamp(0.0, 1.0) as f32;
        }

        zy = 2.0 * zx * zy + cy;
        zx = zx_sq - zy_sq + cx;
    }

    INSIDE_SET
}
