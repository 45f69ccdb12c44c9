use crate::angle::wrap_angle;
use serde::{Deserialize, Serialize};

/// Similarity transform from the complex plane to the screen.
///
/// - `center_x`, `center_y`: plane coordinates shown at the viewport center
/// - `zoom`: magnification relative to the base span (always >= 1)
/// - `rotation`: rotation of the plane relative to the screen, in radians
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub center_x: f64,
    pub center_y: f64,
    pub zoom: f64,
    pub rotation: f64,
}

impl Default for View {
    fn default() -> Self {
        Self {
            center_x: -0.5,
            center_y: 0.0,
            zoom: 1.0,
            rotation: 0.0,
        }
    }
}

impl View {
    pub fn new(center_x: f64, center_y: f64, zoom: f64, rotation: f64) -> Self {
        Self {
            center_x,
            center_y,
            zoom,
            rotation,
        }
    }

    /// Replace non-finite components and clamp zoom to >= 1.
    ///
    /// Views flow straight from animation state into the compute kernel, so
    /// a NaN here would poison a whole surface. Degrade instead of failing.
    pub fn sanitized(&self) -> Self {
        let fallback = Self::default();
        let center_x = if self.center_x.is_finite() {
            self.center_x
        } else {
            fallback.center_x
        };
        let center_y = if self.center_y.is_finite() {
            self.center_y
        } else {
            fallback.center_y
        };
        let zoom = if self.zoom.is_finite() {
            self.zoom.max(1.0)
        } else {
            1.0
        };
        let rotation = if self.rotation.is_finite() {
            self.rotation
        } else {
            0.0
        };
        Self {
            center_x,
            center_y,
            zoom,
            rotation,
        }
    }

    /// Same view with rotation wrapped into (-PI, PI].
    pub fn with_wrapped_rotation(&self) -> Self {
        Self {
            rotation: wrap_angle(self.rotation),
            ..*self
        }
    }

    /// Same view at a different zoom (clamped to >= 1).
    pub fn with_zoom(&self, zoom: f64) -> Self {
        Self {
            zoom: if zoom.is_finite() { zoom.max(1.0) } else { 1.0 },
            ..*self
        }
    }

    /// Screen pixels per plane unit for a viewport of the given size.
    pub fn pixels_per_unit(&self, viewport_width: u32, viewport_height: u32, base_span: f64) -> f64 {
        let short_side = viewport_width.min(viewport_height).max(1) as f64;
        short_side * self.zoom / base_span.max(f64::MIN_POSITIVE)
    }
}

/// Precomputed pixel -> plane mapping for one surface and one view.
///
/// Surface pixel `(px, py)` maps to
/// `origin + (px + 0.5) * step_x + (py + 0.5) * step_y`, which is the same
/// origin/step decomposition used for per-pixel deltas in tiled renderers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneMapping {
    pub origin: (f64, f64),
    pub step_x: (f64, f64),
    pub step_y: (f64, f64),
}

impl PlaneMapping {
    /// Build the mapping for a `surface_width x surface_height` surface
    /// centered on the viewport.
    ///
    /// `units_per_pixel` is the plane distance covered by one surface pixel
    /// at zoom 1; it is divided by the view's zoom here.
    pub fn new(view: &View, surface_width: u32, surface_height: u32, units_per_pixel: f64) -> Self {
        let unit = units_per_pixel / view.zoom.max(1.0);
        let (sin, cos) = view.rotation.sin_cos();

        // Screen x -> plane (cos, sin); screen y points down, so it maps to
        // the negated plane y axis rotated by the view.
        let step_x = (cos * unit, sin * unit);
        let step_y = (sin * unit, -cos * unit);

        let half_w = surface_width as f64 / 2.0;
        let half_h = surface_height as f64 / 2.0;
        let origin = (
            view.center_x - half_w * step_x.0 - half_h * step_y.0,
            view.center_y - half_w * step_x.1 - half_h * step_y.1,
        );

        Self {
            origin,
            step_x,
            step_y,
        }
    }

    /// Plane coordinates of the center of surface pixel `(px, py)`.
    #[inline]
    pub fn pixel_to_plane(&self, px: u32, py: u32) -> (f64, f64) {
        let fx = px as f64 + 0.5;
        let fy = py as f64 + 0.5;
        (
            self.origin.0 + fx * self.step_x.0 + fy * self.step_y.0,
            self.origin.1 + fx * self.step_x.1 + fy * self.step_y.1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn sanitized_clamps_zoom_and_replaces_nan() {
        let view = View::new(f64::NAN, 0.25, 0.1, f64::INFINITY).sanitized();
        assert_eq!(view.center_x, -0.5);
        assert_eq!(view.center_y, 0.25);
        assert_eq!(view.zoom, 1.0);
        assert_eq!(view.rotation, 0.0);
    }

    #[test]
    fn with_zoom_never_goes_below_one() {
        let view = View::default().with_zoom(0.25);
        assert_eq!(view.zoom, 1.0);
        assert_eq!(View::default().with_zoom(8.0).zoom, 8.0);
    }

    #[test]
    fn center_pixel_maps_near_view_center() {
        let view = View::new(-0.75, 0.1, 4.0, 0.3);
        let mapping = PlaneMapping::new(&view, 101, 101, 0.01);
        let (x, y) = mapping.pixel_to_plane(50, 50);
        assert!((x - -0.75).abs() < 1e-12);
        assert!((y - 0.1).abs() < 1e-12);
    }

    #[test]
    fn screen_up_is_plane_up_without_rotation() {
        let view = View::new(0.0, 0.0, 1.0, 0.0);
        let mapping = PlaneMapping::new(&view, 100, 100, 0.04);
        let (_, top_y) = mapping.pixel_to_plane(50, 0);
        let (_, bottom_y) = mapping.pixel_to_plane(50, 99);
        assert!(top_y > 0.0);
        assert!(bottom_y < 0.0);
    }

    #[test]
    fn zoom_shrinks_pixel_step() {
        let base = PlaneMapping::new(&View::new(0.0, 0.0, 1.0, 0.0), 64, 64, 0.05);
        let zoomed = PlaneMapping::new(&View::new(0.0, 0.0, 10.0, 0.0), 64, 64, 0.05);
        assert!((base.step_x.0 / zoomed.step_x.0 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn quarter_turn_rotates_screen_x_onto_plane_y() {
        let mapping = PlaneMapping::new(&View::new(0.0, 0.0, 1.0, FRAC_PI_2), 10, 10, 1.0);
        assert!(mapping.step_x.0.abs() < 1e-12);
        assert!((mapping.step_x.1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pixels_per_unit_uses_short_side() {
        let view = View::new(0.0, 0.0, 2.0, 0.0);
        assert!((view.pixels_per_unit(1920, 1080, 3.0) - 720.0).abs() < 1e-9);
    }
}
