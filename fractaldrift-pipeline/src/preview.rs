//! Preview Transform: draws stale surfaces at the current view.
//!
//! A surface computed for view `B` is shown at the displayed view `D` as a
//! sprite rotated by `D.rotation - B.rotation`, scaled by
//! `D.zoom / (render_scale * B.zoom)` screen pixels per texel and offset
//! so that `B`'s center lands where it belongs on screen. If that sprite
//! would leave part of the viewport uncovered, the displayed zoom is
//! raised (the view is zoomed in) until it covers.
//!
//! Screen coordinates are pixels with y pointing down. A sprite maps texel
//! `t` to `position + scale * R(rotation) * (t - pivot)` where
//! `R(a) = [[cos a, -sin a], [sin a, cos a]]`.

use fractaldrift_compute::ZoomMode;
use fractaldrift_core::{unwrap_angle, wrap_angle, PreviewConfig, View};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SpriteTransform {
    /// Rotation and scale origin, in texels.
    pub pivot: (f64, f64),
    /// Where the pivot lands, in screen pixels.
    pub position: (f64, f64),
    /// Radians.
    pub rotation: f64,
    /// Screen pixels per texel.
    pub scale: f64,
}

impl SpriteTransform {
    pub fn texel_to_screen(&self, texel: (f64, f64)) -> (f64, f64) {
        let (sin, cos) = self.rotation.sin_cos();
        let dx = texel.0 - self.pivot.0;
        let dy = texel.1 - self.pivot.1;
        (
            self.position.0 + self.scale * (cos * dx - sin * dy),
            self.position.1 + self.scale * (sin * dx + cos * dy),
        )
    }

    pub fn screen_to_texel(&self, screen: (f64, f64)) -> (f64, f64) {
        let (sin, cos) = self.rotation.sin_cos();
        let dx = (screen.0 - self.position.0) / self.scale;
        let dy = (screen.1 - self.position.1) / self.scale;
        (
            self.pivot.0 + cos * dx + sin * dy,
            self.pivot.1 - sin * dx + cos * dy,
        )
    }
}

/// Smallest scale at which a sprite covers the viewport.
///
/// `viewport` and `sprite` are full sizes (sprite in texels); the sprite is
/// rotated by `rotation` and its center offset from the viewport center by
/// `scale * offset_per_scale`. Returns `None` when no scale can cover, i.e.
/// the offset alone already reaches the sprite edge.
pub fn cover_scale(
    viewport: (f64, f64),
    sprite: (f64, f64),
    rotation: f64,
    offset_per_scale: (f64, f64),
    rotation_safe: bool,
) -> Option<f64> {
    let (hw, hh) = (viewport.0 / 2.0, viewport.1 / 2.0);
    let (sprite_hw, sprite_hh) = (sprite.0 / 2.0, sprite.1 / 2.0);
    let (sin, cos) = rotation.sin_cos();
    let (ux, uy) = offset_per_scale;

    // Viewport corners in sprite-local axes must stay within the half extents.
    let denom_x = sprite_hw - (cos * ux + sin * uy).abs();
    let denom_y = sprite_hh - (-sin * ux + cos * uy).abs();
    if denom_x <= 0.0 || denom_y <= 0.0 {
        return None;
    }
    let need_x = (cos.abs() * hw + sin.abs() * hh) / denom_x;
    let need_y = (sin.abs() * hw + cos.abs() * hh) / denom_y;
    let mut need = need_x.max(need_y);

    if rotation_safe {
        let denom_any = sprite_hw.min(sprite_hh) - ux.hypot(uy);
        if denom_any <= 0.0 {
            return None;
        }
        need = need.max(hw.hypot(hh) / denom_any);
    }
    need.is_finite().then_some(need)
}

/// Cached state that keeps preview transforms continuous between frames.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PreviewState {
    rotation_target: Option<f64>,
    displayed_rotation: Option<f64>,
    cover_cap_log_zoom: Option<f64>,
    last_log_zoom: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviewInput {
    pub viewport: (u32, u32),
    pub surface: (u32, u32),
    pub render_scale: f64,
    pub base_span: f64,
    pub mode: ZoomMode,
    /// Smoothed center and rotation with the governed zoom.
    pub view: View,
    pub front: Option<View>,
    /// View of the back surface while it fades in.
    pub back: Option<View>,
    pub back_alpha: f64,
    pub dt: f64,
    /// Freeze the current zoom as a floor that then relaxes.
    pub snapshot_cover: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PreviewFrame {
    /// What is actually shown: `input.view` with rate-limited rotation and
    /// the zoom raised to keep the viewport covered.
    pub displayed_view: View,
    pub front: Option<SpriteTransform>,
    pub back: Option<SpriteTransform>,
    pub back_alpha: f64,
    /// displayed zoom / governed zoom, >= 1.
    pub cover_factor: f64,
    pub needed_zoom: Option<f64>,
    pub cover_cap_zoom: Option<f64>,
}

struct Geometry {
    viewport: (f64, f64),
    sprite: (f64, f64),
    render_scale: f64,
    /// Plane units per screen pixel at zoom 1.
    units_per_screen_pixel: f64,
}

impl Geometry {
    fn new(input: &PreviewInput) -> Self {
        let (w, h) = input.viewport;
        let short_side = w.min(h).max(1) as f64;
        Self {
            viewport: (w as f64, h as f64),
            sprite: (input.surface.0 as f64, input.surface.1 as f64),
            render_scale: input.render_scale.max(f64::MIN_POSITIVE),
            units_per_screen_pixel: input.base_span / short_side,
        }
    }

    /// Rotation and per-scale offset of `surface` drawn at rotation
    /// `rotation` around `center`.
    fn relative(&self, surface: &View, center: (f64, f64), rotation: f64) -> (f64, (f64, f64)) {
        let surface_rotation = unwrap_angle(rotation, surface.rotation);
        let sprite_rotation = rotation - surface_rotation;

        let texel_units = self.units_per_screen_pixel / (self.render_scale * surface.zoom);
        let dx = (surface.center_x - center.0) / texel_units;
        let dy = (surface.center_y - center.1) / texel_units;
        // Plane -> screen for the displayed rotation (screen y down).
        let (sin, cos) = rotation.sin_cos();
        let offset = (cos * dx + sin * dy, sin * dx - cos * dy);
        (sprite_rotation, offset)
    }

    /// Displayed zoom needed for `surface` to cover, or None if unreachable.
    fn needed_zoom(
        &self,
        surface: &View,
        center: (f64, f64),
        rotation: f64,
        rotation_safe: bool,
    ) -> Option<f64> {
        let (sprite_rotation, offset) = self.relative(surface, center, rotation);
        cover_scale(self.viewport, self.sprite, sprite_rotation, offset, rotation_safe)
            .map(|scale| scale * self.render_scale * surface.zoom)
    }

    fn sprite(&self, surface: &View, center: (f64, f64), rotation: f64, zoom: f64) -> SpriteTransform {
        let (sprite_rotation, offset) = self.relative(surface, center, rotation);
        let scale = zoom / (self.render_scale * surface.zoom);
        SpriteTransform {
            pivot: (self.sprite.0 / 2.0, self.sprite.1 / 2.0),
            position: (
                self.viewport.0 / 2.0 + scale * offset.0,
                self.viewport.1 / 2.0 + scale * offset.1,
            ),
            rotation: sprite_rotation,
            scale,
        }
    }
}

impl PreviewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self, input: &PreviewInput, config: &PreviewConfig) -> (Self, PreviewFrame) {
        let mut next = *self;
        let dt = if input.dt.is_finite() { input.dt.max(0.0) } else { 0.0 };
        let view = input.view.sanitized();

        let target = match self.rotation_target {
            Some(previous) => unwrap_angle(previous, view.rotation),
            None => view.rotation,
        };
        let rotation = match self.displayed_rotation {
            Some(previous) => {
                let max_step = config.max_preview_rot_speed_rad_per_sec * dt;
                previous + (target - previous).clamp(-max_step, max_step)
            }
            None => target,
        };
        next.rotation_target = Some(target);
        next.displayed_rotation = Some(rotation);

        let geometry = Geometry::new(input);
        let center = (view.center_x, view.center_y);
        let governed = view.zoom;
        let back = input.back.filter(|_| input.back_alpha > 0.0);

        let needed = [input.front, back]
            .into_iter()
            .flatten()
            .map(|surface| {
                geometry
                    .needed_zoom(&surface, center, rotation, config.rotation_safe_cover)
                    .unwrap_or(governed * config.max_cover_scale)
            })
            .reduce(f64::max)
            .map(|zoom| match input.mode {
                ZoomMode::Out => zoom * config.zoom_out_headroom,
                ZoomMode::In => zoom,
            });
        let needed_log = needed.map(f64::ln);

        if input.snapshot_cover {
            next.cover_cap_log_zoom = self.last_log_zoom;
        } else if let Some(cap) = next.cover_cap_log_zoom.as_mut() {
            *cap -= config.cover_cap_release_per_sec * dt;
        }
        if let (Some(cap), Some(needed_log)) = (next.cover_cap_log_zoom, needed_log) {
            if cap <= needed_log {
                next.cover_cap_log_zoom = None;
            }
        }

        let floor_log = match (needed_log, next.cover_cap_log_zoom) {
            (Some(n), Some(c)) => Some(n.max(c)),
            (n, c) => n.or(c),
        };
        let zoom = match floor_log {
            Some(floor) => governed.max(floor.exp()),
            None => governed,
        };
        next.last_log_zoom = Some(zoom.ln());

        let frame = PreviewFrame {
            displayed_view: View::new(view.center_x, view.center_y, zoom, wrap_angle(rotation)),
            front: input
                .front
                .map(|surface| geometry.sprite(&surface, center, rotation, zoom)),
            back: back.map(|surface| geometry.sprite(&surface, center, rotation, zoom)),
            back_alpha: if back.is_some() { input.back_alpha.clamp(0.0, 1.0) } else { 0.0 },
            cover_factor: zoom / governed,
            needed_zoom: needed,
            cover_cap_zoom: next.cover_cap_log_zoom.map(f64::exp),
        };
        (next, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn corners_covered(sprite: &SpriteTransform, size: (f64, f64), viewport: (f64, f64)) -> bool {
        let eps = 1e-6;
        [(0.0, 0.0), (viewport.0, 0.0), (0.0, viewport.1), viewport]
            .into_iter()
            .all(|corner| {
                let (tx, ty) = sprite.screen_to_texel(corner);
                tx >= -eps && tx <= size.0 + eps && ty >= -eps && ty <= size.1 + eps
            })
    }

    fn input(view: View, front: View) -> PreviewInput {
        PreviewInput {
            viewport: (800, 600),
            surface: (500, 500),
            render_scale: 0.5,
            base_span: 3.0,
            mode: ZoomMode::In,
            view,
            front: Some(front),
            back: None,
            back_alpha: 0.0,
            dt: 1.0 / 60.0,
            snapshot_cover: false,
        }
    }

    #[test]
    fn cover_scale_unrotated_centered() {
        let scale = cover_scale((800.0, 600.0), (400.0, 400.0), 0.0, (0.0, 0.0), false).unwrap();
        assert!((scale - 2.0).abs() < 1e-12);
    }

    #[test]
    fn cover_scale_quarter_turn_swaps_axes() {
        let scale =
            cover_scale((800.0, 600.0), (400.0, 200.0), FRAC_PI_2, (0.0, 0.0), false).unwrap();
        // 800 wide viewport must fit the 200 texel sprite height
        assert!((scale - 4.0).abs() < 1e-9);
    }

    #[test]
    fn cover_scale_unreachable_offset() {
        assert_eq!(
            cover_scale((100.0, 100.0), (50.0, 50.0), 0.0, (30.0, 0.0), false),
            None
        );
    }

    #[test]
    fn rotation_safe_cover_uses_diagonal() {
        let plain = cover_scale((800.0, 600.0), (500.0, 500.0), 0.0, (0.0, 0.0), false).unwrap();
        let safe = cover_scale((800.0, 600.0), (500.0, 500.0), 0.0, (0.0, 0.0), true).unwrap();
        // Viewport half-diagonal 500 over the sprite's inscribed radius 250
        assert!((safe - 2.0).abs() < 1e-12);
        assert!(safe > plain);
    }

    #[test]
    fn same_view_draws_at_native_scale() {
        let view = View::new(-0.5, 0.1, 8.0, 0.3);
        let (_, frame) = PreviewState::new().step(&input(view, view), &PreviewConfig::default());
        let front = frame.front.unwrap();
        assert!((front.scale - 2.0).abs() < 1e-12);
        assert!(front.rotation.abs() < 1e-12);
        assert!((front.position.0 - 400.0).abs() < 1e-9);
        assert!((front.position.1 - 300.0).abs() < 1e-9);
        assert_eq!(frame.cover_factor, 1.0);
    }

    #[test]
    fn sprite_places_surface_center_at_its_plane_position() {
        // Surface centered 0.01 units right of the view: 0.01 * 200px/unit * zoom 1
        let view = View::new(0.0, 0.0, 1.0, 0.0);
        let surface = View::new(0.01, 0.0, 1.0, 0.0);
        let (_, frame) = PreviewState::new().step(&input(view, surface), &PreviewConfig::default());
        let front = frame.front.unwrap();
        assert!((front.position.0 - 402.0).abs() < 1e-9, "{:?}", front.position);
        assert!((front.position.1 - 300.0).abs() < 1e-9);
    }

    #[test]
    fn plane_up_is_screen_up() {
        let view = View::new(0.0, 0.0, 1.0, 0.0);
        let surface = View::new(0.0, 0.01, 1.0, 0.0);
        let (_, frame) = PreviewState::new().step(&input(view, surface), &PreviewConfig::default());
        assert!((frame.front.unwrap().position.1 - 298.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_out_past_surface_is_clamped() {
        let surface = View::new(0.0, 0.0, 100.0, 0.0);
        let view = View::new(0.0, 0.0, 50.0, 0.0);
        let (_, frame) = PreviewState::new().step(&input(view, surface), &PreviewConfig::default());
        assert!(frame.cover_factor > 1.0);
        let front = frame.front.unwrap();
        assert!(corners_covered(&front, (500.0, 500.0), (800.0, 600.0)));
        // 800 px across 500 texels
        assert!((front.scale - 1.6).abs() < 1e-9);
    }

    #[test]
    fn headroom_applies_when_zooming_out() {
        let surface = View::new(0.0, 0.0, 100.0, 0.0);
        let view = View::new(0.0, 0.0, 50.0, 0.0);
        let config = PreviewConfig::default();
        let mut zoom_out = input(view, surface);
        zoom_out.mode = ZoomMode::Out;
        let (_, frame) = PreviewState::new().step(&zoom_out, &config);
        assert!((frame.front.unwrap().scale - 1.6 * config.zoom_out_headroom).abs() < 1e-9);
    }

    #[test]
    fn rotation_is_rate_limited_and_unwrapped() {
        let config = PreviewConfig::default();
        let surface = View::new(0.0, 0.0, 1.0, 0.0);
        let (state, _) = PreviewState::new().step(&input(View::new(0.0, 0.0, 1.0, 3.1), surface), &config);
        // Target crosses the seam; displayed rotation keeps going up
        let (_, frame) = state.step(&input(View::new(0.0, 0.0, 1.0, -3.1), surface), &config);
        let max_step = config.max_preview_rot_speed_rad_per_sec / 60.0;
        let rotation = frame.front.unwrap().rotation;
        assert!(rotation > 3.1 - 1e-12 && rotation <= 3.1 + max_step + 1e-12, "{rotation}");
    }

    #[test]
    fn snapshot_holds_zoom_then_relaxes() {
        let config = PreviewConfig::default();
        let surface = View::new(0.0, 0.0, 100.0, 0.0);
        let (state, first) = PreviewState::new().step(&input(View::new(0.0, 0.0, 100.0, 0.0), surface), &config);

        // A new front computed further out arrives with a snapshot
        let new_front = View::new(0.0, 0.0, 10.0, 0.0);
        let mut next = input(View::new(0.0, 0.0, 10.0, 0.0), new_front);
        next.snapshot_cover = true;
        let (state, held) = state.step(&next, &config);
        assert!((held.displayed_view.zoom - first.displayed_view.zoom).abs() < 1e-9);

        next.snapshot_cover = false;
        let (_, relaxed) = state.step(&next, &config);
        assert!(relaxed.displayed_view.zoom < held.displayed_view.zoom);
        assert!(relaxed.displayed_view.zoom > 10.0);
    }

    #[test]
    fn crossfade_draws_back_with_alpha() {
        let config = PreviewConfig::default();
        let front = View::new(0.0, 0.0, 4.0, 0.0);
        let back = View::new(0.0, 0.0, 5.0, 0.0);
        let mut i = input(back, front);
        i.back = Some(back);
        i.back_alpha = 0.4;
        let (_, frame) = PreviewState::new().step(&i, &config);
        assert_eq!(frame.back_alpha, 0.4);
        assert!((frame.back.unwrap().scale - 2.0).abs() < 1e-9);
        assert!((frame.front.unwrap().scale - 2.5).abs() < 1e-9);
    }

    #[test]
    fn rotated_offset_surface_still_covers() {
        let config = PreviewConfig::default();
        let surface = View::new(0.2, -0.1, 20.0, FRAC_PI_4);
        let view = View::new(0.2003, -0.1002, 15.0, 0.2);
        let (_, frame) = PreviewState::new().step(&input(view, surface), &config);
        assert!(corners_covered(&frame.front.unwrap(), (500.0, 500.0), (800.0, 600.0)));
    }
}
