use fractaldrift_core::{PreviewConfig, View};
use fractaldrift_pipeline::{cover_scale, PreviewInput, PreviewState, SpriteTransform, ZoomMode};
use proptest::prelude::*;
use std::f64::consts::PI;

fn uncovered_corners(sprite: &SpriteTransform, size: (f64, f64), viewport: (f64, f64)) -> usize {
    let eps = 1e-7 * size.0.max(size.1);
    [(0.0, 0.0), (viewport.0, 0.0), (0.0, viewport.1), viewport]
        .into_iter()
        .filter(|&corner| {
            let (tx, ty) = sprite.screen_to_texel(corner);
            tx < -eps || tx > size.0 + eps || ty < -eps || ty > size.1 + eps
        })
        .count()
}

fn sprite_at(scale: f64, rotation: f64, offset: (f64, f64), size: (f64, f64), viewport: (f64, f64)) -> SpriteTransform {
    SpriteTransform {
        pivot: (size.0 / 2.0, size.1 / 2.0),
        position: (
            viewport.0 / 2.0 + scale * offset.0,
            viewport.1 / 2.0 + scale * offset.1,
        ),
        rotation,
        scale,
    }
}

proptest! {
    #[test]
    fn cover_scale_is_tight(
        viewport in (16.0f64..2000.0, 16.0f64..2000.0),
        sprite in (16.0f64..2000.0, 16.0f64..2000.0),
        rotation in -PI..PI,
        offset in (-0.3f64..0.3, -0.3f64..0.3),
    ) {
        let half_short = sprite.0.min(sprite.1) / 2.0;
        let offset = (offset.0 * half_short, offset.1 * half_short);
        if let Some(scale) = cover_scale(viewport, sprite, rotation, offset, false) {
            let at = sprite_at(scale, rotation, offset, sprite, viewport);
            prop_assert_eq!(uncovered_corners(&at, sprite, viewport), 0);
            let below = sprite_at(scale * 0.99, rotation, offset, sprite, viewport);
            prop_assert!(uncovered_corners(&below, sprite, viewport) > 0);
        }
    }

    #[test]
    fn rotation_safe_scale_covers_every_rotation(
        viewport in (16.0f64..2000.0, 16.0f64..2000.0),
        side in 16.0f64..2000.0,
        rotation in -PI..PI,
        spin in -PI..PI,
    ) {
        let sprite = (side, side);
        let scale = cover_scale(viewport, sprite, rotation, (0.0, 0.0), true).unwrap();
        let spun = sprite_at(scale, rotation + spin, (0.0, 0.0), sprite, viewport);
        prop_assert_eq!(uncovered_corners(&spun, sprite, viewport), 0);
    }

    #[test]
    fn stale_surface_always_covers_the_viewport(
        viewport in (64u32..1600, 64u32..1600),
        render_scale in 0.25f64..2.0,
        surface_zoom in 0.0f64..12.0,
        zoom_ratio in 0.2f64..4.0,
        surface_rotation in -PI..PI,
        turn in -PI..PI,
        pan in (-0.05f64..0.05, -0.05f64..0.05),
        zooming_out in any::<bool>(),
    ) {
        let (w, h) = viewport;
        let side = ((w as f64).hypot(h as f64) * render_scale).ceil() as u32;
        let base_span = 3.0;
        let surface = View::new(-0.5, 0.0, surface_zoom.exp(), surface_rotation);

        // Pan by a fraction of the surface's plane extent
        let extent = base_span / w.min(h) as f64 / surface.zoom * (side as f64 / render_scale);
        let view = View::new(
            surface.center_x + pan.0 * extent,
            surface.center_y + pan.1 * extent,
            (surface.zoom * zoom_ratio).max(1.0),
            surface.rotation + turn,
        );

        let input = PreviewInput {
            viewport,
            surface: (side, side),
            render_scale,
            base_span,
            mode: if zooming_out { ZoomMode::Out } else { ZoomMode::In },
            view,
            front: Some(surface),
            back: None,
            back_alpha: 0.0,
            dt: 1.0 / 60.0,
            snapshot_cover: false,
        };
        let (_, frame) = PreviewState::new().step(&input, &PreviewConfig::default());

        let sprite = frame.front.unwrap();
        prop_assert!(frame.cover_factor >= 1.0);
        prop_assert!(frame.displayed_view.zoom >= view.zoom);
        prop_assert_eq!(
            uncovered_corners(&sprite, (side as f64, side as f64), (w as f64, h as f64)),
            0
        );
    }
}
