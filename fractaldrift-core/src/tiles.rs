//! Tile grid and spiral visiting order.
//!
//! A pass fills its surface tile by tile. Tiles are visited along a spiral
//! around the grid center so the middle of the image is ready first.

use crate::PixelRect;
use std::f64::consts::{FRAC_1_PI, TAU};

/// Spiral tightness giving one tile of radius per revolution.
pub const DEFAULT_SPIRAL_TIGHTNESS: f64 = FRAC_1_PI / 2.0;

/// Fixed-size tiles covering a `width x height` surface.
///
/// Edge tiles are clipped to the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub tiles_w: u32,
    pub tiles_h: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        Self {
            width,
            height,
            tile_size,
            tiles_w: width.div_ceil(tile_size),
            tiles_h: height.div_ceil(tile_size),
        }
    }

    pub fn tile_count(&self) -> u32 {
        self.tiles_w * self.tiles_h
    }

    /// Pixel rectangle of the tile at grid index `index` (row-major).
    pub fn tile_rect(&self, index: u32) -> PixelRect {
        let tx = index % self.tiles_w.max(1);
        let ty = index / self.tiles_w.max(1);
        let x = tx * self.tile_size;
        let y = ty * self.tile_size;
        PixelRect::new(
            x,
            y,
            self.tile_size.min(self.width.saturating_sub(x)),
            self.tile_size.min(self.height.saturating_sub(y)),
        )
    }
}

/// Visiting order over all `tiles_w * tiles_h` tiles.
///
/// Tiles are sorted by `r + tightness * theta`, where `r` is the distance
/// (in tiles) from the grid center and `theta` in [0, 2*PI) is measured
/// clockwise from straight up. Starting at the top instead of the +x axis
/// keeps the progressive fill from leaning to one side.
pub fn spiral_tile_order(tiles_w: u32, tiles_h: u32, tightness: f64) -> Vec<u32> {
    let center_x = tiles_w as f64 / 2.0;
    let center_y = tiles_h as f64 / 2.0;
    let tightness = if tightness.is_finite() { tightness.max(0.0) } else { 0.0 };

    let mut keyed: Vec<(f64, u32)> = (0..tiles_h)
        .flat_map(|ty| (0..tiles_w).map(move |tx| (tx, ty)))
        .map(|(tx, ty)| {
            let dx = tx as f64 + 0.5 - center_x;
            let dy = ty as f64 + 0.5 - center_y;
            let r = dx.hypot(dy);
            // Screen y points down: up is -dy, clockwise is +dx.
            let theta = dx.atan2(-dy).rem_euclid(TAU);
            (r + tightness * theta, ty * tiles_w + tx)
        })
        .collect();

    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, index)| index).collect()
}

/// Caches the spiral order for the current grid dimensions.
#[derive(Clone, Debug, Default)]
pub struct TileScheduler {
    dims: Option<(u32, u32)>,
    tightness: f64,
    order: Vec<u32>,
}

impl TileScheduler {
    pub fn new(tightness: f64) -> Self {
        Self {
            dims: None,
            tightness,
            order: Vec::new(),
        }
    }

    /// Order for a `tiles_w x tiles_h` grid; recomputed only when the
    /// dimensions change.
    pub fn order(&mut self, tiles_w: u32, tiles_h: u32) -> &[u32] {
        if self.dims != Some((tiles_w, tiles_h)) {
            self.order = spiral_tile_order(tiles_w, tiles_h, self.tightness);
            self.dims = Some((tiles_w, tiles_h));
        }
        &self.order
    }

    /// Forget the cached order.
    pub fn reset(&mut self) {
        self.dims = None;
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_counts_partial_tiles() {
        let grid = TileGrid::new(100, 40, 16);
        assert_eq!(grid.tiles_w, 7);
        assert_eq!(grid.tiles_h, 3);
        assert_eq!(grid.tile_count(), 21);
    }

    #[test]
    fn edge_tiles_are_clipped() {
        let grid = TileGrid::new(100, 40, 16);
        let last = grid.tile_rect(grid.tile_count() - 1);
        assert_eq!(last, PixelRect::new(96, 32, 4, 8));
    }

    #[test]
    fn tiles_cover_surface_exactly() {
        let grid = TileGrid::new(70, 33, 16);
        let total: u32 = (0..grid.tile_count()).map(|i| grid.tile_rect(i).area()).sum();
        assert_eq!(total, 70 * 33);
    }

    #[test]
    fn spiral_starts_at_center() {
        let order = spiral_tile_order(5, 5, DEFAULT_SPIRAL_TIGHTNESS);
        assert_eq!(order[0], 12);
    }

    #[test]
    fn spiral_visits_inner_ring_before_corners() {
        let order = spiral_tile_order(5, 5, DEFAULT_SPIRAL_TIGHTNESS);
        let position = |index: u32| order.iter().position(|&i| i == index).unwrap();
        let inner = [6, 7, 8, 11, 13, 16, 17, 18];
        let corners = [0, 4, 20, 24];
        let last_inner = inner.iter().map(|&i| position(i)).max().unwrap();
        let first_corner = corners.iter().map(|&i| position(i)).min().unwrap();
        assert!(last_inner < first_corner);
    }

    #[test]
    fn spiral_begins_ring_at_top() {
        // On an even grid the four central tiles tie on radius; the one
        // straight up and clockwise of center (top-right) comes first.
        let order = spiral_tile_order(4, 4, DEFAULT_SPIRAL_TIGHTNESS);
        assert_eq!(order[0], 6);
    }

    #[test]
    fn scheduler_caches_until_dimensions_change() {
        let mut scheduler = TileScheduler::new(DEFAULT_SPIRAL_TIGHTNESS);
        let first = scheduler.order(3, 3).to_vec();
        assert_eq!(scheduler.order(3, 3), first.as_slice());
        assert_eq!(scheduler.order(4, 2).len(), 8);
    }

    #[test]
    fn single_tile_grid() {
        assert_eq!(spiral_tile_order(1, 1, DEFAULT_SPIRAL_TIGHTNESS), vec![0]);
    }
}
