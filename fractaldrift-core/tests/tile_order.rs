use fractaldrift_core::{spiral_tile_order, TileGrid, DEFAULT_SPIRAL_TIGHTNESS};
use proptest::prelude::*;

proptest! {
    #[test]
    fn spiral_order_is_a_permutation(tiles_w in 1u32..40, tiles_h in 1u32..40, tightness in 0.0f64..2.0) {
        let mut order = spiral_tile_order(tiles_w, tiles_h, tightness);
        order.sort_unstable();
        let expected: Vec<u32> = (0..tiles_w * tiles_h).collect();
        prop_assert_eq!(order, expected);
    }

    #[test]
    fn spiral_order_is_deterministic(tiles_w in 1u32..24, tiles_h in 1u32..24) {
        let a = spiral_tile_order(tiles_w, tiles_h, DEFAULT_SPIRAL_TIGHTNESS);
        let b = spiral_tile_order(tiles_w, tiles_h, DEFAULT_SPIRAL_TIGHTNESS);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn grid_tiles_stay_inside_surface(width in 1u32..500, height in 1u32..500, tile_size in 1u32..64) {
        let grid = TileGrid::new(width, height, tile_size);
        for index in 0..grid.tile_count() {
            let rect = grid.tile_rect(index);
            prop_assert!(rect.width >= 1 && rect.height >= 1);
            prop_assert!(rect.right() <= width && rect.bottom() <= height);
        }
    }
}

#[test]
fn first_tile_is_nearest_center_on_wide_grid() {
    let grid = TileGrid::new(1920 / 2, 1080 / 2, 16);
    let order = spiral_tile_order(grid.tiles_w, grid.tiles_h, DEFAULT_SPIRAL_TIGHTNESS);
    let (cx, cy) = grid.tile_rect(order[0]).center();
    assert!((cx - 480.0).abs() <= 16.0, "first tile x {cx}");
    assert!((cy - 270.0).abs() <= 16.0, "first tile y {cy}");
}
