//! Tests for the texture backend. Skipped when no adapter is present.

use crate::{GpuAvailability, GpuContext, GpuSurfaceAllocator};
use fractaldrift_core::{
    encode_f16, EscapeSurface, PresentSurface, SurfaceAllocator, SurfaceError, SurfaceFormat,
    INSIDE_SET, UNCOMPUTED,
};
use std::sync::Arc;

fn allocator() -> Option<GpuSurfaceAllocator> {
    match pollster::block_on(GpuContext::try_init()) {
        GpuAvailability::Available(ctx) => Some(GpuSurfaceAllocator::new(Arc::new(ctx))),
        GpuAvailability::Unavailable(reason) => {
            println!("Skipping test: no GPU available ({reason})");
            None
        }
    }
}

/// Test that GPU initialization doesn't panic.
#[test]
fn gpu_init_does_not_panic() {
    pollster::block_on(async {
        match GpuContext::try_init().await {
            GpuAvailability::Available(ctx) => {
                println!("GPU available, max texture {}", ctx.max_texture_dimension());
            }
            GpuAvailability::Unavailable(reason) => {
                println!("GPU unavailable: {reason}");
            }
        }
    });
}

#[test]
fn uploaded_texels_read_back_unchanged() {
    let Some(mut allocator) = allocator() else {
        return;
    };
    // Odd width exercises the row padding in readback
    let mut surface = EscapeSurface::allocate(&mut allocator, 37, 9).unwrap();
    for y in 0..9 {
        for x in 0..37 {
            let value = if (x + y) % 5 == 0 {
                INSIDE_SET
            } else {
                (x * 9 + y) as f32 / 400.0
            };
            surface.set(x, y, value);
        }
    }
    assert!(surface.upload());

    let texels = pollster::block_on(surface.present_surface().read_back()).unwrap();
    assert_eq!(texels, surface.texels());
}

#[test]
fn fresh_surface_uploads_uncomputed_sentinel() {
    let Some(mut allocator) = allocator() else {
        return;
    };
    let mut surface = EscapeSurface::allocate(&mut allocator, 16, 16).unwrap();
    surface.upload();
    let texels = pollster::block_on(surface.present_surface().read_back()).unwrap();
    assert!(texels.iter().all(|&bits| bits == encode_f16(UNCOMPUTED)));
}

#[test]
fn oversized_surface_fails_allocation() {
    let Some(mut allocator) = allocator() else {
        return;
    };
    let too_big = allocator.context().max_texture_dimension() + 1;
    let result = EscapeSurface::allocate(&mut allocator, too_big, 4);
    assert!(matches!(
        result,
        Err(SurfaceError::AllocationFailed { width, .. }) if width == too_big
    ));
    assert_eq!(allocator.allocated(), 0);
}

#[test]
fn destroyed_texture_refuses_readback() {
    let Some(mut allocator) = allocator() else {
        return;
    };
    let mut texture = allocator.allocate(8, 8, SurfaceFormat::R16Float).unwrap();
    texture.destroy();
    texture.destroy();
    assert!(texture.is_destroyed());
    assert!(pollster::block_on(texture.read_back()).is_err());
}
