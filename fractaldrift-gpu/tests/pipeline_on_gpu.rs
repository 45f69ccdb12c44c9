//! The frame loop driving real textures. Skipped when no adapter is present.

use fractaldrift_core::{ManualClock, PipelineConfig};
use fractaldrift_gpu::{GpuAvailability, GpuContext, GpuSurfaceAllocator};
use fractaldrift_pipeline::FractalDrift;
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

#[test]
fn finished_pass_is_on_the_front_texture() {
    let Some(allocator) = allocator() else {
        return;
    };
    let mut drift = FractalDrift::new(allocator, PipelineConfig::default(), 96, 64)
        .unwrap()
        .with_clock(ManualClock::new(0.0));

    assert!(drift.step(1.0 / 60.0, 0.0).drew);
    let front = drift.front_surface();
    let texels = pollster::block_on(front.present_surface().read_back()).unwrap();
    assert_eq!(texels, front.texels());
}

#[test]
fn resize_replaces_textures() {
    let Some(allocator) = allocator() else {
        return;
    };
    let mut drift = FractalDrift::new(allocator, PipelineConfig::default(), 96, 64)
        .unwrap()
        .with_clock(ManualClock::new(0.0));
    drift.step(1.0 / 60.0, 0.0);

    drift.resize(48, 48).unwrap();
    assert_eq!(drift.allocator().allocated(), 4);
    let (w, h) = drift.surface_dimensions();
    assert_eq!(drift.front_surface().present_surface().dimensions(), (w, h));

    assert!(drift.step(1.0 / 60.0, 16.0).drew);
    let front = drift.front_surface();
    let texels = pollster::block_on(front.present_surface().read_back()).unwrap();
    assert_eq!(texels, front.texels());
}
