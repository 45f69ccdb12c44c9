//! wgpu backend for escape surfaces.

mod device;
mod error;
mod texture_surface;
#[cfg(test)]
mod tests;

pub use device::{GpuAvailability, GpuContext};
pub use error::GpuError;
pub use texture_surface::{GpuEscapeTexture, GpuSurfaceAllocator};
