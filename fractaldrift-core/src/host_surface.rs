//! Memory-backed surfaces for headless hosts and tests.

use crate::error::SurfaceError;
use crate::surface::{PresentSurface, SurfaceAllocator, SurfaceFormat};

/// Allocates [`HostSurface`]s. An optional dimension limit emulates a
/// device's maximum texture size.
#[derive(Clone, Debug, Default)]
pub struct HostSurfaceAllocator {
    pub max_dimension: Option<u32>,
    allocated: u32,
}

impl HostSurfaceAllocator {
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: Some(max_dimension),
            allocated: 0,
        }
    }

    /// Surfaces handed out so far.
    pub fn allocated(&self) -> u32 {
        self.allocated
    }
}

impl SurfaceAllocator for HostSurfaceAllocator {
    type Surface = HostSurface;

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        format: SurfaceFormat,
    ) -> Result<HostSurface, SurfaceError> {
        if let Some(max) = self.max_dimension {
            if width > max || height > max {
                return Err(SurfaceError::AllocationFailed {
                    width,
                    height,
                    reason: format!("exceeds maximum dimension {max}"),
                });
            }
        }
        self.allocated += 1;
        Ok(HostSurface {
            width,
            height,
            format,
            staged: Vec::new(),
            presented: Vec::new(),
            flushes: 0,
            destroyed: false,
        })
    }
}

/// A surface whose "presented" texels live in memory.
#[derive(Clone, Debug)]
pub struct HostSurface {
    width: u32,
    height: u32,
    format: SurfaceFormat,
    staged: Vec<u16>,
    presented: Vec<u16>,
    flushes: u32,
    destroyed: bool,
}

impl HostSurface {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    /// Texels visible after the last flush.
    pub fn texels(&self) -> &[u16] {
        &self.presented
    }

    pub fn flush_count(&self) -> u32 {
        self.flushes
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl PresentSurface for HostSurface {
    fn write(&mut self, texels: &[u16]) {
        self.staged.clear();
        self.staged.extend_from_slice(texels);
    }

    fn flush(&mut self) {
        std::mem::swap(&mut self.presented, &mut self.staged);
        self.staged.clear();
        self.flushes += 1;
    }

    fn destroy(&mut self) {
        self.staged = Vec::new();
        self.presented = Vec::new();
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_become_visible_on_flush() {
        let mut allocator = HostSurfaceAllocator::default();
        let mut surface = allocator.allocate(2, 1, SurfaceFormat::R16Float).unwrap();
        surface.write(&[1, 2]);
        assert!(surface.texels().is_empty());
        surface.flush();
        assert_eq!(surface.texels(), &[1, 2]);
        assert_eq!(surface.flush_count(), 1);
    }

    #[test]
    fn dimension_limit_fails_allocation() {
        let mut allocator = HostSurfaceAllocator::with_max_dimension(64);
        let err = allocator.allocate(65, 10, SurfaceFormat::R16Float).unwrap_err();
        assert!(matches!(err, SurfaceError::AllocationFailed { width: 65, .. }));
        assert_eq!(allocator.allocated(), 0);
    }

    #[test]
    fn destroy_releases_texels() {
        let mut allocator = HostSurfaceAllocator::default();
        let mut surface = allocator.allocate(1, 1, SurfaceFormat::R16Float).unwrap();
        surface.write(&[7]);
        surface.flush();
        surface.destroy();
        assert!(surface.is_destroyed());
        assert!(surface.texels().is_empty());
    }
}
