//! Escape surfaces: dense grids of normalized escape-time samples.
//!
//! Each surface keeps a CPU mirror of half-float texels and a presentable
//! backend surface (a GPU texture, or plain memory when headless). The
//! mirror is authoritative; `upload()` pushes it to the backend.

use crate::error::SurfaceError;
use crate::half_float::{decode_f16, encode_f16};
use serde::{Deserialize, Serialize};

/// Written into every texel when a pass starts.
pub const UNCOMPUTED: f32 = -1000.0;
/// Values below this have not been computed in the current pass.
pub const UNCOMPUTED_THRESHOLD: f32 = -500.0;
/// Point never escaped within the iteration budget.
pub const INSIDE_SET: f32 = -1.0;

/// Decoded meaning of one texel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EscapeSample {
    Uncomputed,
    Inside,
    /// Normalized escape time in [0, 1].
    Escaped(f32),
}

impl EscapeSample {
    pub fn from_value(value: f32) -> Self {
        if value < UNCOMPUTED_THRESHOLD {
            Self::Uncomputed
        } else if value < 0.0 {
            Self::Inside
        } else {
            Self::Escaped(value)
        }
    }

    pub fn to_value(self) -> f32 {
        match self {
            Self::Uncomputed => UNCOMPUTED,
            Self::Inside => INSIDE_SET,
            Self::Escaped(t) => t,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceFormat {
    /// Single channel half float.
    R16Float,
}

impl SurfaceFormat {
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R16Float => 2,
        }
    }
}

/// A presentable surface owned by some backend.
pub trait PresentSurface {
    /// Stage a full-surface texel buffer (row-major, half-float bits).
    fn write(&mut self, texels: &[u16]);
    /// Make staged writes visible to the presenter.
    fn flush(&mut self);
    /// Release backend resources. The surface must not be used afterwards.
    fn destroy(&mut self);
}

/// Creates presentable surfaces.
pub trait SurfaceAllocator {
    type Surface: PresentSurface;

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        format: SurfaceFormat,
    ) -> Result<Self::Surface, SurfaceError>;
}

/// Width x height escape-time samples plus their presentable surface.
pub struct EscapeSurface<S: PresentSurface> {
    width: u32,
    height: u32,
    texels: Vec<u16>,
    surface: S,
    dirty: bool,
    uploads: u64,
}

impl<S: PresentSurface> EscapeSurface<S> {
    /// Allocate a surface through `allocator`. Every texel starts uncomputed.
    pub fn allocate<A>(allocator: &mut A, width: u32, height: u32) -> Result<Self, SurfaceError>
    where
        A: SurfaceAllocator<Surface = S>,
    {
        if width == 0 || height == 0 {
            return Err(SurfaceError::InvalidDimensions { width, height });
        }
        let surface = allocator.allocate(width, height, SurfaceFormat::R16Float)?;
        let len = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            texels: vec![encode_f16(UNCOMPUTED); len],
            surface,
            dirty: true,
            uploads: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.texels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texels.is_empty()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Store a normalized value at `(x, y)` with half-float precision.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let idx = self.index(x, y);
        self.texels[idx] = encode_f16(value);
        self.dirty = true;
    }

    /// Value at `(x, y)` as stored (after half-float rounding).
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        decode_f16(self.texels[self.index(x, y)])
    }

    pub fn sample(&self, x: u32, y: u32) -> EscapeSample {
        EscapeSample::from_value(self.get(x, y))
    }

    /// Reset every texel to the uncomputed sentinel.
    pub fn fill_uncomputed(&mut self) {
        self.texels.fill(encode_f16(UNCOMPUTED));
        self.dirty = true;
    }

    /// Number of texels holding a value computed in the current pass.
    pub fn computed_count(&self) -> usize {
        self.texels
            .iter()
            .filter(|&&bits| decode_f16(bits) >= UNCOMPUTED_THRESHOLD)
            .count()
    }

    /// Raw half-float texels, row-major.
    pub fn texels(&self) -> &[u16] {
        &self.texels
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of completed uploads since allocation.
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    /// Push the CPU mirror to the presentable surface if it changed.
    ///
    /// Returns true if an upload happened.
    pub fn upload(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.surface.write(&self.texels);
        self.surface.flush();
        self.dirty = false;
        self.uploads += 1;
        true
    }

    pub fn present_surface(&self) -> &S {
        &self.surface
    }

    /// Release the backend surface.
    pub fn destroy(mut self) {
        self.surface.destroy();
    }
}

/// The front (displayed) and back (being computed) surfaces.
///
/// Roles are exchanged with `swap`; texel data is never copied between them.
pub struct SurfacePair<S: PresentSurface> {
    front: EscapeSurface<S>,
    back: EscapeSurface<S>,
}

impl<S: PresentSurface> SurfacePair<S> {
    pub fn allocate<A>(allocator: &mut A, width: u32, height: u32) -> Result<Self, SurfaceError>
    where
        A: SurfaceAllocator<Surface = S>,
    {
        let front = EscapeSurface::allocate(allocator, width, height)?;
        let back = match EscapeSurface::allocate(allocator, width, height) {
            Ok(back) => back,
            Err(e) => {
                front.destroy();
                return Err(e);
            }
        };
        Ok(Self { front, back })
    }

    pub fn front(&self) -> &EscapeSurface<S> {
        &self.front
    }

    pub fn back(&self) -> &EscapeSurface<S> {
        &self.back
    }

    pub fn back_mut(&mut self) -> &mut EscapeSurface<S> {
        &mut self.back
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.front.width(), self.front.height())
    }

    pub fn destroy(self) {
        self.front.destroy();
        self.back.destroy();
    }
}
