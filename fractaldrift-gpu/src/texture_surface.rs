//! R16Float textures backing escape surfaces.

use crate::device::GpuContext;
use crate::error::GpuError;
use fractaldrift_core::{PresentSurface, SurfaceAllocator, SurfaceError, SurfaceFormat};
use std::sync::Arc;

fn texture_format(format: SurfaceFormat) -> wgpu::TextureFormat {
    match format {
        SurfaceFormat::R16Float => wgpu::TextureFormat::R16Float,
    }
}

/// Allocates [`GpuEscapeTexture`]s on a shared device.
pub struct GpuSurfaceAllocator {
    context: Arc<GpuContext>,
    allocated: u32,
}

impl GpuSurfaceAllocator {
    pub fn new(context: Arc<GpuContext>) -> Self {
        Self {
            context,
            allocated: 0,
        }
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    /// Textures created so far.
    pub fn allocated(&self) -> u32 {
        self.allocated
    }
}

impl SurfaceAllocator for GpuSurfaceAllocator {
    type Surface = GpuEscapeTexture;

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        format: SurfaceFormat,
    ) -> Result<GpuEscapeTexture, SurfaceError> {
        let max = self.context.max_texture_dimension();
        if width > max || height > max {
            return Err(SurfaceError::AllocationFailed {
                width,
                height,
                reason: format!("device limit is {max}x{max}"),
            });
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("escape_surface"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(format),
            usage: wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.allocated += 1;

        log::debug!("Allocated {width}x{height} {format:?} texture");

        Ok(GpuEscapeTexture {
            context: Arc::clone(&self.context),
            texture,
            view,
            size,
            format,
            pending_writes: 0,
            destroyed: false,
        })
    }
}

/// One escape surface as a sampled GPU texture.
pub struct GpuEscapeTexture {
    context: Arc<GpuContext>,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: wgpu::Extent3d,
    format: SurfaceFormat,
    pending_writes: u32,
    destroyed: bool,
}

impl GpuEscapeTexture {
    /// View for binding in the external recoloring shader.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Copy the texture back to host memory as half-float bits.
    pub async fn read_back(&self) -> Result<Vec<u16>, GpuError> {
        if self.destroyed {
            return Err(GpuError::Unavailable("texture destroyed".into()));
        }

        let bytes_per_texel = self.format.bytes_per_texel();
        let unpadded_row = self.size.width * bytes_per_texel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = unpadded_row.div_ceil(align) * align;

        let device = &self.context.device;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("escape_surface_readback"),
            size: padded_row as u64 * self.size.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("escape_surface_readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(self.size.height),
                },
            },
            self.size,
        );
        self.context.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures_channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        #[cfg(not(target_arch = "wasm32"))]
        device.poll(wgpu::Maintain::Wait);

        rx.await
            .map_err(|_| GpuError::Unavailable("Channel closed".into()))?
            .map_err(GpuError::BufferMap)?;

        let texels = {
            let mapped = slice.get_mapped_range();
            let mut texels = Vec::with_capacity((self.size.width * self.size.height) as usize);
            for row in mapped.chunks_exact(padded_row as usize) {
                let row: &[u16] = bytemuck::cast_slice(&row[..unpadded_row as usize]);
                texels.extend_from_slice(row);
            }
            texels
        };
        staging.unmap();

        Ok(texels)
    }
}

impl PresentSurface for GpuEscapeTexture {
    fn write(&mut self, texels: &[u16]) {
        if self.destroyed {
            return;
        }
        let expected = self.size.width as usize * self.size.height as usize;
        if texels.len() != expected {
            log::warn!(
                "Ignoring texture write of {} texels into {}x{} surface",
                texels.len(),
                self.size.width,
                self.size.height
            );
            return;
        }

        self.context.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.size.width * self.format.bytes_per_texel()),
                rows_per_image: Some(self.size.height),
            },
            self.size,
        );
        self.pending_writes += 1;
    }

    fn flush(&mut self) {
        if self.destroyed || self.pending_writes == 0 {
            return;
        }
        self.context.queue.submit(std::iter::empty());
        self.pending_writes = 0;
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.texture.destroy();
            self.destroyed = true;
        }
    }
}
