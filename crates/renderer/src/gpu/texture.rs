use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, bail, Context, Result};
use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wgpu::util::DeviceExt;

use crate::types::Size;

use super::context::GpuContext;

/// Every state texture is 8-bit RGBA, stored without sRGB conversion so
/// simulation values survive a round trip unchanged.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a texture. Reallocating the backing store on resize
/// keeps the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// GPU image used as a data buffer by the compute passes.
///
/// Textures are never mipmapped and are always sampled with nearest
/// filtering and repeat wrapping (see [`GpuContext`]'s shared sampler).
pub struct Texture {
    handle: Handle,
    generation: u32,
    label: String,
    size: Size,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle)
            .field("label", &self.label)
            .field("size", &self.size)
            .finish()
    }
}

impl Texture {
    /// Uploads `image` as a new texture.
    pub fn from_image(ctx: &GpuContext, label: &str, image: &RgbaImage) -> Result<Self> {
        let size = Size::new(image.width(), image.height());
        let (texture, view) = allocate(ctx, label, size, image.as_raw())?;
        Ok(Self {
            handle: Handle::next(),
            generation: 0,
            label: label.to_string(),
            size,
            texture,
            view,
        })
    }

    /// Transparent black texture.
    pub fn blank(ctx: &GpuContext, label: &str, size: Size) -> Result<Self> {
        let size = size.at_least_one();
        Self::from_image(ctx, label, &RgbaImage::new(size.width, size.height))
    }

    /// Texture seeded with [`noise_image`].
    pub fn noise(ctx: &GpuContext, label: &str, size: Size, seed: u64) -> Result<Self> {
        Self::from_image(ctx, label, &noise_image(size.at_least_one(), seed))
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Bumped whenever the backing store is reallocated.
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        TEXTURE_FORMAT
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Replaces the texture contents. A differently sized image reallocates
    /// the backing store.
    pub fn write_image(&mut self, ctx: &GpuContext, image: &RgbaImage) -> Result<()> {
        let size = Size::new(image.width(), image.height());
        if size != self.size {
            let (texture, view) = allocate(ctx, &self.label, size, image.as_raw())?;
            self.texture = texture;
            self.view = view;
            self.size = size;
            self.generation = self.generation.wrapping_add(1);
            return Ok(());
        }
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: Some(size.height),
            },
            extent(size),
        );
        Ok(())
    }

    /// Resamples the current contents into `size` with nearest-neighbour
    /// sampling and re-uploads them. The aspect ratio is not preserved.
    pub fn resize(&mut self, ctx: &GpuContext, size: Size) -> Result<()> {
        if size.at_least_one() == self.size {
            return Ok(());
        }
        *self = self.resampled(ctx, size)?;
        Ok(())
    }

    /// Copy of this texture resampled into `size`. The handle is kept and the
    /// generation bumped, so the copy replaces `self` wherever it was bound.
    pub(crate) fn resampled(&self, ctx: &GpuContext, size: Size) -> Result<Texture> {
        let size = size.at_least_one();
        let current = self
            .read_pixels(ctx)
            .with_context(|| format!("failed to read back texture `{}` for resize", self.label))?;
        let resampled = resample(&current, size);
        let (texture, view) = allocate(ctx, &self.label, size, resampled.as_raw())?;
        tracing::trace!(texture = %self.label, %size, "resized texture");
        Ok(Self {
            handle: self.handle,
            generation: self.generation.wrapping_add(1),
            label: self.label.clone(),
            size,
            texture,
            view,
        })
    }

    /// Synchronously copies the texture back to the CPU.
    ///
    /// Commands recorded in an unfinished [`Frame`](super::Frame) are not
    /// visible here; finish the frame first.
    pub fn read_pixels(&self, ctx: &GpuContext) -> Result<RgbaImage> {
        let Size { width, height } = self.size;
        let unpadded_bytes_per_row = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent(self.size),
        );
        ctx.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        ctx.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("failed waiting for GPU readback: {err}"))?;
        receiver
            .recv()
            .map_err(|_| anyhow!("failed receiving GPU map callback"))?
            .context("GPU buffer mapping failed")?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in mapped
            .chunks(padded_bytes_per_row as usize)
            .take(height as usize)
        {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(mapped);
        buffer.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("readback of `{}` returned a short buffer", self.label))
    }
}

fn allocate(
    ctx: &GpuContext,
    label: &str,
    size: Size,
    data: &[u8],
) -> Result<(wgpu::Texture, wgpu::TextureView)> {
    let max = ctx.max_texture_dimension();
    if size.is_empty() || size.width > max || size.height > max {
        bail!("texture `{label}` size {size} is outside 1..={max}");
    }
    let texture = ctx.device.create_texture_with_data(
        &ctx.queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        data,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok((texture, view))
}

fn extent(size: Size) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}

/// Nearest-neighbour resample: each destination texel takes the source
/// texel under its center, so fractional coordinates keep pointing at the
/// same cell.
pub fn resample(image: &RgbaImage, size: Size) -> RgbaImage {
    let (src_w, src_h) = image.dimensions();
    if src_w == size.width && src_h == size.height {
        return image.clone();
    }
    RgbaImage::from_fn(size.width, size.height, |x, y| {
        let sx = source_index(x, size.width, src_w);
        let sy = source_index(y, size.height, src_h);
        *image.get_pixel(sx, sy)
    })
}

fn source_index(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    let center = (u64::from(dst) * 2 + 1) * u64::from(src_len);
    let index = center / (u64::from(dst_len) * 2);
    (index as u32).min(src_len.saturating_sub(1))
}

/// Random RGB noise with opaque alpha; roughly half the cells read as alive.
pub fn noise_image(size: Size, seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbaImage::from_fn(size.width, size.height, |_, _| {
        image::Rgba([rng.gen(), rng.gen(), rng.gen(), u8::MAX])
    })
}

/// Horizontal black-to-white ramp, used as a neutral seed.
pub fn gradient_image(size: Size) -> RgbaImage {
    let span = size.width.saturating_sub(1).max(1);
    RgbaImage::from_fn(size.width, size.height, |x, _| {
        let value = (x * 255 / span) as u8;
        image::Rgba([value, value, value, u8::MAX])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(size: Size) -> RgbaImage {
        RgbaImage::from_fn(size.width, size.height, |x, y| {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            image::Rgba([v, 0, 0, 255])
        })
    }

    #[test]
    fn resample_keeps_fractional_coordinates_on_the_same_cell() {
        let source = checker(Size::new(8, 8));
        let doubled = resample(&source, Size::new(16, 16));
        for (u, v) in [(0.1, 0.1), (0.33, 0.71), (0.9, 0.45)] {
            let before = source.get_pixel((u * 8.0) as u32, (v * 8.0) as u32);
            let after = doubled.get_pixel((u * 16.0) as u32, (v * 16.0) as u32);
            assert_eq!(before, after, "mismatch at ({u}, {v})");
        }
    }

    #[test]
    fn resample_down_picks_center_texels() {
        let source = RgbaImage::from_fn(4, 1, |x, _| image::Rgba([x as u8, 0, 0, 255]));
        let halved = resample(&source, Size::new(2, 1));
        assert_eq!(halved.get_pixel(0, 0).0[0], 1);
        assert_eq!(halved.get_pixel(1, 0).0[0], 3);
    }

    #[test]
    fn resample_to_same_size_is_identity() {
        let source = checker(Size::new(5, 3));
        assert_eq!(resample(&source, Size::new(5, 3)), source);
    }

    #[test]
    fn noise_is_deterministic_per_seed() {
        let a = noise_image(Size::new(16, 16), 7);
        let b = noise_image(Size::new(16, 16), 7);
        let c = noise_image(Size::new(16, 16), 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn handles_are_unique() {
        assert_ne!(Handle::next(), Handle::next());
    }

    #[test]
    fn gradient_spans_full_range() {
        let ramp = gradient_image(Size::new(3, 1));
        assert_eq!(ramp.get_pixel(0, 0).0[0], 0);
        assert_eq!(ramp.get_pixel(2, 0).0[0], 255);
    }
}
