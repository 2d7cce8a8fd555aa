//! GPU textures.
//!
//! Colour maps are decoded with the `image` crate into `Rgba8UnormSrgb`; HDR
//! panoramas keep their 32-bit float data. Sampling state is not part of a
//! [`GpuTexture`]: every material binds the uploader's shared sampler.

use anyhow::Context as _;
use image::{DynamicImage, ImageFormat};

#[derive(Clone, Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl GpuTexture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    fn allocate(
        device: &wgpu::Device,
        label: &str,
        (width, height): (u32, u32),
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Creates a sampled texture and fills it with tightly packed `texels`.
    fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        (width, height): (u32, u32),
        format: wgpu::TextureFormat,
        texels: &[u8],
    ) -> Self {
        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        let gpu = Self::allocate(device, label, (width, height), format, usage);
        let bytes_per_texel = format.block_copy_size(None).unwrap_or(4);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_texel * width),
                rows_per_image: Some(height),
            },
            gpu.texture.size(),
        );
        gpu
    }

    /// Depth attachment matching a surface of `width` x `height`.
    pub fn depth(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self::allocate(
            device,
            "depth_texture",
            (width, height),
            Self::DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    }

    /// A 1x1 texture, bound by materials that sample nothing.
    pub fn solid(device: &wgpu::Device, queue: &wgpu::Queue, rgba: [u8; 4], label: &str) -> Self {
        Self::upload(
            device,
            queue,
            label,
            (1, 1),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            &rgba,
        )
    }

    /// Decodes image file contents. `extension` is a format hint such as
    /// `"png"`; without one the format is guessed from the data.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        extension: Option<&str>,
    ) -> anyhow::Result<Self> {
        let img = match extension.and_then(ImageFormat::from_extension) {
            Some(format) => image::load_from_memory_with_format(bytes, format),
            None => image::load_from_memory(bytes),
        }
        .with_context(|| format!("{label} could not be decoded"))?;
        Ok(Self::from_image(device, queue, &img, label))
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &DynamicImage,
        label: &str,
    ) -> Self {
        let rgba = img.to_rgba8();
        Self::upload(
            device,
            queue,
            label,
            rgba.dimensions(),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            rgba.as_raw(),
        )
    }

    /// Decodes a Radiance HDR panorama into an `Rgba32Float` texture.
    pub fn from_hdr(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
    ) -> anyhow::Result<Self> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Hdr)
            .with_context(|| format!("{label} is not a Radiance HDR image"))?;
        let rgba = img.to_rgba32f();
        Ok(Self::upload(
            device,
            queue,
            label,
            rgba.dimensions(),
            wgpu::TextureFormat::Rgba32Float,
            bytemuck::cast_slice(rgba.as_raw()),
        ))
    }

    /// An empty texture that video frames are copied into.
    #[cfg(target_arch = "wasm32")]
    pub fn video_target(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        Self::allocate(
            device,
            label,
            (width, height),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    }
}

/// The sampler every material binds: bilinear, repeating.
pub fn material_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("material_sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}
