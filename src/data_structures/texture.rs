//! GPU textures and texture creation utilities.
//!
//! [`Texture`] wraps a WGPU texture together with its default view. Plain 2D
//! textures are bound per object; cube maps (six equally sized faces) are
//! kept for a skybox pass and are never bound through the per-object layout.

use anyhow::Context as _;
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

use crate::error::ResourceError;

/// Key of the texture an entity samples. Entities without one fall back to
/// the default texture key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureReference(pub String);

impl TextureReference {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

/// A GPU texture together with the view that shaders sample from.
///
/// 2D textures can be bound per object, cube maps are only used through the
/// scene bind group.
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub dimension: wgpu::TextureViewDimension,
}

impl Texture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Load a texture from encoded image bytes (PNG, JPEG, ...).
    ///
    /// # Arguments
    ///
    /// * `bytes` represent raw image file data
    /// * `label` is used as a debug name for the GPU resource and in errors
    /// * `format` is an optional extension hint such as `"png"`. If None, the
    ///   format is guessed from the data.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
    ) -> anyhow::Result<Self> {
        let img = match format.and_then(ImageFormat::from_extension) {
            Some(format) => load_from_memory_with_format(bytes, format),
            None => image::load_from_memory(bytes),
        }
        .with_context(|| format!("Could not decode image for texture {label}"))?;
        Ok(Self::from_image(device, queue, &img, label))
    }

    /// Upload an already decoded image as an sRGB 2D texture.
    ///
    /// # Arguments
    ///
    /// * `img` is converted to RGBA8 before the upload, whatever its pixel type
    /// * `label` is used as a debug name for the GPU resource
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: &str,
    ) -> Self {
        let (width, height) = img.dimensions();
        Self::from_rgba(device, queue, &img.to_rgba8(), width, height, label)
    }

    /// 1×1 texture of a single RGBA colour. Used for the default white
    /// texture and for materials that only carry a diffuse colour.
    pub fn solid_colour(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        label: &str,
    ) -> Self {
        Self::from_rgba(device, queue, &rgba, 1, 1, label)
    }

    fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &[u8],
        width: u32,
        height: u32,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        write_layer(queue, &texture, rgba, width, height, 0);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            dimension: wgpu::TextureViewDimension::D2,
        }
    }

    /// Cube map from six faces in +X, -X, +Y, -Y, +Z, -Z order.
    ///
    /// # Arguments
    ///
    /// * `faces` must hold exactly six images of the same size
    /// * `label` names the cube map in the returned error
    ///
    /// # Errors
    ///
    /// [`ResourceError::InvalidCubeMap`] when the face count or sizes are off.
    pub fn cube_from_images(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &[image::DynamicImage],
        label: &str,
    ) -> Result<Self, ResourceError> {
        let (width, height) = validate_cube_faces(label, faces)?;
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 6,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, face) in faces.iter().enumerate() {
            write_layer(queue, &texture, &face.to_rgba8(), width, height, layer as u32);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        Ok(Self {
            texture,
            view,
            dimension: wgpu::TextureViewDimension::Cube,
        })
    }

    /// Whether the texture can go into a per-object bind group.
    pub fn is_bindable(&self) -> bool {
        self.dimension == wgpu::TextureViewDimension::D2
    }

    /// Frees the GPU memory right away instead of waiting for the last handle
    /// to drop.
    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

fn write_layer(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    rgba: &[u8],
    width: u32,
    height: u32,
    layer: u32,
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

/// Size shared by all six faces, or an error naming the cube map.
pub fn validate_cube_faces(
    key: &str,
    faces: &[image::DynamicImage],
) -> Result<(u32, u32), ResourceError> {
    let invalid = || ResourceError::InvalidCubeMap {
        key: key.to_string(),
        faces: faces.len(),
    };
    if faces.len() != 6 {
        return Err(invalid());
    }
    let size = faces[0].dimensions();
    if faces.iter().any(|face| face.dimensions() != size) {
        log::error!("Cube map {key} has faces of different sizes");
        return Err(invalid());
    }
    Ok(size)
}

/// Repeating, linearly filtered sampler shared by every textured draw.
pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("default sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}
