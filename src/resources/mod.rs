//! GPU resource manager.
//!
//! [`ResourceManager`] maps string keys to meshes, textures and model
//! templates, and owns the shared transform buffer every renderable writes
//! its [`TransformRaw`] into. Registering an existing key replaces the entry
//! and destroys the GPU objects it owned.
//!
//! Each 2D texture carries a bind group for the per-object layout (group 1):
//! binding 0 is a [`TransformRaw`]-sized window into the transform buffer
//! addressed with a dynamic offset, binding 1 is the texture view.

use std::collections::HashMap;

use crate::{
    context::{Context, Settings},
    data_structures::{
        mesh::{MeshEntry, Vertex},
        model::{ModelRegistry, ModelTemplate},
        texture::Texture,
        transform::TransformRaw,
    },
    ecs::{Entity, World},
    error::ResourceError,
};

pub mod gltf;
pub mod loader;
pub mod obj;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Obj,
    Gltf,
}

impl ModelFormat {
    /// Guesses the format from a file extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match extension.as_str() {
            "obj" => Some(ModelFormat::Obj),
            "gltf" | "glb" => Some(ModelFormat::Gltf),
            _ => None,
        }
    }
}

/// A registered texture and the per-object bind group built for it.
#[derive(Debug)]
pub struct TextureEntry {
    pub texture: Texture,
    /// `None` for cube maps.
    pub bind_group: Option<wgpu::BindGroup>,
    /// Bumped on every registration, so stale handles can be told apart.
    pub generation: u64,
}

/// Rounds `raw` up to the next multiple of `alignment`.
pub fn padded_stride(raw: u64, alignment: u64) -> u64 {
    match raw % alignment {
        0 => raw,
        rest => raw + (alignment - rest),
    }
}

/// Layout of the per-object bind group: the transform record at a dynamic
/// offset (binding 0) and the object's 2D texture (binding 1).
pub fn object_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(TransformRaw::SIZE),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
        ],
        label: Some("object_bind_group_layout"),
    })
}

/// Owns every GPU resource entities refer to by key.
///
/// Meshes, textures and model templates live in keyed tables. Registering a
/// key again replaces the old resource and frees its GPU memory. The manager
/// also owns the transform buffer that all object bind groups point into.
#[derive(Debug)]
pub struct ResourceManager {
    device: wgpu::Device,
    queue: wgpu::Queue,
    settings: Settings,
    meshes: HashMap<String, MeshEntry>,
    textures: HashMap<String, TextureEntry>,
    models: ModelRegistry,
    transform_buffer: wgpu::Buffer,
    stride: u64,
    object_layout: wgpu::BindGroupLayout,
    generation: u64,
}

impl ResourceManager {
    /// Allocates the transform buffer and registers a white texture under the
    /// default texture key.
    pub fn new(ctx: &Context) -> Self {
        let settings = ctx.settings.clone();
        let stride = padded_stride(TransformRaw::SIZE, ctx.uniform_alignment());
        let transform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Transform Buffer", settings.label)),
            size: stride * settings.max_objects.max(1),
            usage: wgpu::BufferUsages::UNIFORM
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        log::debug!(
            "Transform buffer: {} slots of {stride} bytes",
            settings.max_objects
        );

        let mut manager = Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            meshes: HashMap::new(),
            textures: HashMap::new(),
            models: ModelRegistry::new(),
            transform_buffer,
            stride,
            object_layout: object_bind_group_layout(&ctx.device),
            generation: 0,
            settings,
        };

        let default_key = manager.settings.default_texture_key.clone();
        let white = Texture::solid_colour(&manager.device, &manager.queue, [255; 4], &default_key);
        manager.insert_texture(&default_key, white);
        manager
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Byte distance between two records in the transform buffer.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Number of records the transform buffer holds.
    pub fn capacity(&self) -> u64 {
        self.settings.max_objects
    }

    /// Uniform buffer holding one transform record per drawn entity.
    pub fn transform_buffer(&self) -> &wgpu::Buffer {
        &self.transform_buffer
    }

    pub fn object_bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.object_layout
    }

    /// Uploads packed transform records starting at offset 0.
    pub fn write_transforms(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let limit = self.transform_buffer.size() as usize;
        if bytes.len() > limit {
            log::warn!("Transform data of {} bytes truncated to {limit}", bytes.len());
        }
        self.queue.write_buffer(&self.transform_buffer, 0, &bytes[..bytes.len().min(limit)]);
    }

    /// Uploads a mesh and registers it under `key`.
    ///
    /// # Arguments
    ///
    /// * `key` is what [`MeshReference`](crate::data_structures::mesh::MeshReference)
    ///   components name. An existing mesh under the same key is destroyed.
    /// * `vertices` are copied into a new vertex buffer
    /// * `indices` selects indexed drawing. With None the mesh is drawn as a
    ///   plain triangle list.
    pub fn add_mesh(&mut self, key: &str, vertices: &[Vertex], indices: Option<&[u32]>) {
        let entry = MeshEntry::new(&self.device, key, vertices, indices);
        if let Some(old) = self.meshes.insert(key.to_string(), entry) {
            log::debug!("Replacing mesh {key}");
            old.destroy();
        }
    }

    pub fn get_mesh(&self, key: &str) -> Option<&MeshEntry> {
        self.meshes.get(key)
    }

    /// Uploads `image` as a 2D texture under `key` and builds its per-object
    /// bind group.
    pub fn add_texture(&mut self, key: &str, image: &image::DynamicImage) {
        let texture = Texture::from_image(&self.device, &self.queue, image, key);
        self.insert_texture(key, texture);
    }

    /// Decodes and registers an encoded image (PNG, JPEG, ...).
    pub fn add_texture_bytes(&mut self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let texture = Texture::from_bytes(&self.device, &self.queue, bytes, key, None)?;
        self.insert_texture(key, texture);
        Ok(())
    }

    pub fn add_solid_texture(&mut self, key: &str, rgba: [u8; 4]) {
        let texture = Texture::solid_colour(&self.device, &self.queue, rgba, key);
        self.insert_texture(key, texture);
    }

    /// Registers a cube map from six faces. Cube maps get no per-object bind
    /// group.
    pub fn add_cube_texture(
        &mut self,
        key: &str,
        faces: &[image::DynamicImage],
    ) -> Result<(), ResourceError> {
        let texture = Texture::cube_from_images(&self.device, &self.queue, faces, key)?;
        self.insert_texture(key, texture);
        Ok(())
    }

    /// Stores `texture` under `key`, destroying the texture it replaces and
    /// building a fresh bind group for it.
    pub fn insert_texture(&mut self, key: &str, texture: Texture) {
        let bind_group = texture.is_bindable().then(|| self.object_bind_group(key, &texture));
        self.generation += 1;
        let entry = TextureEntry {
            texture,
            bind_group,
            generation: self.generation,
        };
        if let Some(old) = self.textures.insert(key.to_string(), entry) {
            log::debug!("Replacing texture {key}");
            old.texture.destroy();
        }
    }

    /// The texture registered under `key`, including its bind group.
    pub fn get_texture(&self, key: &str) -> Option<&TextureEntry> {
        self.textures.get(key)
    }

    /// Number of registered textures, the default texture included.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn object_bind_group(&self, key: &str, texture: &Texture) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.object_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.transform_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(TransformRaw::SIZE),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
            ],
            label: Some(&format!("{key} object_bind_group")),
        })
    }

    /// Registers a template that [`ResourceManager::spawn_model`] can
    /// instantiate. A template under the same key is replaced.
    pub fn add_model_template(&mut self, key: &str, template: ModelTemplate) {
        self.models.insert(key, template);
    }

    pub fn get_model_template(&self, key: &str) -> Option<&ModelTemplate> {
        self.models.get(key)
    }

    /// Loads a model file and registers its meshes, textures and template
    /// under `key`.
    pub async fn load_model(
        &mut self,
        path: &str,
        key: &str,
        format: ModelFormat,
    ) -> Result<(), ResourceError> {
        let default_texture_key = self.settings.default_texture_key.clone();
        let data = match format {
            ModelFormat::Obj => obj::load(path, key, &default_texture_key).await,
            ModelFormat::Gltf => self::gltf::load(path, key, &default_texture_key).await,
        }
        .map_err(|source| {
            log::error!("Model {path} could not be loaded: {source:#}");
            ResourceError::Load {
                path: path.to_string(),
                source,
            }
        })?;

        log::info!(
            "Loaded {path} as {key}: {} meshes, {} textures",
            data.meshes.len(),
            data.textures.len()
        );
        for mesh in &data.meshes {
            self.add_mesh(&mesh.key, &mesh.vertices, mesh.indices.as_deref());
        }
        for (texture_key, image) in &data.textures {
            self.add_texture(texture_key, image);
        }
        self.add_model_template(key, data.template);
        Ok(())
    }

    /// Creates a root entity plus one child per part of the template under
    /// `key`, wired up with Parent and Children components.
    ///
    /// # Errors
    ///
    /// [`ResourceError::UnknownModel`] when no template is registered under
    /// `key`.
    pub fn spawn_model(&self, world: &mut World, key: &str) -> Result<Entity, ResourceError> {
        self.models.spawn(world, key)
    }
}
