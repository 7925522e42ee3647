//! Device/queue bundle and engine settings.
//!
//! Window and surface management stay with the embedding application; the
//! context only carries what the resource manager and the render driver need.

use anyhow::Context as _;

/// Engine-wide settings, fixed for the lifetime of a [`Context`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Slots in the shared transform buffer.
    pub max_objects: u64,
    /// Slots in the point light uniform array.
    pub max_point_lights: usize,
    /// Texture used by entities without a texture reference.
    pub default_texture_key: String,
    /// Prefix for GPU debug labels.
    pub label: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_objects: 256,
            max_point_lights: 16,
            default_texture_key: "default".to_string(),
            label: "ecs-renderer".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub settings: Settings,
}

impl Context {
    /// Wraps a device and queue created by the embedding application.
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue, settings: Settings) -> Self {
        Self {
            device,
            queue,
            settings,
        }
    }

    /// Requests an adapter without a surface, for offscreen rendering and tests.
    pub async fn headless(settings: Settings) -> anyhow::Result<Self> {
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter found")?;

        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some(&settings.label),
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("Could not create GPU device")?;

        Ok(Self::from_parts(device, queue, settings))
    }

    /// Minimum byte alignment for dynamic uniform buffer offsets.
    pub fn uniform_alignment(&self) -> u64 {
        self.device.limits().min_uniform_buffer_offset_alignment as u64
    }
}
