//! ecs-renderer
//!
//! Runtime core of a small wgpu renderer built around an entity-component
//! store. Scene setup code creates entities and attaches components to a
//! [`ecs::World`]; every frame the render driver turns that state into packed
//! transform and light buffers and ordered draw calls.
//!
//! High-level modules
//! - `ecs`: entity/component store and set-algebra queries
//! - `data_structures`: transforms, meshes, textures and model templates
//! - `resources`: GPU resource manager and model loaders (OBJ, glTF)
//! - `camera`: perspective camera component and view-projection helpers
//! - `lights`: light components and their packed uniform records
//! - `render`: per-frame scene packing and draw submission
//! - `context`: device/queue bundle and engine settings
//! - `error`: typed errors
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod ecs;
pub mod error;
pub mod lights;
pub mod render;
pub mod resources;

// Re-exports commonly used crates for convenience in downstream code.
pub use cgmath;
pub use wgpu;

/// Installs the platform logger. An already installed logger is kept.
pub fn init_logger() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::debug!("Logger already initialised: {e}");
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("Logger already initialised: {e}");
        }
    }
}
