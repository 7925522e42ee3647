//! Typed errors shared by the store, the resource manager and the render driver.

use crate::ecs::Entity;

/// Misuse of the entity/component store.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    #[error("entity {0} does not exist")]
    UnknownEntity(Entity),
}

/// Failures while registering, loading or spawning GPU resources.
#[derive(thiserror::Error, Debug)]
pub enum ResourceError {
    #[error("no model template registered under key `{0}`")]
    UnknownModel(String),

    #[error("cube map `{key}` needs six faces of equal size, got {faces}")]
    InvalidCubeMap { key: String, faces: usize },

    #[error("failed to load model `{path}`: {source}")]
    Load {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

/// Reason a single renderable was skipped while packing a frame.
///
/// Skips never abort the frame; they are collected into the frame report.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DrawError {
    #[error("entity {0} has no mesh reference")]
    MissingMeshReference(Entity),

    #[error("no mesh found with key `{0}`")]
    MissingMesh(String),

    #[error("no texture found with key `{0}`")]
    MissingTexture(String),

    #[error("texture `{0}` is a cube map and cannot be bound per object")]
    NotBindable(String),
}
