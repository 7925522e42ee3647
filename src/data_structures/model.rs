//! Model templates: named groups of (mesh, texture) parts spawned as a small
//! entity hierarchy.

use std::collections::HashMap;

use crate::{
    data_structures::{
        mesh::MeshReference,
        texture::TextureReference,
        transform::{Position, Rotation, Scale},
    },
    ecs::{Children, Entity, Parent, World},
    error::ResourceError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPart {
    pub mesh_key: String,
    pub texture_key: String,
}

impl ModelPart {
    pub fn new(mesh_key: impl Into<String>, texture_key: impl Into<String>) -> Self {
        Self {
            mesh_key: mesh_key.into(),
            texture_key: texture_key.into(),
        }
    }
}

/// Ordered parts of one loaded model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelTemplate {
    pub parts: Vec<ModelPart>,
}

impl ModelTemplate {
    pub fn new(parts: Vec<ModelPart>) -> Self {
        Self { parts }
    }
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    templates: HashMap<String, ModelTemplate>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the template previously stored under `key`, if any.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        template: ModelTemplate,
    ) -> Option<ModelTemplate> {
        let key = key.into();
        log::debug!("Registering model template {key} with {} parts", template.parts.len());
        self.templates.insert(key, template)
    }

    pub fn get(&self, key: &str) -> Option<&ModelTemplate> {
        self.templates.get(key)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Creates a root entity holding [`Children`] and an identity transform,
    /// plus one child per part holding its mesh, texture and [`Parent`].
    pub fn spawn(&self, world: &mut World, key: &str) -> Result<Entity, ResourceError> {
        let template = self.templates.get(key).ok_or_else(|| {
            log::error!("No model template registered under key {key}");
            ResourceError::UnknownModel(key.to_string())
        })?;

        let root = world.create_entity();
        world.add_component(root, Position::default())?;
        world.add_component(root, Rotation::default())?;
        world.add_component(root, Scale::default())?;

        let mut children = Vec::with_capacity(template.parts.len());
        for part in &template.parts {
            let child = world.create_entity();
            world.add_component(child, MeshReference::new(part.mesh_key.as_str()))?;
            world.add_component(child, TextureReference::new(part.texture_key.as_str()))?;
            world.add_component(child, Parent(Some(root)))?;
            children.push(child);
        }
        world.add_component(root, Children(children))?;

        Ok(root)
    }
}
