//! Light components and their packed uniform records.
//!
//! Light colours are authored in 0-255 and normalised to 0-1 when packed.
//! Point lights go into one count-prefixed array with a fixed number of
//! slots; ambient and directional light are single records.

use cgmath::Vector3;

use crate::{
    data_structures::transform::Position,
    ecs::{ComponentKind, Entity, Query, World},
};

/// Colour (0-255 per channel) and intensity shared by every light kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub colour: Vector3<f32>,
    pub intensity: f32,
}

impl Light {
    pub fn new(colour: impl Into<Vector3<f32>>, intensity: f32) -> Self {
        Self {
            colour: colour.into(),
            intensity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub max_distance: f32,
    pub decay_rate: f32,
}

impl PointLight {
    pub fn new(max_distance: f32, decay_rate: f32) -> Self {
        Self {
            max_distance,
            decay_rate,
        }
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(50.0, 1.0)
    }
}

/// Scene-wide ambient term, usually attached to the scene entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub colour: Vector3<f32>,
    pub strength: f32,
}

impl AmbientLight {
    pub fn new(colour: impl Into<Vector3<f32>>, strength: f32) -> Self {
        Self {
            colour: colour.into(),
            strength,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vector3<f32>,
}

impl DirectionalLight {
    pub fn new(direction: impl Into<Vector3<f32>>) -> Self {
        Self {
            direction: direction.into(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightArrayHeader {
    pub count: u32,
    // Uniform arrays start on a 16 byte boundary
    _padding: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    pub position: [f32; 3],
    _padding: u32,
    pub colour: [f32; 3],
    pub intensity: f32,
    pub max_distance: f32,
    pub decay_rate: f32,
    _padding2: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AmbientLightRaw {
    pub colour: [f32; 3],
    pub strength: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLightRaw {
    pub direction: [f32; 3],
    _padding: u32,
    pub colour: [f32; 3],
    pub intensity: f32,
}

fn normalised_colour(colour: Vector3<f32>) -> [f32; 3] {
    (colour / 255.0).into()
}

/// Ambient record of `scene`, or of the first entity holding an
/// [`AmbientLight`] when no scene entity is given. Black when absent.
pub fn pack_ambient_light(world: &World, scene: Option<Entity>) -> AmbientLightRaw {
    let scene = scene.or_else(|| {
        world
            .query_singular(&Query::Single(ComponentKind::AmbientLight))
            .first()
            .copied()
    });
    let ambient = scene.and_then(|scene| world.get_component::<AmbientLight>(scene).ok().flatten());

    match ambient {
        Some(ambient) => AmbientLightRaw {
            colour: normalised_colour(ambient.colour),
            strength: ambient.strength,
        },
        None => AmbientLightRaw {
            colour: [0.0; 3],
            strength: 0.0,
        },
    }
}

/// Header plus one record per entity holding [`Light`], [`PointLight`] and
/// [`Position`]; lights beyond `max_lights` are dropped with a warning.
pub fn pack_point_lights(world: &World, max_lights: usize) -> Vec<u8> {
    let mut lights = world.query_singular(&Query::all_of([
        ComponentKind::Light,
        ComponentKind::PointLight,
        ComponentKind::Position,
    ]));
    if lights.len() > max_lights {
        log::warn!(
            "{} point lights in the scene, only the first {max_lights} are packed",
            lights.len()
        );
        lights.truncate(max_lights);
    }

    let records: Vec<PointLightRaw> = lights
        .iter()
        .filter_map(|entity| {
            let light = world.get_component::<Light>(*entity).ok()??;
            let point = world.get_component::<PointLight>(*entity).ok()??;
            let position = world.get_component::<Position>(*entity).ok()??;
            Some(PointLightRaw {
                position: position.0.into(),
                _padding: 0,
                colour: normalised_colour(light.colour),
                intensity: light.intensity,
                max_distance: point.max_distance,
                decay_rate: point.decay_rate,
                _padding2: [0; 2],
            })
        })
        .collect();

    let header = LightArrayHeader {
        count: records.len() as u32,
        _padding: [0; 3],
    };
    let mut bytes = Vec::with_capacity(point_light_buffer_size(records.len()) as usize);
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    bytes.extend_from_slice(bytemuck::cast_slice(&records));
    bytes
}

/// First entity holding [`Light`] and [`DirectionalLight`]; absent lights
/// point straight up with no colour.
pub fn pack_directional_light(world: &World) -> DirectionalLightRaw {
    let found = world
        .query_singular(&Query::all_of([ComponentKind::Light, ComponentKind::DirectionalLight]))
        .first()
        .and_then(|entity| {
            let light = world.get_component::<Light>(*entity).ok()??;
            let directional = world.get_component::<DirectionalLight>(*entity).ok()??;
            Some((light, directional))
        });

    match found {
        Some((light, directional)) => DirectionalLightRaw {
            direction: directional.direction.into(),
            _padding: 0,
            colour: normalised_colour(light.colour),
            intensity: light.intensity,
        },
        None => DirectionalLightRaw {
            direction: [0.0, 1.0, 0.0],
            _padding: 0,
            colour: [0.0; 3],
            intensity: 0.0,
        },
    }
}

pub fn point_light_buffer_size(max_lights: usize) -> u64 {
    (std::mem::size_of::<LightArrayHeader>() + max_lights * std::mem::size_of::<PointLightRaw>())
        as u64
}

/// Uniform buffers holding the packed light records of the current frame.
#[derive(Debug)]
pub struct LightBuffers {
    pub ambient: wgpu::Buffer,
    pub point_lights: wgpu::Buffer,
    pub directional: wgpu::Buffer,
    pub max_point_lights: usize,
}

impl LightBuffers {
    pub fn new(device: &wgpu::Device, max_point_lights: usize) -> Self {
        let uniform = |label: &str, size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        Self {
            ambient: uniform("Ambient Light Buffer", std::mem::size_of::<AmbientLightRaw>() as u64),
            point_lights: uniform("Point Light Buffer", point_light_buffer_size(max_point_lights)),
            directional: uniform(
                "Directional Light Buffer",
                std::mem::size_of::<DirectionalLightRaw>() as u64,
            ),
            max_point_lights,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, world: &World, scene: Option<Entity>) {
        let ambient = pack_ambient_light(world, scene);
        let directional = pack_directional_light(world);
        queue.write_buffer(&self.ambient, 0, bytemuck::bytes_of(&ambient));
        queue.write_buffer(&self.point_lights, 0, &pack_point_lights(world, self.max_point_lights));
        queue.write_buffer(&self.directional, 0, bytemuck::bytes_of(&directional));
    }
}
