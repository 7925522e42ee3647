//! Per-frame scene packing and draw submission.
//!
//! A frame is handled in two steps:
//!
//! 1. [`FramePlan::build`] queries the renderable entities, assigns each one a
//!    draw index in query order and packs its [`TransformRaw`] at
//!    `draw_index × stride`. Nothing is cached between frames.
//! 2. [`SceneRenderer::render`] resolves every planned draw against the
//!    [`ResourceManager`] and records it into an externally opened render
//!    pass. Draws with a missing mesh or texture are skipped and reported;
//!    they never abort the frame.
//!
//! The render pipeline is owned by the caller and must be set on the pass
//! before [`SceneRenderer::render`]. It is expected to use the scene layout
//! (group 0) and the per-object layout (group 1).

use std::collections::HashSet;

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    camera::CameraUniform,
    context::Context,
    data_structures::{
        mesh::{DrawMesh, MeshEntry, MeshReference},
        texture::{TextureReference, create_default_sampler},
        transform::{Position, Rotation, Scale, TransformRaw, model_matrix},
    },
    ecs::{ComponentKind, Entity, MultiQuery, Parent, Query, World},
    error::DrawError,
    lights::{AmbientLightRaw, DirectionalLightRaw, LightBuffers, point_light_buffer_size},
    resources::ResourceManager,
};

/// One planned draw: which entity, where its record lives and what it uses.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub entity: Entity,
    pub draw_index: u32,
    /// Dynamic offset into the transform buffer.
    pub offset: u32,
    pub mesh_key: Option<String>,
    pub texture_key: String,
    pub transform: TransformRaw,
}

#[derive(Debug, Clone, Default)]
pub struct FramePlan {
    pub commands: Vec<DrawCommand>,
    /// Renderables left out because the transform buffer was full.
    pub over_capacity: usize,
    stride: u64,
}

impl FramePlan {
    pub fn build(world: &World, stride: u64, capacity: u64, default_texture_key: &str) -> Self {
        let renderables = renderable_entities(world);
        let capacity = capacity as usize;
        let over_capacity = renderables.len().saturating_sub(capacity);
        if over_capacity > 0 {
            log::warn!(
                "{} renderables exceed the transform buffer capacity of {capacity}, \
                 {over_capacity} dropped",
                renderables.len()
            );
        }

        let commands = renderables
            .into_iter()
            .take(capacity)
            .enumerate()
            .map(|(draw_index, entity)| DrawCommand {
                entity,
                draw_index: draw_index as u32,
                offset: (draw_index as u64 * stride) as u32,
                mesh_key: component::<MeshReference>(world, entity).map(|m| m.0.clone()),
                texture_key: component::<TextureReference>(world, entity)
                    .map_or_else(|| default_texture_key.to_string(), |t| t.0.clone()),
                transform: TransformRaw::from_model(world_matrix(world, entity)),
            })
            .collect();

        Self {
            commands,
            over_capacity,
            stride,
        }
    }

    pub fn offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.commands.iter().map(|c| c.offset)
    }

    /// Contents of the transform buffer for this frame, one record per
    /// `stride` with zeroed padding in between.
    pub fn transform_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.commands.len() * self.stride as usize];
        for command in &self.commands {
            let start = command.offset as usize;
            let record = bytemuck::bytes_of(&command.transform);
            bytes[start..start + record.len()].copy_from_slice(record);
        }
        bytes
    }
}

/// Entities holding a [`Parent`] or a [`MeshReference`], in query order.
pub fn renderable_entities(world: &World) -> Vec<Entity> {
    world.query_multiple(&MultiQuery::union([
        Query::Single(ComponentKind::Parent),
        Query::Single(ComponentKind::MeshReference),
    ]))
}

fn component<C: crate::ecs::ComponentData>(world: &World, entity: Entity) -> Option<&C> {
    world.get_component::<C>(entity).ok().flatten()
}

/// Model matrix of `entity` alone, missing components taken as identity.
pub fn local_matrix(world: &World, entity: Entity) -> Matrix4<f32> {
    model_matrix(
        component::<Position>(world, entity),
        component::<Rotation>(world, entity),
        component::<Scale>(world, entity),
    )
}

/// Local matrices composed from the root ancestor down to `entity`.
pub fn world_matrix(world: &World, entity: Entity) -> Matrix4<f32> {
    let mut chain = vec![entity];
    let mut visited = HashSet::from([entity]);
    let mut current = entity;
    while let Some(Parent(Some(parent))) = component::<Parent>(world, current).copied() {
        if !world.contains(parent) {
            log::warn!("Entity {current} has a parent {parent} that no longer exists");
            break;
        }
        if !visited.insert(parent) {
            log::warn!("Parent cycle through entity {parent}, composition stopped");
            break;
        }
        chain.push(parent);
        current = parent;
    }

    chain
        .iter()
        .rev()
        .fold(Matrix4::identity(), |acc, e| acc * local_matrix(world, *e))
}

/// A planned draw with its GPU resources looked up.
#[derive(Debug)]
pub struct ResolvedDraw<'a> {
    pub entity: Entity,
    pub mesh: &'a MeshEntry,
    pub bind_group: &'a wgpu::BindGroup,
    pub offset: u32,
}

fn resolve_one<'a>(
    command: &DrawCommand,
    resources: &'a ResourceManager,
) -> Result<ResolvedDraw<'a>, DrawError> {
    let mesh_key = command
        .mesh_key
        .as_deref()
        .ok_or(DrawError::MissingMeshReference(command.entity))?;
    let mesh = resources
        .get_mesh(mesh_key)
        .ok_or_else(|| DrawError::MissingMesh(mesh_key.to_string()))?;
    let texture = resources
        .get_texture(&command.texture_key)
        .ok_or_else(|| DrawError::MissingTexture(command.texture_key.clone()))?;
    let bind_group = texture
        .bind_group
        .as_ref()
        .ok_or_else(|| DrawError::NotBindable(command.texture_key.clone()))?;
    Ok(ResolvedDraw {
        entity: command.entity,
        mesh,
        bind_group,
        offset: command.offset,
    })
}

/// Splits the plan into drawable entries and skipped entities.
pub fn resolve<'a>(
    plan: &FramePlan,
    resources: &'a ResourceManager,
) -> (Vec<ResolvedDraw<'a>>, Vec<(Entity, DrawError)>) {
    let mut draws = Vec::with_capacity(plan.commands.len());
    let mut skipped = Vec::new();
    for command in &plan.commands {
        match resolve_one(command, resources) {
            Ok(draw) => draws.push(draw),
            Err(e) => {
                log::error!("Skipping entity {}: {e}", command.entity);
                skipped.push((command.entity, e));
            }
        }
    }
    (draws, skipped)
}

pub fn encode(render_pass: &mut wgpu::RenderPass<'_>, draws: &[ResolvedDraw<'_>]) {
    for draw in draws {
        render_pass.set_bind_group(1, draw.bind_group, &[draw.offset]);
        render_pass.draw_mesh(draw.mesh);
    }
}

/// Outcome of one rendered frame.
#[derive(Debug, Default, PartialEq)]
pub struct FrameReport {
    pub drawn: usize,
    pub skipped: Vec<(Entity, DrawError)>,
    pub over_capacity: usize,
}

pub fn scene_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let uniform = |binding, visibility| wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            uniform(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
            uniform(1, wgpu::ShaderStages::FRAGMENT),
            uniform(2, wgpu::ShaderStages::FRAGMENT),
            uniform(3, wgpu::ShaderStages::FRAGMENT),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("scene_bind_group_layout"),
    })
}

/// Owns the per-scene uniforms (camera, lights, sampler) and drives frames.
#[derive(Debug)]
pub struct SceneRenderer {
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    lights: LightBuffers,
    sampler: wgpu::Sampler,
    scene_layout: wgpu::BindGroupLayout,
    scene_bind_group: wgpu::BindGroup,
}

impl SceneRenderer {
    pub fn new(ctx: &Context) -> Self {
        let device = &ctx.device;
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lights = LightBuffers::new(device, ctx.settings.max_point_lights);
        let sampler = create_default_sampler(device);
        let scene_layout = scene_bind_group_layout(device);

        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &scene_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.ambient.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: lights.point_lights.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: lights.directional.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some("scene_bind_group"),
        });
        log::debug!(
            "Scene uniforms: ambient {}B, point lights {}B, directional {}B",
            std::mem::size_of::<AmbientLightRaw>(),
            point_light_buffer_size(ctx.settings.max_point_lights),
            std::mem::size_of::<DirectionalLightRaw>()
        );

        Self {
            camera_uniform: CameraUniform::new(),
            camera_buffer,
            lights,
            sampler,
            scene_layout,
            scene_bind_group,
        }
    }

    pub fn scene_bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.scene_layout
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn camera_buffer(&self) -> &wgpu::Buffer {
        &self.camera_buffer
    }

    pub fn lights(&self) -> &LightBuffers {
        &self.lights
    }

    /// Writes camera, lights and transforms for this frame and returns the
    /// plan to render.
    pub fn prepare(
        &mut self,
        queue: &wgpu::Queue,
        world: &World,
        resources: &ResourceManager,
        camera: Entity,
        scene: Option<Entity>,
    ) -> FramePlan {
        self.camera_uniform.update(world, camera);
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&self.camera_uniform));
        self.lights.write(queue, world, scene);

        let plan = FramePlan::build(
            world,
            resources.stride(),
            resources.capacity(),
            &resources.settings().default_texture_key,
        );
        resources.write_transforms(&plan.transform_bytes());
        plan
    }

    /// Records the planned draws into `render_pass`.
    pub fn render(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        plan: &FramePlan,
        resources: &ResourceManager,
    ) -> FrameReport {
        render_pass.set_bind_group(0, &self.scene_bind_group, &[]);
        let (draws, skipped) = resolve(plan, resources);
        encode(render_pass, &draws);
        FrameReport {
            drawn: draws.len(),
            skipped,
            over_capacity: plan.over_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Children;

    const STRIDE: u64 = 256;

    fn translation_at(bytes: &[u8], offset: u32) -> [f32; 3] {
        let start = offset as usize + 12 * 4;
        bytemuck::pod_read_unaligned(&bytes[start..start + 12])
    }

    fn cube_at(world: &mut World, x: f32) -> Entity {
        let e = world.create_entity();
        world.add_component(e, Position::new(x, 0.0, 0.0)).unwrap();
        world.add_component(e, MeshReference::new("cube")).unwrap();
        world.add_component(e, TextureReference::new("red")).unwrap();
        e
    }

    #[test]
    fn two_cubes_pack_into_consecutive_slots() {
        let mut world = World::new();
        let left = cube_at(&mut world, -3.0);
        let right = cube_at(&mut world, 3.0);

        let plan = FramePlan::build(&world, STRIDE, 16, "default");
        assert_eq!(plan.commands.len(), 2);
        assert_eq!(plan.offsets().collect::<Vec<_>>(), vec![0, STRIDE as u32]);
        assert_eq!(
            plan.commands.iter().map(|c| c.entity).collect::<Vec<_>>(),
            vec![left, right]
        );
        for command in &plan.commands {
            assert_eq!(command.mesh_key.as_deref(), Some("cube"));
            assert_eq!(command.texture_key, "red");
        }

        let bytes = plan.transform_bytes();
        assert_eq!(bytes.len(), 2 * STRIDE as usize);
        assert_eq!(translation_at(&bytes, 0), [-3.0, 0.0, 0.0]);
        assert_eq!(translation_at(&bytes, STRIDE as u32), [3.0, 0.0, 0.0]);
    }

    #[test]
    fn offsets_cover_every_slot_once() {
        let mut world = World::new();
        for i in 0..7 {
            cube_at(&mut world, i as f32);
        }
        for stride in [128u64, 256, 512] {
            let plan = FramePlan::build(&world, stride, 64, "default");
            let offsets: Vec<u32> = plan.offsets().collect();
            let expected: Vec<u32> = (0..7).map(|i| (i * stride) as u32).collect();
            assert_eq!(offsets, expected);
        }
    }

    #[test]
    fn draw_index_ignores_entity_ids() {
        let mut world = World::new();
        let a = cube_at(&mut world, 0.0);
        let _b = cube_at(&mut world, 1.0);
        world.destroy_entity(a).unwrap();
        // only entity 1 remains; it still gets slot 0
        let plan = FramePlan::build(&world, STRIDE, 16, "default");
        assert_eq!(plan.commands[0].entity, 1);
        assert_eq!(plan.commands[0].offset, 0);
    }

    #[test]
    fn missing_texture_reference_uses_default_key() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, MeshReference::new("cube")).unwrap();
        let plan = FramePlan::build(&world, STRIDE, 16, "default");
        assert_eq!(plan.commands[0].texture_key, "default");
        let identity: [[f32; 4]; 4] = Matrix4::<f32>::identity().into();
        assert_eq!(plan.commands[0].transform.model, identity);
    }

    #[test]
    fn parent_transform_is_applied_first() {
        let mut world = World::new();
        let root = world.create_entity();
        world.add_component(root, Position::new(0.0, 5.0, 0.0)).unwrap();
        world.add_component(root, Scale::uniform(2.0)).unwrap();
        let child = world.create_entity();
        world.add_component(child, Position::new(1.0, 0.0, 0.0)).unwrap();
        world.add_component(child, MeshReference::new("hull")).unwrap();
        world.add_component(child, Parent(Some(root))).unwrap();
        world.add_component(root, Children(vec![child])).unwrap();

        let plan = FramePlan::build(&world, STRIDE, 16, "default");
        assert_eq!(plan.commands.len(), 1);
        assert_eq!(plan.commands[0].transform.translation(), [2.0, 5.0, 0.0]);
    }

    #[test]
    fn reused_parent_id_does_not_move_orphans() {
        let mut world = World::new();
        let root = world.create_entity();
        world.add_component(root, Position::new(0.0, 5.0, 0.0)).unwrap();
        let child = world.create_entity();
        world.add_component(child, MeshReference::new("hull")).unwrap();
        world.add_component(child, Parent(Some(root))).unwrap();
        world.add_component(root, Children(vec![child])).unwrap();

        world.destroy_entity(root).unwrap();
        let stranger = world.create_entity();
        assert_eq!(stranger, root);
        world.add_component(stranger, Position::new(100.0, 0.0, 0.0)).unwrap();

        let plan = FramePlan::build(&world, STRIDE, 16, "default");
        assert_eq!(plan.commands.len(), 1);
        assert_eq!(plan.commands[0].entity, child);
        assert_eq!(plan.commands[0].transform.translation(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn grandparents_compose_and_cycles_terminate() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        let c = world.create_entity();
        world.add_component(a, Position::new(1.0, 0.0, 0.0)).unwrap();
        world.add_component(b, Position::new(0.0, 1.0, 0.0)).unwrap();
        world.add_component(c, Position::new(0.0, 0.0, 1.0)).unwrap();
        world.add_component(b, Parent(Some(a))).unwrap();
        world.add_component(c, Parent(Some(b))).unwrap();
        assert_eq!(
            TransformRaw::from_model(world_matrix(&world, c)).translation(),
            [1.0, 1.0, 1.0]
        );

        world.add_component(a, Parent(Some(c))).unwrap();
        // a -> c -> b -> a: stops at the repeat
        let _ = world_matrix(&world, a);
    }

    #[test]
    fn parent_without_mesh_is_planned_but_unresolvable() {
        let mut world = World::new();
        let root = world.create_entity();
        let orphan = world.create_entity();
        world.add_component(orphan, Parent(Some(root))).unwrap();

        let plan = FramePlan::build(&world, STRIDE, 16, "default");
        assert_eq!(plan.commands.len(), 1);
        assert_eq!(plan.commands[0].mesh_key, None);
    }

    #[test]
    fn renderables_beyond_capacity_are_counted() {
        let mut world = World::new();
        for i in 0..5 {
            cube_at(&mut world, i as f32);
        }
        let plan = FramePlan::build(&world, STRIDE, 3, "default");
        assert_eq!(plan.commands.len(), 3);
        assert_eq!(plan.over_capacity, 2);
        assert_eq!(plan.transform_bytes().len(), 3 * STRIDE as usize);
    }

    #[test]
    fn empty_world_plans_nothing() {
        let plan = FramePlan::build(&World::new(), STRIDE, 16, "default");
        assert!(plan.commands.is_empty());
        assert!(plan.transform_bytes().is_empty());
    }
}
