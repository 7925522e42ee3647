//! Perspective camera component and view-projection helpers.
//!
//! A camera is an ordinary entity holding [`Position`], [`Rotation`] and
//! [`PerspectiveCamera`]. The view matrix is the inverse of the camera's model
//! matrix; the projection follows the WebGPU clip space (right-handed, depth
//! in `0..1`) and accepts an infinite far plane.

use cgmath::{Deg, InnerSpace, Matrix4, Rad, SquareMatrix, Vector3};

use crate::{
    data_structures::transform::{Position, Rotation, model_matrix},
    ecs::{Entity, World},
    error::EcsError,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub fov: Deg<f32>,
    pub near: f32,
    /// `f32::INFINITY` selects an infinite projection.
    pub far: f32,
    pub aspect: f32,
}

impl PerspectiveCamera {
    pub fn new(fov: impl Into<Deg<f32>>, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov: fov.into(),
            near,
            far,
            aspect,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if height == 0 {
            log::warn!("Ignoring camera resize to zero height");
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let f = 1.0 / (Rad::from(self.fov).0 / 2.0).tan();
        let (depth_scale, depth_offset) = if self.far.is_finite() {
            let near_far = 1.0 / (self.near - self.far);
            (self.far * near_far, self.far * self.near * near_far)
        } else {
            (-1.0, -self.near)
        };

        #[rustfmt::skip]
        let projection = Matrix4::new(
            f / self.aspect, 0.0, 0.0, 0.0,
            0.0, f, 0.0, 0.0,
            0.0, 0.0, depth_scale, -1.0,
            0.0, 0.0, depth_offset, 0.0,
        );
        projection
    }

    /// `projection × inverse(model)` for a camera placed at `position` with
    /// `rotation`.
    pub fn view_projection(&self, position: &Position, rotation: &Rotation) -> Matrix4<f32> {
        let model = model_matrix(Some(position), Some(rotation), None);
        let view = model.invert().unwrap_or_else(|| {
            log::warn!("Camera model matrix is singular, using identity view");
            Matrix4::identity()
        });
        self.projection_matrix() * view
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(Deg(60.0), 16.0 / 9.0, 1e-3, 1e3)
    }
}

/// View-projection matrix of `camera`, or the identity (with an error logged)
/// when the entity lacks any of its camera components.
pub fn perspective_view_matrix(world: &World, camera: Entity) -> Matrix4<f32> {
    let lookup = || -> Result<Option<Matrix4<f32>>, EcsError> {
        let Some(projection) = world.get_component::<PerspectiveCamera>(camera)? else {
            log::error!("Entity {camera} has no PerspectiveCamera component");
            return Ok(None);
        };
        let Some(position) = world.get_component::<Position>(camera)? else {
            log::error!("Camera {camera} does not have a Position component");
            return Ok(None);
        };
        let Some(rotation) = world.get_component::<Rotation>(camera)? else {
            log::error!("Camera {camera} does not have a Rotation component");
            return Ok(None);
        };
        Ok(Some(projection.view_projection(position, rotation)))
    };

    match lookup() {
        Ok(Some(matrix)) => matrix,
        _ => Matrix4::identity(),
    }
}

/// Turns `entity` to face `target`. Entities without a Position or Rotation
/// are left untouched, as are targets closer than `1e-6`.
pub fn look_at(world: &mut World, entity: Entity, target: Vector3<f32>) -> Result<(), EcsError> {
    let Some(position) = world.get_component::<Position>(entity)?.copied() else {
        log::error!("Entity {entity} does not have a Position component");
        return Ok(());
    };
    let to_target = target - position.0;
    if to_target.magnitude() < 1e-6 {
        log::warn!("Look-at target is too close to entity {entity}");
        return Ok(());
    }
    let direction = to_target.normalize();

    let Some(rotation) = world.get_component_mut::<Rotation>(entity)? else {
        log::error!("Entity {entity} does not have a Rotation component");
        return Ok(());
    };
    rotation.set_euler_degrees(
        direction.y.asin().to_degrees(),
        180.0 + direction.x.atan2(direction.z).to_degrees(),
        0.0,
    );
    Ok(())
}

/// Camera data as laid out in the scene uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update(&mut self, world: &World, camera: Entity) {
        self.view_proj = perspective_view_matrix(world, camera).into();
        if let Ok(Some(position)) = world.get_component::<Position>(camera) {
            self.view_position = position.0.extend(1.0).into();
        }
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use cgmath::Vector4;

    use super::*;

    const EPSILON: f32 = 1e-4;

    fn forward(world: &World, entity: Entity) -> Vector3<f32> {
        let rotation = world.get_component::<Rotation>(entity).unwrap().unwrap();
        (rotation.to_matrix() * Vector4::new(0.0, 0.0, -1.0, 0.0)).truncate()
    }

    fn camera_world() -> (World, Entity) {
        let mut world = World::new();
        let camera = world.create_entity();
        world.add_component(camera, Position::default()).unwrap();
        world.add_component(camera, Rotation::default()).unwrap();
        (world, camera)
    }

    #[test]
    fn near_and_far_map_to_depth_range() {
        let camera = PerspectiveCamera::new(Deg(90.0), 1.0, 0.5, 100.0);
        let projection = camera.projection_matrix();
        for (z, depth) in [(-0.5, 0.0), (-100.0, 1.0)] {
            let clip = projection * Vector4::new(0.0, 0.0, z, 1.0);
            assert_abs_diff_eq!(clip.z / clip.w, depth, epsilon = EPSILON);
        }
    }

    #[test]
    fn infinite_far_plane() {
        let camera = PerspectiveCamera::new(Deg(60.0), 1.0, 0.1, f32::INFINITY);
        let projection = camera.projection_matrix();
        assert_eq!(projection.z.z, -1.0);
        assert_eq!(projection.w.z, -0.1);
        assert_eq!(projection.z.w, -1.0);
    }

    #[test]
    fn camera_without_projection_yields_identity() {
        let (world, camera) = camera_world();
        assert_eq!(perspective_view_matrix(&world, camera), Matrix4::identity());
        assert_eq!(perspective_view_matrix(&world, 99), Matrix4::identity());
    }

    #[test]
    fn view_moves_world_opposite_to_camera() {
        let (mut world, camera) = camera_world();
        world.add_component(camera, PerspectiveCamera::default()).unwrap();
        world.add_component(camera, Position::new(0.0, 0.0, 10.0)).unwrap();

        let view_proj = perspective_view_matrix(&world, camera);
        let origin = view_proj * Vector4::new(0.0, 0.0, 0.0, 1.0);
        // origin sits 10 units in front of the camera
        assert_abs_diff_eq!(origin.w, 10.0, epsilon = EPSILON);
        assert_abs_diff_eq!(origin.x, 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(origin.y, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn look_at_faces_the_target() {
        let (mut world, camera) = camera_world();
        let targets = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -4.0),
            Vector3::new(2.0, 2.0, 0.0),
        ];
        for target in targets {
            look_at(&mut world, camera, target).unwrap();
            assert_abs_diff_eq!(forward(&world, camera), target.normalize(), epsilon = EPSILON);
        }
    }

    #[test]
    fn look_at_ignores_coincident_target() {
        let (mut world, camera) = camera_world();
        world.add_component(camera, Rotation::from_euler_degrees(0.0, 30.0, 0.0)).unwrap();
        look_at(&mut world, camera, Vector3::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(
            world.get_component::<Rotation>(camera).unwrap(),
            Some(&Rotation::from_euler_degrees(0.0, 30.0, 0.0))
        );
    }
}
