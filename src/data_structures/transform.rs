//! Transform components and the matrix math behind per-object GPU records.
//!
//! [`Position`], [`Rotation`] and [`Scale`] are optional on an entity; the
//! missing ones default to identity when the model matrix is composed as
//! `T · R · S`. [`TransformRaw`] is the exact record the vertex shader reads
//! from the shared dynamic-offset buffer.

use cgmath::{
    Deg, InnerSpace, Matrix, Matrix3, Matrix4, One, Quaternion, Rotation3, SquareMatrix, Vector3,
};

const SINGULAR_EPSILON: f32 = 1e-8;
const GIMBAL_THRESHOLD: f32 = 0.999_999_9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position(pub Vector3<f32>);

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    pub fn translate(&mut self, translation: Vector3<f32>) {
        self.0 += translation;
    }
}

impl Default for Position {
    fn default() -> Self {
        Self(Vector3::new(0.0, 0.0, 0.0))
    }
}

impl From<Vector3<f32>> for Position {
    fn from(position: Vector3<f32>) -> Self {
        Self(position)
    }
}

/// Unit quaternion rotation, authored in Euler degrees.
///
/// Euler angles follow the `Z · Y · X` composition: `x` is pitch, `y` yaw and
/// `z` roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub quaternion: Quaternion<f32>,
}

impl Rotation {
    /// Angles in degrees.
    pub fn from_euler_degrees(x: f32, y: f32, z: f32) -> Self {
        let quaternion = Quaternion::from_angle_z(Deg(z))
            * Quaternion::from_angle_y(Deg(y))
            * Quaternion::from_angle_x(Deg(x));
        Self { quaternion }
    }

    /// Decomposes the rotation matrix back into `[x, y, z]` degrees.
    ///
    /// Close to ±90° pitch the roll is folded into `z` and `x` is reported as 0.
    pub fn euler_degrees(&self) -> [f32; 3] {
        let m = Matrix3::from(normalised(self.quaternion));

        let y = (-m.x.z.clamp(-1.0, 1.0)).asin();
        let (x, z) = if m.x.z.abs() < GIMBAL_THRESHOLD {
            (m.y.z.atan2(m.z.z), m.x.y.atan2(m.x.x))
        } else {
            (0.0, (-m.y.x).atan2(m.y.y))
        };

        [x.to_degrees(), y.to_degrees(), z.to_degrees()]
    }

    pub fn set_euler_degrees(&mut self, x: f32, y: f32, z: f32) {
        *self = Self::from_euler_degrees(x, y, z);
    }

    /// Incremental rotation about the local x axis. Prefer this over setting
    /// Euler angles repeatedly to stay clear of gimbal lock.
    pub fn rotate_x(&mut self, degrees: f32) {
        self.quaternion = self.quaternion * Quaternion::from_angle_x(Deg(degrees));
    }

    pub fn rotate_y(&mut self, degrees: f32) {
        self.quaternion = self.quaternion * Quaternion::from_angle_y(Deg(degrees));
    }

    pub fn rotate_z(&mut self, degrees: f32) {
        self.quaternion = self.quaternion * Quaternion::from_angle_z(Deg(degrees));
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from(normalised(self.quaternion))
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            quaternion: Quaternion::one(),
        }
    }
}

impl From<Quaternion<f32>> for Rotation {
    fn from(quaternion: Quaternion<f32>) -> Self {
        Self { quaternion }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale(pub Vector3<f32>);

impl Scale {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vector3::new(x, y, z))
    }

    pub fn uniform(scale: f32) -> Self {
        Self::new(scale, scale, scale)
    }

    pub fn scale_by(&mut self, factor: f32) {
        self.0 *= factor;
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

fn normalised(quaternion: Quaternion<f32>) -> Quaternion<f32> {
    let magnitude = quaternion.magnitude();
    if magnitude < 1e-6 {
        log::warn!("Cannot normalise near-zero quaternion {quaternion:?}, leaving it unchanged");
        return quaternion;
    }
    quaternion / magnitude
}

/// `T · R · S`, treating every missing component as identity.
pub fn model_matrix(
    position: Option<&Position>,
    rotation: Option<&Rotation>,
    scale: Option<&Scale>,
) -> Matrix4<f32> {
    let mut model = Matrix4::identity();
    if let Some(position) = position {
        model = model * Matrix4::from_translation(position.0);
    }
    if let Some(rotation) = rotation {
        model = model * rotation.to_matrix();
    }
    if let Some(scale) = scale {
        model = model * Matrix4::from_nonuniform_scale(scale.0.x, scale.0.y, scale.0.z);
    }
    model
}

/// Transpose of the inverse of the upper-left 3×3 block of `model`.
///
/// A singular block yields the identity and a warning instead of NaNs.
pub fn normal_matrix(model: &Matrix4<f32>) -> Matrix3<f32> {
    let upper = Matrix3::from_cols(model.x.truncate(), model.y.truncate(), model.z.truncate());
    if upper.determinant().abs() < SINGULAR_EPSILON {
        log::warn!("Model matrix is singular, using identity normal matrix");
        return Matrix3::identity();
    }
    match upper.invert() {
        Some(inverse) => inverse.transpose(),
        None => {
            log::warn!("Model matrix is not invertible, using identity normal matrix");
            Matrix3::identity()
        }
    }
}

/// Per-object record in the shared transform buffer: a column-major 4×4
/// model matrix followed by the 3×3 normal matrix with every column padded
/// to 16 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformRaw {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
}

impl TransformRaw {
    pub const SIZE: u64 = std::mem::size_of::<TransformRaw>() as u64;

    pub fn from_model(model: Matrix4<f32>) -> Self {
        let normal = normal_matrix(&model);
        Self {
            model: model.into(),
            normal: [
                normal.x.extend(0.0).into(),
                normal.y.extend(0.0).into(),
                normal.z.extend(0.0).into(),
            ],
        }
    }

    pub fn translation(&self) -> [f32; 3] {
        let [x, y, z, _] = self.model[3];
        [x, y, z]
    }
}
