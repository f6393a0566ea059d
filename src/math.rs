//! Linear algebra aliases shared by the scene, tracker and renderer.
//!
//! All transforms are 4x4 homogeneous matrices using the column-vector
//! convention (`world = parent * local * point`).

use nalgebra::{Matrix4, Point3, Vector3};

pub type Real = f64;
pub type Transform = Matrix4<Real>;
pub type Vec3 = Vector3<Real>;
pub type Pt3 = Point3<Real>;

pub fn identity() -> Transform {
    Transform::identity()
}

pub fn translation(x: Real, y: Real, z: Real) -> Transform {
    Transform::new_translation(&Vec3::new(x, y, z))
}

/// OpenGL-style perspective projection from a vertical field of view in degrees.
pub fn perspective(fov_y_deg: Real, aspect: Real, near: Real, far: Real) -> Transform {
    let f = 1.0 / (fov_y_deg.to_radians() / 2.0).tan();
    let depth = near - far;
    let mut m = Transform::zeros();
    m[(0, 0)] = f / aspect;
    m[(1, 1)] = f;
    m[(2, 2)] = (far + near) / depth;
    m[(2, 3)] = 2.0 * far * near / depth;
    m[(3, 2)] = -1.0;
    m
}

/// Project a point through `clip_from_world`, returning normalized device
/// coordinates, or `None` when the point is behind the camera.
pub fn project_ndc(clip_from_world: &Transform, point: &Pt3) -> Option<Vec3> {
    let clip = clip_from_world * point.to_homogeneous();
    if clip.w <= Real::EPSILON {
        return None;
    }
    Some(Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w))
}
