// Geometry primitives shared by the codec, the stripifiers and the sorter.

mod bounds;
mod plane;
mod quat;
mod quat16;

pub use nalgebra_glm as glm;

pub use bounds::Box3;
pub use plane::{PlaneF, PlaneSide};
pub use quat::*;
pub use quat16::Quat16;

pub type Point2 = glm::Vec2;
pub type Point3 = glm::Vec3;
pub type Point4 = glm::Vec4;

/// Length of `v` projected onto the xy plane.
pub fn length_xy(v: &Point3) -> f32 {
    (v.x * v.x + v.y * v.y).sqrt()
}

pub fn midpoint(a: &Point3, b: &Point3) -> Point3 {
    (a + b) * 0.5
}
