use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    Front,
    Back,
    On,
    Cross,
}

/// Plane stored as `normal . p = k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneF {
    pub normal: glm::Vec3,
    pub k: f32,
}

impl Default for PlaneF {
    fn default() -> Self {
        Self {
            normal: glm::vec3(0.0, 0.0, 1.0),
            k: 0.0,
        }
    }
}

impl PlaneF {
    pub const EPSILON: f32 = 1e-4;

    pub fn new(normal: glm::Vec3, k: f32) -> Self {
        Self { normal, k }
    }

    /// Plane through three points with the engine's winding:
    /// `normalize((v3 - v1) x (v2 - v1))`.
    pub fn from_points(v1: &glm::Vec3, v2: &glm::Vec3, v3: &glm::Vec3) -> Self {
        let cross = glm::cross(&(v3 - v1), &(v2 - v1));
        let len = glm::length(&cross);
        let normal = if len > 0.0 { cross / len } else { cross };
        Self {
            normal,
            k: glm::dot(&normal, v1),
        }
    }

    /// Signed distance along the normal, positive in front.
    pub fn distance(&self, p: &glm::Vec3) -> f32 {
        glm::dot(&self.normal, p) - self.k
    }

    /// `k - normal . p`, the legacy sign convention.
    pub fn dist_to_plane(&self, p: &glm::Vec3) -> f32 {
        self.k - glm::dot(&self.normal, p)
    }

    pub fn classify_point(&self, p: &glm::Vec3) -> PlaneSide {
        let d = self.distance(p);
        if d > Self::EPSILON {
            PlaneSide::Front
        } else if d < -Self::EPSILON {
            PlaneSide::Back
        } else {
            PlaneSide::On
        }
    }

    pub fn classify_triangle(&self, verts: [&glm::Vec3; 3]) -> PlaneSide {
        let mut front = false;
        let mut back = false;
        for v in verts {
            match self.classify_point(v) {
                PlaneSide::Front => front = true,
                PlaneSide::Back => back = true,
                _ => {}
            }
        }
        match (front, back) {
            (true, true) => PlaneSide::Cross,
            (true, false) => PlaneSide::Front,
            (false, true) => PlaneSide::Back,
            (false, false) => PlaneSide::On,
        }
    }

    /// Fraction along `p1 -> p2` where the segment meets the plane.
    /// `None` when the segment is parallel.
    pub fn intersect(&self, p1: &glm::Vec3, p2: &glm::Vec3) -> Option<f32> {
        let dir = p2 - p1;
        let den = glm::dot(&self.normal, &dir);
        if den.abs() < f32::EPSILON {
            return None;
        }
        Some(-self.distance(p1) / den)
    }

    /// Intersection point, only when the endpoints are on opposite sides.
    pub fn intersect_segment(&self, p1: &glm::Vec3, p2: &glm::Vec3) -> Option<glm::Vec3> {
        let d1 = self.distance(p1);
        let d2 = self.distance(p2);
        if (d1 > 0.0) == (d2 > 0.0) {
            return None;
        }
        let t = self.intersect(p1, p2)?;
        Some(p1 + (p2 - p1) * t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_winding() {
        let p = PlaneF::from_points(
            &glm::vec3(0.0, 0.0, 1.0),
            &glm::vec3(0.0, 1.0, 1.0),
            &glm::vec3(1.0, 0.0, 1.0),
        );
        assert!((p.normal - glm::vec3(0.0, 0.0, 1.0)).norm() < 1e-6);
        assert!((p.k - 1.0).abs() < 1e-6);
        assert_eq!(p.classify_point(&glm::vec3(0.0, 0.0, 2.0)), PlaneSide::Front);
        assert_eq!(p.classify_point(&glm::vec3(5.0, 5.0, 1.00001)), PlaneSide::On);
    }

    #[test]
    fn segment_must_cross() {
        let p = PlaneF::new(glm::vec3(1.0, 0.0, 0.0), 1.0);
        let hit = p
            .intersect_segment(&glm::vec3(0.0, 0.0, 0.0), &glm::vec3(4.0, 0.0, 0.0))
            .unwrap();
        assert!((hit.x - 1.0).abs() < 1e-6);
        assert!(p
            .intersect_segment(&glm::vec3(2.0, 0.0, 0.0), &glm::vec3(4.0, 0.0, 0.0))
            .is_none());
    }

    #[test]
    fn triangle_straddling_plane_is_cross() {
        let p = PlaneF::new(glm::vec3(0.0, 1.0, 0.0), 0.0);
        let a = glm::vec3(0.0, -1.0, 0.0);
        let b = glm::vec3(1.0, 1.0, 0.0);
        let c = glm::vec3(0.0, 0.0, 0.0);
        assert_eq!(p.classify_triangle([&a, &b, &c]), PlaneSide::Cross);
    }
}
