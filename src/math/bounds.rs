use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// Axis-aligned box, written on the wire as min then max.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Box3 {
    pub min: glm::Vec3,
    pub max: glm::Vec3,
}

impl Default for Box3 {
    fn default() -> Self {
        Self {
            min: glm::vec3(0.0, 0.0, 0.0),
            max: glm::vec3(0.0, 0.0, 0.0),
        }
    }
}

impl Box3 {
    const FAR: f32 = 10e30;

    pub fn new(min: glm::Vec3, max: glm::Vec3) -> Self {
        Self { min, max }
    }

    /// Inverted box that any `extend` call will replace.
    pub fn empty() -> Self {
        Self {
            min: glm::vec3(Self::FAR, Self::FAR, Self::FAR),
            max: glm::vec3(-Self::FAR, -Self::FAR, -Self::FAR),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, p: &glm::Vec3) {
        self.min = glm::min2(&self.min, p);
        self.max = glm::max2(&self.max, p);
    }

    pub fn union(&mut self, other: &Box3) {
        if other.is_empty() {
            return;
        }
        self.extend(&other.min);
        self.extend(&other.max);
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a glm::Vec3>) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.extend(p);
        }
        b
    }

    pub fn center(&self) -> glm::Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> glm::Vec3 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_to_fit_points() {
        let pts = [glm::vec3(1.0, -2.0, 0.0), glm::vec3(-1.0, 4.0, 3.0)];
        let b = Box3::from_points(pts.iter());
        assert_eq!(b.min, glm::vec3(-1.0, -2.0, 0.0));
        assert_eq!(b.max, glm::vec3(1.0, 4.0, 3.0));
        assert_eq!(b.center(), glm::vec3(0.0, 1.0, 1.5));
        assert!(Box3::empty().is_empty());
    }
}
