use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveType {
    Triangles = 0x0000_0000,
    Strip = 0x4000_0000,
    Fan = 0x8000_0000,
}

impl PrimitiveType {
    pub const MASK: u32 = 0xC000_0000;

    pub fn from_bits(bits: u32) -> Self {
        match bits & Self::MASK {
            0x4000_0000 => Self::Strip,
            0x8000_0000 => Self::Fan,
            // 0xC0000000 is unused by the engine; treat it like a list
            _ => Self::Triangles,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Triangles => "Triangles",
            Self::Strip => "Strip",
            Self::Fan => "Fan",
        }
    }
}

/// A run of indices drawn with one material.
///
/// `matindex` packs the primitive type, the indexed/no-material flags and
/// a 28-bit material index into one word, exactly as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Primitive {
    pub first_element: i32,
    pub num_elements: i32,
    pub matindex: u32,
}

impl Default for Primitive {
    fn default() -> Self {
        Self {
            first_element: 0,
            num_elements: 0,
            matindex: Self::INDEXED | Self::NO_MATERIAL,
        }
    }
}

impl Primitive {
    pub const INDEXED: u32 = 0x2000_0000;
    pub const NO_MATERIAL: u32 = 0x1000_0000;
    pub const MATERIAL_MASK: u32 = 0x0FFF_FFFF;

    pub fn new(first_element: i32, num_elements: i32, matindex: u32) -> Self {
        Self {
            first_element,
            num_elements,
            matindex,
        }
    }

    /// Build the packed word. `None` sets the no-material flag.
    pub fn pack(kind: PrimitiveType, material: Option<u32>, indexed: bool) -> u32 {
        let mut bits = kind as u32;
        if indexed {
            bits |= Self::INDEXED;
        }
        match material {
            Some(m) => bits | (m & Self::MATERIAL_MASK),
            None => bits | Self::NO_MATERIAL,
        }
    }

    pub fn kind(&self) -> PrimitiveType {
        PrimitiveType::from_bits(self.matindex)
    }

    pub fn is_strip(&self) -> bool {
        self.matindex & PrimitiveType::Strip as u32 != 0
    }

    pub fn is_indexed(&self) -> bool {
        self.matindex & Self::INDEXED != 0
    }

    pub fn has_material(&self) -> bool {
        self.matindex & Self::NO_MATERIAL == 0
    }

    pub fn material(&self) -> Option<u32> {
        self.has_material()
            .then_some(self.matindex & Self::MATERIAL_MASK)
    }

    /// Replace the material bits, keeping type and flags.
    pub fn set_material(&mut self, material: u32) {
        self.matindex = (self.matindex & !Self::MATERIAL_MASK) | (material & Self::MATERIAL_MASK);
    }

    /// Same flags with a different type.
    pub fn with_kind(matindex: u32, kind: PrimitiveType) -> u32 {
        (matindex & !PrimitiveType::MASK) | kind as u32
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.first_element.max(0) as usize;
        start..start + self.num_elements.max(0) as usize
    }
}

/// Node in a sorted mesh's draw-order tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub start_primitive: i32,
    pub end_primitive: i32,
    pub normal: glm::Vec3,
    pub k: f32,
    pub front_cluster: i32, // -1 ends traversal
    pub back_cluster: i32,  // -1 ends traversal
}

impl Default for Cluster {
    fn default() -> Self {
        Self {
            start_primitive: 0,
            end_primitive: 0,
            normal: glm::vec3(0.0, 0.0, 0.0),
            k: 0.0,
            front_cluster: -1,
            back_cluster: -1,
        }
    }
}

impl Cluster {
    pub fn is_leaf(&self) -> bool {
        self.front_cluster == self.back_cluster
    }

    /// Which child a camera at `camera` should visit next.
    pub fn next_for(&self, camera: &glm::Vec3) -> i32 {
        if glm::dot(&self.normal, camera) > self.k {
            self.front_cluster
        } else {
            self.back_cluster
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_keeps_flags_and_material() {
        for m in [0u32, 1, 77, 0x0FFF_FFFF] {
            let bits = Primitive::pack(PrimitiveType::Strip, Some(m), true);
            let p = Primitive::new(0, 4, bits);
            assert_eq!(p.material(), Some(m));
            assert!(p.is_strip());
            assert!(p.is_indexed());
        }
        let p = Primitive::new(0, 3, Primitive::pack(PrimitiveType::Triangles, None, true));
        assert_eq!(p.material(), None);
        assert_eq!(p.kind(), PrimitiveType::Triangles);
    }

    #[test]
    fn material_index_is_masked() {
        let bits = Primitive::pack(PrimitiveType::Triangles, Some(0x1234_5678), false);
        assert_eq!(bits & Primitive::MATERIAL_MASK, 0x0234_5678);
        assert_eq!(bits & PrimitiveType::MASK, 0);

        let mut p = Primitive::new(0, 3, Primitive::pack(PrimitiveType::Strip, Some(3), true));
        p.set_material(9);
        assert_eq!(p.material(), Some(9));
        assert!(p.is_strip());
    }
}
