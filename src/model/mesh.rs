use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::primitive::{Cluster, Primitive, PrimitiveType};
use crate::error::{DtsError, DtsResult};
use crate::math::{self, Box3, glm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshKind {
    Standard = 0,
    Skin = 1,
    Decal = 2,
    Sorted = 3,
    Null = 4,
}

impl MeshKind {
    pub fn from_u32(tag: u32) -> DtsResult<Self> {
        match tag {
            0 => Ok(Self::Standard),
            1 => Ok(Self::Skin),
            2 => Ok(Self::Decal),
            3 => Ok(Self::Sorted),
            4 => Ok(Self::Null),
            other => Err(DtsError::MalformedMeshType(other)),
        }
    }

    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Skin => "Skin",
            Self::Decal => "Decal",
            Self::Sorted => "Sorted",
            Self::Null => "Null",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshFlags {
    Billboard = 0x8000_0000,
    HasDetail = 0x4000_0000,
    BillboardZ = 0x2000_0000,
    EncodedNormals = 0x1000_0000,
}

impl MeshFlags {
    pub fn from_bits(bits: u32) -> Vec<Self> {
        [
            Self::Billboard,
            Self::HasDetail,
            Self::BillboardZ,
            Self::EncodedNormals,
        ]
        .into_iter()
        .filter(|f| bits & *f as u32 != 0)
        .collect()
    }

    pub fn to_bits(flags: &[Self]) -> u32 {
        flags.iter().fold(0, |bits, f| bits | *f as u32)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Billboard => "Billboard",
            Self::HasDetail => "HasDetail",
            Self::BillboardZ => "BillboardZ",
            Self::EncodedNormals => "EncodedNormals",
        }
    }
}

/// Bone weights and rest poses. Shared with the parent mesh when the mesh
/// has one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkinData {
    pub node_transforms: Arc<Vec<glm::Mat4>>, // one inverse bind matrix per bone
    pub vindex: Arc<Vec<i32>>,
    pub bindex: Arc<Vec<i32>>,
    pub vweight: Arc<Vec<f32>>,
    pub node_index: Arc<Vec<i32>>, // bone -> shape node
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortedData {
    pub clusters: Vec<Cluster>,
    pub start_cluster: Vec<i32>, // per frame
    pub first_verts: Vec<i32>,
    pub num_verts: Vec<i32>,
    pub first_tverts: Vec<i32>, // per frame and material frame
    pub always_write_depth: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecalData {
    pub start_primitive: Vec<i32>,
    pub texgen_s: Vec<glm::Vec4>,
    pub texgen_t: Vec<glm::Vec4>,
    pub material_index: i32,
}

/// Per-kind payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MeshData {
    Standard,
    Skin(SkinData),
    Decal(DecalData),
    Sorted(SortedData),
    Null,
}

impl MeshData {
    pub fn for_kind(kind: MeshKind) -> Self {
        match kind {
            MeshKind::Standard => Self::Standard,
            MeshKind::Skin => Self::Skin(SkinData::default()),
            MeshKind::Decal => Self::Decal(DecalData::default()),
            MeshKind::Sorted => Self::Sorted(SortedData::default()),
            MeshKind::Null => Self::Null,
        }
    }
}

/// Three indices plus the packed material word of the primitive they came
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [u16; 3],
    pub matindex: u32,
}

impl Triangle {
    pub fn new(a: u16, b: u16, c: u16, matindex: u32) -> Self {
        Self {
            indices: [a, b, c],
            matindex,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        let [a, b, c] = self.indices;
        a == b || b == c || a == c
    }

    /// Rotation with the smallest index first, so windings compare equal.
    pub fn canonical(&self) -> [u16; 3] {
        let [a, b, c] = self.indices;
        if a <= b && a <= c {
            [a, b, c]
        } else if b <= a && b <= c {
            [b, c, a]
        } else {
            [c, a, b]
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    pub data: MeshData,
    pub num_frames: i32,
    pub mat_frames: i32,
    pub verts_per_frame: i32,
    pub parent: i32, // -1 means no parent
    pub flags: u32,

    // Shared with the parent mesh when `parent >= 0`
    pub verts: Arc<Vec<glm::Vec3>>,
    pub tverts: Arc<Vec<glm::Vec2>>,
    pub normals: Arc<Vec<glm::Vec3>>,
    pub enormals: Arc<Vec<u8>>,

    pub primitives: Vec<Primitive>,
    pub indices: Vec<u16>,
    pub merge_indices: Vec<u16>,

    pub bounds: Box3,
    pub center: glm::Vec3,
    pub radius: f32,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new(MeshKind::Null)
    }
}

impl Mesh {
    pub fn new(kind: MeshKind) -> Self {
        Self {
            data: MeshData::for_kind(kind),
            num_frames: 1,
            mat_frames: 1,
            verts_per_frame: 0,
            parent: -1,
            flags: 0,
            verts: Arc::default(),
            tverts: Arc::default(),
            normals: Arc::default(),
            enormals: Arc::default(),
            primitives: Vec::new(),
            indices: Vec::new(),
            merge_indices: Vec::new(),
            bounds: Box3::default(),
            center: glm::vec3(0.0, 0.0, 0.0),
            radius: 0.0,
        }
    }

    pub fn kind(&self) -> MeshKind {
        match self.data {
            MeshData::Standard => MeshKind::Standard,
            MeshData::Skin(_) => MeshKind::Skin,
            MeshData::Decal(_) => MeshKind::Decal,
            MeshData::Sorted(_) => MeshKind::Sorted,
            MeshData::Null => MeshKind::Null,
        }
    }

    pub fn skin(&self) -> Option<&SkinData> {
        match &self.data {
            MeshData::Skin(s) => Some(s),
            _ => None,
        }
    }

    pub fn skin_mut(&mut self) -> Option<&mut SkinData> {
        match &mut self.data {
            MeshData::Skin(s) => Some(s),
            _ => None,
        }
    }

    pub fn sorted(&self) -> Option<&SortedData> {
        match &self.data {
            MeshData::Sorted(s) => Some(s),
            _ => None,
        }
    }

    pub fn sorted_mut(&mut self) -> Option<&mut SortedData> {
        match &mut self.data {
            MeshData::Sorted(s) => Some(s),
            _ => None,
        }
    }

    pub fn decal(&self) -> Option<&DecalData> {
        match &self.data {
            MeshData::Decal(d) => Some(d),
            _ => None,
        }
    }

    pub fn has_flag(&self, flag: MeshFlags) -> bool {
        self.flags & flag as u32 != 0
    }

    pub fn set_flag(&mut self, flag: MeshFlags) {
        self.flags |= flag as u32;
    }

    /// Whether `other` reads the same vertex storage as this mesh.
    pub fn shares_vertices_with(&self, other: &Mesh) -> bool {
        Arc::ptr_eq(&self.verts, &other.verts)
    }

    /// Triangles drawn: `n - 2` per strip, `n / 3` per list.
    pub fn poly_count(&self) -> usize {
        self.primitives
            .iter()
            .map(|p| {
                let n = p.num_elements.max(0) as usize;
                if p.is_strip() { n.saturating_sub(2) } else { n / 3 }
            })
            .sum()
    }

    pub fn radius_from(&self, trans: &glm::Vec3, rot: &glm::Quat, center: &glm::Vec3) -> f32 {
        self.verts
            .iter()
            .map(|v| glm::length(&(math::apply(rot, v) + trans - center)))
            .fold(0.0, f32::max)
    }

    pub fn tube_radius_from(&self, trans: &glm::Vec3, rot: &glm::Quat, center: &glm::Vec3) -> f32 {
        self.verts
            .iter()
            .map(|v| math::length_xy(&(math::apply(rot, v) + trans - center)))
            .fold(0.0, f32::max)
    }

    /// Bounds of the vertices after applying `rot` then `trans`.
    pub fn bounds_from(&self, trans: &glm::Vec3, rot: &glm::Quat) -> Box3 {
        let mut b = Box3::empty();
        for v in self.verts.iter() {
            b.extend(&(math::apply(rot, v) + trans));
        }
        b
    }

    pub fn calculate_bounds(&mut self) {
        self.bounds = Box3::from_points(self.verts.iter());
    }

    pub fn calculate_center(&mut self) {
        self.center = self.bounds.center();
    }

    pub fn calculate_radius(&mut self) {
        let center = self.center;
        self.radius = self
            .verts
            .iter()
            .map(|v| glm::length(&(v - center)))
            .fold(0.0, f32::max);
    }

    /// Bounds, then center, then radius.
    pub fn update_extents(&mut self) {
        self.calculate_bounds();
        self.calculate_center();
        self.calculate_radius();
    }

    pub fn set_material(&mut self, material: u32) {
        for p in &mut self.primitives {
            p.set_material(material);
        }
    }

    pub fn set_frames(&mut self, num_frames: i32) {
        self.num_frames = num_frames.max(1);
        self.verts_per_frame = self.verts.len() as i32 / self.num_frames;
    }

    pub fn translate(&mut self, offset: &glm::Vec3) {
        for v in Arc::make_mut(&mut self.verts).iter_mut() {
            *v += offset;
        }
        self.update_extents();
    }

    pub fn rotate(&mut self, rot: &glm::Quat) {
        for v in Arc::make_mut(&mut self.verts).iter_mut() {
            *v = math::apply(rot, v);
        }
        self.update_extents();
    }

    /// Shape node driven by `bone`, for skins.
    pub fn node_index(&self, bone: usize) -> Option<i32> {
        self.skin().and_then(|s| s.node_index.get(bone).copied())
    }

    /// Bone slot for `node`, adding one with an identity rest pose when the
    /// node is not referenced yet. `None` for non-skin meshes.
    pub fn vertex_bone(&mut self, node: i32) -> Option<usize> {
        let skin = self.skin_mut()?;
        if let Some(b) = skin.node_index.iter().position(|&n| n == node) {
            return Some(b);
        }
        Arc::make_mut(&mut skin.node_index).push(node);
        Arc::make_mut(&mut skin.node_transforms).push(glm::Mat4::identity());
        Some(skin.node_index.len() - 1)
    }

    /// Store the inverse of the node's world transform as the bone's rest
    /// pose, so vertices can be taken into node space.
    pub fn set_node_transform(&mut self, bone: usize, trans: &glm::Vec3, rot: &glm::Quat) -> DtsResult<()> {
        let skin = self.skin_mut().ok_or_else(|| DtsError::InvalidMesh {
            index: 0,
            reason: "node transforms need a skin mesh".into(),
        })?;
        let len = skin.node_transforms.len();
        let slot = Arc::make_mut(&mut skin.node_transforms)
            .get_mut(bone)
            .ok_or_else(|| DtsError::out_of_range("bone", bone as i64, len))?;
        *slot = math::inverse_node_transform(trans, rot);
        Ok(())
    }

    /// Append one influence. Does nothing on non-skin meshes.
    pub fn add_weight(&mut self, vertex: i32, bone: i32, weight: f32) {
        if let Some(skin) = self.skin_mut() {
            Arc::make_mut(&mut skin.vindex).push(vertex);
            Arc::make_mut(&mut skin.bindex).push(bone);
            Arc::make_mut(&mut skin.vweight).push(weight);
        }
    }

    /// Deep copy whose arrays are no longer shared with anything.
    pub fn duplicate(&self) -> Mesh {
        let mut d = self.clone();
        d.verts = Arc::new(self.verts.as_ref().clone());
        d.tverts = Arc::new(self.tverts.as_ref().clone());
        d.normals = Arc::new(self.normals.as_ref().clone());
        d.enormals = Arc::new(self.enormals.as_ref().clone());
        if let MeshData::Skin(s) = &mut d.data {
            s.node_transforms = Arc::new(s.node_transforms.as_ref().clone());
            s.vindex = Arc::new(s.vindex.as_ref().clone());
            s.bindex = Arc::new(s.bindex.as_ref().clone());
            s.vweight = Arc::new(s.vweight.as_ref().clone());
            s.node_index = Arc::new(s.node_index.as_ref().clone());
        }
        d
    }

    /// Triangles of `prims`, strips and fans unwound with their winding
    /// kept. Degenerate strip triangles are dropped.
    pub fn triangles_of(&self, prims: &[Primitive]) -> Vec<Triangle> {
        let mut out = Vec::new();
        for p in prims {
            let Some(idx) = self.indices.get(p.range()) else {
                continue;
            };
            let matindex = Primitive::with_kind(p.matindex, PrimitiveType::Triangles);
            match p.kind() {
                PrimitiveType::Strip => {
                    for t in unwind_strip(idx) {
                        out.push(Triangle { indices: t, matindex });
                    }
                }
                PrimitiveType::Fan => {
                    for i in 2..idx.len() {
                        out.push(Triangle::new(idx[0], idx[i - 1], idx[i], matindex));
                    }
                }
                PrimitiveType::Triangles => {
                    for t in idx.chunks_exact(3) {
                        out.push(Triangle::new(t[0], t[1], t[2], matindex));
                    }
                }
            }
        }
        out
    }

    pub fn triangles(&self) -> Vec<Triangle> {
        self.triangles_of(&self.primitives)
    }

    /// Rewrite every primitive as single-triangle list primitives.
    pub fn convert_to_tris(&mut self) {
        let tris = self.triangles();
        let strips = self.primitives.iter().filter(|p| p.is_strip()).count();
        self.set_triangles(&tris);
        debug!("converted {strips} strips into {} triangles", tris.len());
    }

    /// Replace primitives and indices with one primitive per triangle.
    pub fn set_triangles(&mut self, tris: &[Triangle]) {
        self.indices.clear();
        self.primitives.clear();
        for t in tris {
            self.primitives.push(Primitive::new(
                self.indices.len() as i32,
                3,
                Primitive::with_kind(t.matindex, PrimitiveType::Triangles) | Primitive::INDEXED,
            ));
            self.indices.extend_from_slice(&t.indices);
        }
    }

    /// Check the mesh against its own arrays and the shape's material count.
    pub fn validate(&self, index: usize, num_materials: usize) -> DtsResult<()> {
        let invalid = |reason: String| DtsError::InvalidMesh { index, reason };
        if matches!(self.data, MeshData::Null) {
            return Ok(());
        }
        let num_verts = self.verts.len();
        if self.num_frames > 1
            && self.kind() != MeshKind::Sorted
            && (self.verts_per_frame * self.num_frames) as usize != num_verts
        {
            return Err(invalid(format!(
                "{} verts per frame x {} frames does not match {num_verts} verts",
                self.verts_per_frame, self.num_frames
            )));
        }
        for (i, p) in self.primitives.iter().enumerate() {
            if p.first_element < 0 || p.num_elements < 0 || p.range().end > self.indices.len() {
                return Err(invalid(format!("primitive {i} runs past the index list")));
            }
            // Both go out as u16
            if p.first_element > u16::MAX as i32 || p.num_elements > u16::MAX as i32 {
                return Err(invalid(format!(
                    "primitive {i} starts at {} with {} elements, past the 16-bit limit",
                    p.first_element, p.num_elements
                )));
            }
            if let Some(m) = p.material() {
                if m as usize >= num_materials {
                    return Err(DtsError::out_of_range("material", m as i64, num_materials));
                }
            }
        }
        if self.kind() != MeshKind::Decal && num_verts > 0 {
            if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= num_verts) {
                return Err(invalid(format!("index {bad} out of {num_verts} verts")));
            }
        }
        if let Some(skin) = self.skin() {
            if skin.vindex.len() != skin.bindex.len() || skin.vindex.len() != skin.vweight.len() {
                return Err(invalid("skin weight arrays differ in length".into()));
            }
            if skin.node_transforms.len() != skin.node_index.len() {
                return Err(invalid("one rest pose per bone required".into()));
            }
        }
        if let Some(decal) = self.decal() {
            if decal.texgen_s.len() != decal.texgen_t.len() {
                return Err(invalid("texgen S and T differ in length".into()));
            }
            if let Some(&bad) = decal
                .start_primitive
                .iter()
                .find(|&&s| s < -1 || s > self.primitives.len() as i32)
            {
                return Err(invalid(format!("decal start primitive {bad} out of range")));
            }
        }
        Ok(())
    }
}

/// Triangles of a strip: even ones `[i-2, i-1, i]`, odd ones
/// `[i, i-1, i-2]`. Degenerate triangles are skipped.
pub fn unwind_strip(strip: &[u16]) -> Vec<[u16; 3]> {
    let mut out = Vec::with_capacity(strip.len().saturating_sub(2));
    for i in 2..strip.len() {
        let t = if i % 2 == 0 {
            [strip[i - 2], strip[i - 1], strip[i]]
        } else {
            [strip[i], strip[i - 1], strip[i - 2]]
        };
        if t[0] != t[1] && t[1] != t[2] && t[0] != t[2] {
            out.push(t);
        }
    }
    out
}
