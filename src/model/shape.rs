use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::material::{MaterialFlags, MaterialList};
use super::mesh::Mesh;
use super::node::{
    Decal, DecalState, DetailLevel, IflMaterial, Node, Object, ObjectState, SubShape, Trigger,
};
use super::sequence::{NodeChannel, Sequence, SequenceFlags};
use super::string_table::StringTable;
use crate::error::{DtsError, DtsResult};
use crate::math::{self, Box3, glm};

/// The whole model. Every cross reference is an index into one of these
/// vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    pub nodes: Vec<Node>,
    pub objects: Vec<Object>,
    pub decals: Vec<Decal>,
    pub subshapes: Vec<SubShape>,
    pub ifl_materials: Vec<IflMaterial>,
    pub meshes: Vec<Mesh>,

    // Parallel to `nodes`
    pub default_rotations: Vec<glm::Quat>,
    pub default_translations: Vec<glm::Vec3>,

    // Keyframe pools indexed by sequence bases
    pub node_rotations: Vec<glm::Quat>,
    pub node_translations: Vec<glm::Vec3>,
    pub node_uniform_scales: Vec<f32>,
    pub node_aligned_scales: Vec<glm::Vec3>,
    pub node_arbitrary_scale_factors: Vec<glm::Vec3>,
    pub node_arbitrary_scale_rots: Vec<glm::Quat>,
    pub ground_translations: Vec<glm::Vec3>,
    pub ground_rotations: Vec<glm::Quat>,

    pub object_states: Vec<ObjectState>,
    pub decal_states: Vec<DecalState>,
    pub triggers: Vec<Trigger>,
    pub detail_levels: Vec<DetailLevel>,
    pub sequences: Vec<Sequence>,
    pub materials: MaterialList,
    pub names: StringTable,

    pub smallest_visible_size: i32, // stored as s32, not f32
    pub smallest_visible_dl: i32,
    pub radius: f32,
    pub tube_radius: f32,
    pub center: glm::Vec3,
    pub bounds: Box3,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            objects: Vec::new(),
            decals: Vec::new(),
            subshapes: Vec::new(),
            ifl_materials: Vec::new(),
            meshes: Vec::new(),
            default_rotations: Vec::new(),
            default_translations: Vec::new(),
            node_rotations: Vec::new(),
            node_translations: Vec::new(),
            node_uniform_scales: Vec::new(),
            node_aligned_scales: Vec::new(),
            node_arbitrary_scale_factors: Vec::new(),
            node_arbitrary_scale_rots: Vec::new(),
            ground_translations: Vec::new(),
            ground_rotations: Vec::new(),
            object_states: Vec::new(),
            decal_states: Vec::new(),
            triggers: Vec::new(),
            detail_levels: Vec::new(),
            sequences: Vec::new(),
            materials: MaterialList::default(),
            names: StringTable::default(),
            smallest_visible_size: 0,
            smallest_visible_dl: 0,
            radius: 0.0,
            tube_radius: 0.0,
            center: glm::vec3(0.0, 0.0, 0.0),
            bounds: Box3::default(),
        }
    }
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_of(&self, index: i32) -> &str {
        self.names.get(index)
    }

    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.name >= 0 && self.names.get(n.name) == name)
    }

    pub fn find_object(&self, name: &str) -> Option<usize> {
        self.objects
            .iter()
            .position(|o| o.name >= 0 && self.names.get(o.name) == name)
    }

    pub fn find_sequence(&self, name: &str) -> Option<usize> {
        self.sequences
            .iter()
            .position(|s| s.name_index >= 0 && self.names.get(s.name_index) == name)
    }

    /// Root-to-node chain of `node`, root first.
    fn node_chain(&self, node: usize) -> DtsResult<Vec<usize>> {
        let mut chain = vec![node];
        let mut current = node;
        loop {
            let parent = self
                .nodes
                .get(current)
                .ok_or_else(|| DtsError::out_of_range("node", current as i64, self.nodes.len()))?
                .parent;
            if parent < 0 {
                break;
            }
            if chain.len() > self.nodes.len() {
                return Err(DtsError::CyclicNode(node));
            }
            current = parent as usize;
            chain.push(current);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Accumulated default transform of `node`. A negative index yields the
    /// identity.
    pub fn node_world_transform(&self, node: i32) -> DtsResult<(glm::Vec3, glm::Quat)> {
        let mut trans = glm::vec3(0.0, 0.0, 0.0);
        let mut rot = math::quat_identity();
        if node < 0 {
            return Ok((trans, rot));
        }
        for n in self.node_chain(node as usize)? {
            let def_trans = self
                .default_translations
                .get(n)
                .ok_or_else(|| DtsError::out_of_range("default translation", n as i64, self.default_translations.len()))?;
            let def_rot = self
                .default_rotations
                .get(n)
                .ok_or_else(|| DtsError::out_of_range("default rotation", n as i64, self.default_rotations.len()))?;
            trans += math::apply(&rot, def_trans);
            rot = def_rot * rot;
        }
        Ok((trans, rot))
    }

    /// Meshes of every object with the world transform of its node.
    fn placed_meshes(&self) -> DtsResult<Vec<(&Mesh, glm::Vec3, glm::Quat)>> {
        let mut out = Vec::new();
        for object in &self.objects {
            let (trans, rot) = self.node_world_transform(object.node)?;
            for m in object.mesh_range() {
                let mesh = self
                    .meshes
                    .get(m)
                    .ok_or_else(|| DtsError::out_of_range("mesh", m as i64, self.meshes.len()))?;
                out.push((mesh, trans, rot));
            }
        }
        Ok(out)
    }

    pub fn calculate_bounds(&mut self) -> DtsResult<()> {
        if self.objects.is_empty() {
            return Ok(());
        }
        let mut bounds = Box3::empty();
        for (mesh, trans, rot) in self.placed_meshes()? {
            if !mesh.verts.is_empty() {
                bounds.union(&mesh.bounds_from(&trans, &rot));
            }
        }
        self.bounds = if bounds.is_empty() { Box3::default() } else { bounds };
        Ok(())
    }

    pub fn calculate_center(&mut self) {
        self.center = self.bounds.center();
    }

    pub fn calculate_radius(&mut self) -> DtsResult<()> {
        let center = self.center;
        self.radius = self
            .placed_meshes()?
            .into_iter()
            .map(|(mesh, trans, rot)| mesh.radius_from(&trans, &rot, &center))
            .fold(0.0, f32::max);
        Ok(())
    }

    pub fn calculate_tube_radius(&mut self) -> DtsResult<()> {
        let center = self.center;
        self.tube_radius = self
            .placed_meshes()?
            .into_iter()
            .map(|(mesh, trans, rot)| mesh.tube_radius_from(&trans, &rot, &center))
            .fold(0.0, f32::max);
        Ok(())
    }

    /// Pick the smallest non-collision detail level. Detail levels are
    /// expected largest first.
    pub fn calc_smallest_size(&mut self) {
        let smallest = self
            .detail_levels
            .iter()
            .enumerate()
            .filter(|(_, d)| d.size >= 0.0)
            .fold(None::<(usize, f32)>, |best, (i, d)| match best {
                Some((_, size)) if d.size >= size => best,
                _ => Some((i, d.size)),
            });
        match smallest {
            Some((dl, size)) => {
                self.smallest_visible_dl = dl as i32;
                self.smallest_visible_size = size as i32;
            }
            None => {
                self.smallest_visible_dl = 0;
                self.smallest_visible_size = 0;
            }
        }
    }

    /// Clamp the smallest visible size to `size` (at least 1) and select the
    /// smallest detail level still at or above it.
    pub fn set_smallest_size(&mut self, size: f32) {
        let size = size.max(1.0);
        self.smallest_visible_size = size as i32;
        self.smallest_visible_dl = self
            .detail_levels
            .iter()
            .enumerate()
            .filter(|(_, d)| d.size >= size)
            .fold(None::<(usize, f32)>, |best, (i, d)| match best {
                Some((_, s)) if d.size >= s => best,
                _ => Some((i, d.size)),
            })
            .map_or(0, |(i, _)| i as i32);
    }

    /// Rebuild the derived link fields and detail level poly counts.
    pub fn init(&mut self) -> DtsResult<()> {
        for n in &mut self.nodes {
            n.first_object = -1;
            n.first_child = -1;
            n.next_sibling = -1;
        }
        let num_nodes = self.nodes.len();
        for i in 0..num_nodes {
            let parent = self.nodes[i].parent;
            if parent < 0 {
                continue;
            }
            let parent = parent as usize;
            if parent >= num_nodes {
                return Err(DtsError::out_of_range("node", parent as i64, num_nodes));
            }
            match self.nodes[parent].first_child {
                c if c < 0 => self.nodes[parent].first_child = i as i32,
                mut child => {
                    while self.nodes[child as usize].next_sibling >= 0 {
                        child = self.nodes[child as usize].next_sibling;
                    }
                    self.nodes[child as usize].next_sibling = i as i32;
                }
            }
        }

        for o in &mut self.objects {
            o.sibling = -1;
            o.first_decal = -1;
        }
        for i in 0..self.objects.len() {
            let node = self.objects[i].node;
            if node < 0 {
                continue;
            }
            let node = node as usize;
            if node >= num_nodes {
                return Err(DtsError::out_of_range("node", node as i64, num_nodes));
            }
            match self.nodes[node].first_object {
                o if o < 0 => self.nodes[node].first_object = i as i32,
                mut object => {
                    while self.objects[object as usize].sibling >= 0 {
                        object = self.objects[object as usize].sibling;
                    }
                    self.objects[object as usize].sibling = i as i32;
                }
            }
        }

        for d in &mut self.decals {
            d.sibling = -1;
        }
        for i in 0..self.decals.len() {
            let object = self.decals[i].object;
            if object < 0 {
                continue;
            }
            let object = object as usize;
            if object >= self.objects.len() {
                return Err(DtsError::out_of_range("object", object as i64, self.objects.len()));
            }
            match self.objects[object].first_decal {
                d if d < 0 => self.objects[object].first_decal = i as i32,
                mut decal => {
                    while self.decals[decal as usize].sibling >= 0 {
                        decal = self.decals[decal as usize].sibling;
                    }
                    self.decals[decal as usize].sibling = i as i32;
                }
            }
        }

        for i in 0..self.detail_levels.len() {
            let count = self.detail_poly_count(&self.detail_levels[i])?;
            self.detail_levels[i].poly_count = count as i32;
        }
        Ok(())
    }

    fn detail_poly_count(&self, detail: &DetailLevel) -> DtsResult<usize> {
        if detail.is_billboard() {
            return Ok(2);
        }
        let ss = self
            .subshapes
            .get(detail.subshape as usize)
            .ok_or_else(|| DtsError::out_of_range("subshape", detail.subshape, self.subshapes.len()))?;
        let mut count = 0;
        for j in ss.objects() {
            let object = self
                .objects
                .get(j)
                .ok_or_else(|| DtsError::out_of_range("object", j as i64, self.objects.len()))?;
            if detail.object_detail < object.num_meshes {
                let m = (object.first_mesh + detail.object_detail) as usize;
                if let Some(mesh) = self.meshes.get(m) {
                    count += mesh.poly_count();
                }
            }
        }
        Ok(count)
    }

    /// Whether mesh `mesh_num` belongs to a detail level ahead of
    /// `skip_dl`, starting the walk at `cur_object` and `cur_decal`.
    pub fn check_skip(&self, mesh_num: i32, mut cur_object: usize, mut cur_decal: usize, skip_dl: usize) -> bool {
        if skip_dl == 0 {
            return false;
        }
        let Some(skip_detail) = self.detail_levels.get(skip_dl) else {
            return false;
        };
        let skip_ss = skip_detail.subshape;
        let Some(ss) = usize::try_from(skip_ss).ok().and_then(|s| self.subshapes.get(s)) else {
            return false;
        };
        let next_ss = self.subshapes.get(skip_ss as usize + 1);

        while let Some(object) = self.objects.get(cur_object) {
            let start = object.first_mesh;
            if mesh_num < start {
                break;
            }
            if mesh_num >= start + object.num_meshes {
                cur_object += 1;
                continue;
            }
            if ss.first_object > cur_object as i32 {
                return true;
            }
            if next_ss.is_none_or(|n| (cur_object as i32) < n.first_object) {
                return mesh_num - start < skip_detail.object_detail;
            }
            return false;
        }

        while let Some(decal) = self.decals.get(cur_decal) {
            let start = decal.first_mesh;
            if mesh_num < start {
                cur_decal += 1;
                continue;
            }
            if mesh_num >= start + decal.num_meshes {
                return false;
            }
            if ss.first_decal > cur_decal as i32 {
                return true;
            }
            if next_ss.is_none_or(|n| (cur_decal as i32) < n.first_decal) {
                return mesh_num - start < skip_detail.object_detail;
            }
            return false;
        }
        false
    }

    /// Add an IFL entry for every IFL-flagged material that has none yet.
    pub fn register_ifl_materials(&mut self) -> usize {
        let mut added = 0;
        for (slot, material) in self.materials.materials.iter().enumerate() {
            if !material.has_flag(MaterialFlags::IflMaterial) {
                continue;
            }
            if self.ifl_materials.iter().any(|ifl| ifl.slot == slot as i32) {
                continue;
            }
            let name = self.names.add(&material.name);
            self.ifl_materials.push(IflMaterial {
                name,
                slot: slot as i32,
                ..IflMaterial::default()
            });
            added += 1;
        }
        if added > 0 {
            debug!("registered {added} IFL materials");
        }
        added
    }

    /// Check every cross reference. Run before writing.
    pub fn validate(&self) -> DtsResult<()> {
        let num_nodes = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.parent >= num_nodes as i32 {
                return Err(DtsError::out_of_range("node", node.parent, num_nodes));
            }
            self.node_chain(i)?;
        }
        if self.default_rotations.len() != num_nodes || self.default_translations.len() != num_nodes {
            return Err(DtsError::ReferenceOutOfRange {
                what: "default transform",
                index: self.default_rotations.len().min(self.default_translations.len()) as i64,
                len: num_nodes,
            });
        }
        // Each pair shares one count on the wire
        if self.ground_rotations.len() != self.ground_translations.len() {
            return Err(DtsError::out_of_range(
                "ground rotation",
                self.ground_rotations.len() as i64,
                self.ground_translations.len(),
            ));
        }
        if self.node_arbitrary_scale_rots.len() != self.node_arbitrary_scale_factors.len() {
            return Err(DtsError::out_of_range(
                "arbitrary scale rotation",
                self.node_arbitrary_scale_rots.len() as i64,
                self.node_arbitrary_scale_factors.len(),
            ));
        }

        for object in &self.objects {
            if object.node >= num_nodes as i32 {
                return Err(DtsError::out_of_range("node", object.node, num_nodes));
            }
            let range = object.mesh_range();
            if object.first_mesh < 0 || range.end > self.meshes.len() {
                return Err(DtsError::out_of_range("mesh", range.end as i64 - 1, self.meshes.len()));
            }
            if object.num_meshes == 0 {
                warn!("object {} has no meshes", self.names.get(object.name));
            }
        }
        for decal in &self.decals {
            if decal.object >= self.objects.len() as i32 {
                return Err(DtsError::out_of_range("object", decal.object, self.objects.len()));
            }
        }
        for ss in &self.subshapes {
            if ss.objects().end > self.objects.len() {
                return Err(DtsError::out_of_range("object", ss.objects().end as i64 - 1, self.objects.len()));
            }
            if ss.nodes().end > num_nodes {
                return Err(DtsError::out_of_range("node", ss.nodes().end as i64 - 1, num_nodes));
            }
        }
        for detail in &self.detail_levels {
            if detail.subshape >= self.subshapes.len() as i32 {
                return Err(DtsError::out_of_range("subshape", detail.subshape, self.subshapes.len()));
            }
        }
        for ifl in &self.ifl_materials {
            if ifl.slot < 0 || ifl.slot as usize >= self.materials.len() {
                return Err(DtsError::out_of_range("material", ifl.slot, self.materials.len()));
            }
        }

        self.validate_materials()?;
        for (i, mesh) in self.meshes.iter().enumerate() {
            mesh.validate(i, self.materials.len())?;
            // A child reads its shared arrays from a mesh already read
            if mesh.parent >= 0 && mesh.parent as usize >= i {
                return Err(DtsError::out_of_range("parent mesh", mesh.parent, i));
            }
        }
        for seq in &self.sequences {
            self.validate_sequence(seq)?;
        }
        Ok(())
    }

    fn validate_materials(&self) -> DtsResult<()> {
        let len = self.materials.len();
        for (i, material) in self.materials.iter().enumerate() {
            // Material names go out with a one byte length
            if material.name.len() > u8::MAX as usize {
                return Err(DtsError::NameTooLong {
                    len: material.name.len(),
                    max: u8::MAX as usize,
                });
            }
            for (what, index) in material.auxiliary() {
                if index as usize >= len {
                    return Err(DtsError::ReferenceOutOfRange {
                        what,
                        index: index as i64,
                        len,
                    });
                }
            }
            // Walk auxiliary references depth first looking for a way back
            let mut stack: Vec<usize> = material.auxiliary().map(|(_, j)| j as usize).collect();
            let mut seen = vec![false; len];
            while let Some(j) = stack.pop() {
                if j == i {
                    return Err(DtsError::CyclicMaterial(i));
                }
                if std::mem::replace(&mut seen[j], true) {
                    continue;
                }
                if let Some(m) = self.materials.get(j) {
                    stack.extend(m.auxiliary().map(|(_, k)| k as usize).filter(|&k| k < len));
                }
            }
        }
        Ok(())
    }

    fn validate_sequence(&self, seq: &Sequence) -> DtsResult<()> {
        let m = &seq.matters;
        let expected = [
            ("rotation matters", m.rotation.len(), self.nodes.len()),
            ("translation matters", m.translation.len(), self.nodes.len()),
            ("scale matters", m.scale.len(), self.nodes.len()),
            ("decal matters", m.decal.len(), self.decals.len()),
            ("ifl matters", m.ifl.len(), self.ifl_materials.len()),
            ("vis matters", m.vis.len(), self.objects.len()),
            ("frame matters", m.frame.len(), self.objects.len()),
            ("matframe matters", m.mat_frame.len(), self.objects.len()),
        ];
        for (what, found, want) in expected {
            if found != want {
                return Err(DtsError::ReferenceOutOfRange {
                    what,
                    index: found as i64,
                    len: want,
                });
            }
        }

        let frames = seq.num_key_frames.max(0) as usize;
        let check = |what: &'static str, base: i32, count: usize, len: usize| {
            if base >= 0 && count > 0 && base as usize + count > len {
                Err(DtsError::out_of_range(what, (base as usize + count - 1) as i64, len))
            } else {
                Ok(())
            }
        };
        check(
            "node rotation",
            seq.base_rotation,
            seq.count_nodes(Some(NodeChannel::Rotation)) * frames,
            self.node_rotations.len(),
        )?;
        check(
            "node translation",
            seq.base_translation,
            seq.count_nodes(Some(NodeChannel::Translation)) * frames,
            self.node_translations.len(),
        )?;
        let scales = seq.count_nodes(Some(NodeChannel::Scale)) * frames;
        if seq.has_flag(SequenceFlags::UniformScale) {
            check("uniform scale", seq.base_scale, scales, self.node_uniform_scales.len())?;
        }
        if seq.has_flag(SequenceFlags::AlignedScale) {
            check("aligned scale", seq.base_scale, scales, self.node_aligned_scales.len())?;
        }
        if seq.has_flag(SequenceFlags::ArbitraryScale) {
            check("arbitrary scale", seq.base_scale, scales, self.node_arbitrary_scale_factors.len())?;
        }
        check(
            "ground frame",
            seq.first_ground_frame,
            seq.num_ground_frames.max(0) as usize,
            self.ground_translations.len(),
        )?;
        check(
            "trigger",
            seq.first_trigger,
            seq.num_triggers.max(0) as usize,
            self.triggers.len(),
        )?;
        if seq.base_object_state >= 0 && seq.base_object_state as usize > self.object_states.len() {
            return Err(DtsError::out_of_range("object state", seq.base_object_state, self.object_states.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::Material;
    use crate::model::MeshKind;

    fn two_node_shape() -> Shape {
        let mut shape = Shape::new();
        let root = shape.names.add("root");
        let child = shape.names.add("child");
        shape.nodes = vec![Node::new(root, -1), Node::new(child, 0)];
        shape.default_translations = vec![glm::vec3(1.0, 0.0, 0.0), glm::vec3(0.0, 2.0, 0.0)];
        shape.default_rotations = vec![math::quat_identity(); 2];
        let mut mesh = Mesh::new(MeshKind::Standard);
        mesh.verts = Arc::new(vec![glm::vec3(0.0, 0.0, 0.0), glm::vec3(0.0, 0.0, 1.0)]);
        shape.meshes.push(mesh);
        let name = shape.names.add("box");
        shape.objects.push(Object::new(name, 1, 0, 1));
        shape.subshapes.push(SubShape {
            num_nodes: 2,
            num_objects: 1,
            ..SubShape::default()
        });
        shape
    }

    #[test]
    fn world_transform_accumulates_parents() {
        let shape = two_node_shape();
        let (trans, rot) = shape.node_world_transform(1).unwrap();
        assert_eq!(trans, glm::vec3(1.0, 2.0, 0.0));
        assert!(math::quat_approx_eq(&rot, &math::quat_identity(), 1e-6));
    }

    #[test]
    fn bounds_use_node_placement() {
        let mut shape = two_node_shape();
        shape.calculate_bounds().unwrap();
        shape.calculate_center();
        shape.calculate_radius().unwrap();
        shape.calculate_tube_radius().unwrap();
        assert_eq!(shape.bounds.min, glm::vec3(1.0, 2.0, 0.0));
        assert_eq!(shape.bounds.max, glm::vec3(1.0, 2.0, 1.0));
        assert!((shape.radius - 0.5).abs() < 1e-6);
        assert!(shape.tube_radius.abs() < 1e-6);
    }

    #[test]
    fn init_links_children_and_objects() {
        let mut shape = two_node_shape();
        shape.nodes.push(Node::new(-1, 0));
        shape.default_translations.push(glm::vec3(0.0, 0.0, 0.0));
        shape.default_rotations.push(math::quat_identity());
        shape.init().unwrap();
        assert_eq!(shape.nodes[0].first_child, 1);
        assert_eq!(shape.nodes[1].next_sibling, 2);
        assert_eq!(shape.nodes[1].first_object, 0);
    }

    #[test]
    fn detail_poly_counts() {
        let mut shape = two_node_shape();
        shape.detail_levels = vec![
            DetailLevel {
                size: 64.0,
                ..DetailLevel::default()
            },
            DetailLevel {
                subshape: -1,
                size: 8.0,
                ..DetailLevel::default()
            },
        ];
        shape.meshes[0].indices = vec![0, 1, 0];
        shape.meshes[0].primitives = vec![crate::model::Primitive::new(0, 3, 0)];
        shape.init().unwrap();
        assert_eq!(shape.detail_levels[0].poly_count, 1);
        assert_eq!(shape.detail_levels[1].poly_count, 2);
    }

    #[test]
    fn smallest_size_selection() {
        let mut shape = Shape::new();
        for size in [128.0, 32.0, 4.0, -1.0] {
            shape.detail_levels.push(DetailLevel {
                size,
                ..DetailLevel::default()
            });
        }
        shape.calc_smallest_size();
        assert_eq!((shape.smallest_visible_dl, shape.smallest_visible_size), (2, 4));
        shape.set_smallest_size(16.0);
        assert_eq!((shape.smallest_visible_dl, shape.smallest_visible_size), (1, 16));
    }

    #[test]
    fn validate_catches_bad_references() {
        let mut shape = two_node_shape();
        shape.validate().unwrap();

        shape.nodes[0].parent = 1;
        assert!(matches!(shape.validate(), Err(DtsError::CyclicNode(_))));
        shape.nodes[0].parent = -1;

        shape.objects[0].num_meshes = 3;
        assert!(matches!(
            shape.validate(),
            Err(DtsError::ReferenceOutOfRange { what: "mesh", .. })
        ));
        shape.objects[0].num_meshes = 1;

        let mut a = Material::new("a", 0);
        a.bump = 1;
        let mut b = Material::new("b", 0);
        b.detail = 0;
        shape.materials.add(a);
        shape.materials.add(b);
        assert!(matches!(shape.validate(), Err(DtsError::CyclicMaterial(0))));
    }

    #[test]
    fn parents_come_before_their_children() {
        let mut shape = two_node_shape();
        shape.objects[0].num_meshes = 2;
        shape.meshes.push(Mesh::new(MeshKind::Standard));
        shape.meshes[1].parent = 0;
        shape.validate().unwrap();

        shape.meshes[1].parent = -1;
        shape.meshes[0].parent = 1;
        assert!(matches!(
            shape.validate(),
            Err(DtsError::ReferenceOutOfRange { what: "parent mesh", index: 1, len: 0 })
        ));
        shape.meshes[0].parent = 0;
        assert!(shape.validate().is_err());
    }

    #[test]
    fn long_material_names_are_refused() {
        let mut shape = two_node_shape();
        shape.materials.add(Material::new(&"m".repeat(300), 0));
        assert!(matches!(
            shape.validate(),
            Err(DtsError::NameTooLong { len: 300, .. })
        ));
    }

    #[test]
    fn skip_walks_objects() {
        let mut shape = two_node_shape();
        shape.objects[0].num_meshes = 2;
        shape.meshes.push(Mesh::new(MeshKind::Null));
        shape.detail_levels = vec![
            DetailLevel::default(),
            DetailLevel {
                object_detail: 1,
                ..DetailLevel::default()
            },
        ];
        assert!(!shape.check_skip(0, 0, 0, 0));
        assert!(shape.check_skip(0, 0, 0, 1));
        assert!(!shape.check_skip(1, 0, 0, 1));
    }

    #[test]
    fn ifl_materials_register_once() {
        let mut shape = Shape::new();
        shape
            .materials
            .add(Material::new("water.ifl", MaterialFlags::IflMaterial as u32));
        shape.materials.add(Material::new("rock", 0));
        assert_eq!(shape.register_ifl_materials(), 1);
        assert_eq!(shape.register_ifl_materials(), 0);
        assert_eq!(shape.ifl_materials[0].slot, 0);
        assert_eq!(shape.name_of(shape.ifl_materials[0].name), "water.ifl");
    }
}
