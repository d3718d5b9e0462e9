//! Assembling a shape from scratch.
//!
//! Exporters add nodes, objects, meshes, materials and sequences in any
//! order; the builder keeps every object's meshes contiguous as they
//! arrive and fills in the derived fields on [`ShapeBuilder::finalize`].

use std::io::{Read, Write};

use log::{debug, warn};
use rayon::prelude::*;

use crate::codec::{read_shape, write_shape};
use crate::error::{DtsError, DtsResult};
use crate::math::glm;
use crate::model::{
    DetailLevel, Material, Mesh, MeshKind, Node, Object, ObjectState, Sequence, Shape, SubShape,
};
use crate::settings::Settings;
use crate::stream::StreamHeader;

#[derive(Debug, Clone)]
pub struct ShapeBuilder {
    shape: Shape,
    settings: Settings,
}

impl Default for ShapeBuilder {
    fn default() -> Self {
        Self::with_settings(Settings::default())
    }
}

impl ShapeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        let mut shape = Shape::new();
        shape
            .names
            .set_case_sensitive(!settings.export.case_insensitive_names);
        Self { shape, settings }
    }

    /// Continue editing a shape that was loaded or built elsewhere.
    pub fn from_shape(shape: Shape, settings: Settings) -> Self {
        Self { shape, settings }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_shape(self) -> Shape {
        self.shape
    }

    /// Add a node below `parent` (`None` for a root) with its default
    /// transform relative to the parent.
    pub fn add_node(
        &mut self,
        name: &str,
        parent: Option<usize>,
        translation: glm::Vec3,
        rotation: glm::Quat,
    ) -> DtsResult<usize> {
        let num_nodes = self.shape.nodes.len();
        let parent = match parent {
            Some(p) if p >= num_nodes => {
                return Err(DtsError::out_of_range("node", p as i64, num_nodes));
            }
            Some(p) => p as i32,
            None => -1,
        };
        let name = self.shape.names.add(name);
        self.shape.nodes.push(Node::new(name, parent));
        self.shape.default_translations.push(translation);
        self.shape.default_rotations.push(rotation);
        Ok(num_nodes)
    }

    /// Index of the object called `name`, created on `node` if missing.
    pub fn add_object(&mut self, name: &str, node: Option<usize>) -> DtsResult<usize> {
        if let Some(i) = self.shape.find_object(name) {
            return Ok(i);
        }
        let node = match node {
            Some(n) if n >= self.shape.nodes.len() => {
                return Err(DtsError::out_of_range("node", n as i64, self.shape.nodes.len()));
            }
            Some(n) => n as i32,
            None => -1,
        };
        let name = self.shape.names.add(name);
        let first_mesh = self.shape.meshes.len() as i32;
        self.shape.objects.push(Object::new(name, 0, first_mesh, node));
        Ok(self.shape.objects.len() - 1)
    }

    /// Append `mesh` as the next detail of `object` and return its index
    /// in the shape's mesh list. Meshes of later objects move up by one.
    pub fn add_mesh_to_object(&mut self, object: usize, mesh: Mesh) -> DtsResult<usize> {
        let num_objects = self.shape.objects.len();
        let obj = *self
            .shape
            .objects
            .get(object)
            .ok_or_else(|| DtsError::out_of_range("object", object as i64, num_objects))?;

        let pos = if obj.num_meshes > 0 {
            (obj.first_mesh + obj.num_meshes) as usize
        } else {
            self.shape.meshes.len()
        };
        let shifted = pos as i32;

        if pos < self.shape.meshes.len() {
            for (i, o) in self.shape.objects.iter_mut().enumerate() {
                if i != object && o.num_meshes > 0 && o.first_mesh >= shifted {
                    o.first_mesh += 1;
                }
            }
            for d in &mut self.shape.decals {
                if d.num_meshes > 0 && d.first_mesh >= shifted {
                    d.first_mesh += 1;
                }
            }
            for m in &mut self.shape.meshes {
                if m.parent >= shifted {
                    m.parent += 1;
                }
            }
        }

        self.shape.meshes.insert(pos, mesh);
        let o = &mut self.shape.objects[object];
        if o.num_meshes == 0 {
            o.first_mesh = shifted;
        }
        o.num_meshes += 1;
        Ok(pos)
    }

    /// Add a material, or return the existing one with the same name.
    pub fn add_material(&mut self, material: Material) -> usize {
        match self.shape.materials.find(&material.name) {
            Some(i) => i,
            None => self.shape.materials.add(material),
        }
    }

    /// Add a detail level drawing object detail `object_detail` of the
    /// first subshape at pixel size `size`. A negative size marks a
    /// collision detail.
    pub fn add_detail_level(&mut self, name: &str, object_detail: i32, size: f32) -> usize {
        let name = self.shape.names.add(name);
        self.shape.detail_levels.push(DetailLevel {
            name,
            subshape: 0,
            object_detail,
            size,
            ..DetailLevel::default()
        });
        self.shape.detail_levels.len() - 1
    }

    /// Add `sequence` under `name`. Its keyframes must already be in the
    /// shape's pools at the sequence's base indices.
    pub fn add_sequence(&mut self, name: &str, mut sequence: Sequence) -> usize {
        sequence.name_index = self.shape.names.add(name);
        self.shape.sequences.push(sequence);
        self.shape.sequences.len() - 1
    }

    fn mesh_mut(&mut self, mesh: usize) -> DtsResult<&mut Mesh> {
        let len = self.shape.meshes.len();
        self.shape
            .meshes
            .get_mut(mesh)
            .ok_or_else(|| DtsError::out_of_range("mesh", mesh as i64, len))
    }

    pub fn stripify(&mut self, mesh: usize, cache_size: usize) -> DtsResult<()> {
        let mut settings = self.settings.strip.clone();
        settings.cache_size = cache_size;
        self.mesh_mut(mesh)?.wind_strip(&settings);
        Ok(())
    }

    pub fn sort(&mut self, mesh: usize, max_depth: u32, num_big_faces: usize) -> DtsResult<()> {
        let mut settings = self.settings.sort.clone();
        settings.max_depth = max_depth;
        settings.num_big_faces = num_big_faces;
        self.mesh_mut(mesh)?.sort_mesh(&settings)
    }

    /// Strip every mesh that has faces, using the configured strip settings.
    pub fn stripify_all(&mut self) {
        let settings = &self.settings.strip;
        self.shape
            .meshes
            .par_iter_mut()
            .filter(|m| !m.primitives.is_empty() && m.kind() != MeshKind::Null)
            .for_each(|m| m.wind_strip(settings));
    }

    /// Sort every standard mesh that draws with a translucent material.
    /// Returns how many meshes were sorted.
    pub fn sort_translucent(&mut self) -> DtsResult<usize> {
        let settings = &self.settings.sort;
        let materials = &self.shape.materials;
        let is_translucent = |m: &Mesh| {
            m.kind() == MeshKind::Standard
                && m.primitives.iter().any(|p| {
                    p.material()
                        .and_then(|i| materials.get(i as usize))
                        .is_some_and(Material::is_translucent)
                })
        };
        let candidates: Vec<&mut Mesh> = self
            .shape
            .meshes
            .iter_mut()
            .filter(|m| is_translucent(m))
            .collect();
        let count = candidates.len();
        candidates
            .into_par_iter()
            .try_for_each(|m| m.sort_mesh(settings))?;
        debug!("sorted {count} translucent meshes");
        Ok(count)
    }

    /// Fill in every derived field and check the result. Must run before
    /// `serialize` on a freshly built shape.
    pub fn finalize(&mut self) -> DtsResult<()> {
        let shape = &mut self.shape;

        if shape.subshapes.is_empty() && (!shape.nodes.is_empty() || !shape.objects.is_empty()) {
            shape.subshapes.push(SubShape {
                first_node: 0,
                first_object: 0,
                first_decal: 0,
                num_nodes: shape.nodes.len() as i32,
                num_objects: shape.objects.len() as i32,
                num_decals: shape.decals.len() as i32,
            });
        }
        for o in &shape.objects {
            if o.num_meshes == 0 {
                warn!("object {} has no meshes", shape.names.get(o.name));
            }
        }
        if shape.object_states.len() < shape.objects.len() {
            shape
                .object_states
                .resize(shape.objects.len(), ObjectState::default());
        }
        shape.register_ifl_materials();

        let (nodes, decals, ifls, objects) = (
            shape.nodes.len(),
            shape.decals.len(),
            shape.ifl_materials.len(),
            shape.objects.len(),
        );
        for seq in &mut shape.sequences {
            seq.matters.truncate(nodes, decals, ifls, objects);
        }

        for mesh in shape.meshes.iter_mut().filter(|m| !m.verts.is_empty()) {
            mesh.update_extents();
        }

        shape.init()?;
        shape.calculate_bounds()?;
        shape.calculate_center();
        shape.calculate_radius()?;
        shape.calculate_tube_radius()?;
        shape.calc_smallest_size();
        shape.validate()?;

        debug!(
            "finalized shape: {} nodes, {} objects, {} meshes, radius {:.3}",
            shape.nodes.len(),
            shape.objects.len(),
            shape.meshes.len(),
            shape.radius
        );
        Ok(())
    }

    /// Write the shape. With sequence export turned off the sequences are
    /// left out of the file; keyframe arrays still go out.
    pub fn serialize<W: Write>(&self, w: &mut W) -> DtsResult<StreamHeader> {
        let export = &self.settings.export;
        if export.export_sequences || self.shape.sequences.is_empty() {
            return write_shape(w, &self.shape, export.exporter_version);
        }
        debug!("leaving out {} sequences", self.shape.sequences.len());
        let without = Shape {
            sequences: Vec::new(),
            ..self.shape.clone()
        };
        write_shape(w, &without, export.exporter_version)
    }

    pub fn deserialize<R: Read>(r: &mut R, settings: Settings) -> DtsResult<Self> {
        let shape = read_shape(r)?;
        Ok(Self::from_shape(shape, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MaterialFlags, Primitive, PrimitiveType, Triangle};
    use std::io::Cursor;

    fn identity() -> glm::Quat {
        glm::quat_identity()
    }

    fn quad(z: f32, material: u32) -> Mesh {
        let mut mesh = Mesh::new(MeshKind::Standard);
        mesh.verts = std::sync::Arc::new(vec![
            glm::vec3(0.0, 0.0, z),
            glm::vec3(1.0, 0.0, z),
            glm::vec3(1.0, 1.0, z),
            glm::vec3(0.0, 1.0, z),
        ]);
        mesh.tverts = std::sync::Arc::new(vec![glm::vec2(0.0, 0.0); 4]);
        mesh.normals = std::sync::Arc::new(vec![glm::vec3(0.0, 0.0, 1.0); 4]);
        mesh.verts_per_frame = 4;
        mesh.set_triangles(&[
            Triangle::new(0, 1, 2, material),
            Triangle::new(0, 2, 3, material),
        ]);
        mesh
    }

    fn two_objects() -> ShapeBuilder {
        let mut b = ShapeBuilder::new();
        let root = b
            .add_node("root", None, glm::vec3(0.0, 0.0, 0.0), identity())
            .unwrap();
        let a = b.add_object("a", Some(root)).unwrap();
        let c = b.add_object("c", Some(root)).unwrap();
        b.add_mesh_to_object(a, quad(0.0, 0)).unwrap();
        b.add_mesh_to_object(c, quad(1.0, 0)).unwrap();
        b.add_material(Material::new("base", 0));
        b.add_detail_level("detail2", 0, 2.0);
        b
    }

    #[test]
    fn late_meshes_keep_objects_contiguous() {
        let mut b = two_objects();
        let idx = b.add_mesh_to_object(0, quad(2.0, 0)).unwrap();
        assert_eq!(idx, 1);
        let s = b.shape();
        assert_eq!(s.objects[0].mesh_range(), 0..2);
        assert_eq!(s.objects[1].mesh_range(), 2..3);
        assert_eq!(s.meshes[2].verts[0].z, 1.0);
    }

    #[test]
    fn parent_links_follow_inserted_meshes() {
        let mut b = two_objects();
        let mut child = quad(1.0, 0);
        child.parent = 1;
        b.add_mesh_to_object(1, child).unwrap();
        b.add_mesh_to_object(0, quad(3.0, 0)).unwrap();
        assert_eq!(b.shape().meshes[3].parent, 2);
    }

    #[test]
    fn materials_are_shared_by_name() {
        let mut b = ShapeBuilder::new();
        let first = b.add_material(Material::new("Glass", 0));
        let again = b.add_material(Material::new("Glass", 0));
        assert_eq!(first, again);
        assert_eq!(b.shape().materials.len(), 1);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut b = ShapeBuilder::new();
        let err = b
            .add_node("orphan", Some(3), glm::vec3(0.0, 0.0, 0.0), identity())
            .unwrap_err();
        assert!(matches!(err, DtsError::ReferenceOutOfRange { what: "node", .. }));
    }

    #[test]
    fn finalize_fills_derived_fields() {
        let mut b = two_objects();
        b.finalize().unwrap();
        let s = b.shape();
        assert_eq!(s.subshapes.len(), 1);
        assert_eq!(s.subshapes[0].num_objects, 2);
        assert_eq!(s.object_states.len(), 2);
        assert_eq!(s.nodes[0].first_object, 0);
        assert_eq!(s.detail_levels[0].poly_count, 4);
        assert_eq!(s.smallest_visible_size, 2);
        assert!((s.bounds.max.z - 1.0).abs() < 1e-6);
        assert!(s.radius > 0.0);
    }

    #[test]
    fn passes_run_through_the_builder() {
        let mut b = two_objects();
        b.stripify(0, 16).unwrap();
        assert!(b.shape().meshes[0]
            .primitives
            .iter()
            .all(|p| p.kind() != PrimitiveType::Fan));

        b.sort(1, 2, 0).unwrap();
        assert_eq!(b.shape().meshes[1].kind(), MeshKind::Sorted);
        assert!(b.sort(9, 2, 0).is_err());
    }

    #[test]
    fn only_translucent_meshes_are_sorted() {
        let mut b = two_objects();
        b.add_material(Material::new("glass", MaterialFlags::Translucent as u32));
        b.shape_mut().meshes[1].set_material(1);
        assert_eq!(b.sort_translucent().unwrap(), 1);
        assert_eq!(b.shape().meshes[0].kind(), MeshKind::Standard);
        assert_eq!(b.shape().meshes[1].kind(), MeshKind::Sorted);
    }

    #[test]
    fn serialize_then_deserialize() {
        let mut b = two_objects();
        b.stripify_all();
        b.finalize().unwrap();
        let mut buf = Vec::new();
        b.serialize(&mut buf).unwrap();
        let back = ShapeBuilder::deserialize(&mut Cursor::new(buf), Settings::default()).unwrap();
        let s = back.shape();
        assert_eq!(s.objects.len(), 2);
        assert_eq!(s.meshes.len(), 2);
        assert_eq!(s.name_of(s.objects[1].name), "c");
        assert!(s.meshes[0].primitives.iter().all(Primitive::is_indexed));
    }

    #[test]
    fn sequences_stay_home_when_export_is_off() {
        let mut b = two_objects();
        let mut seq = Sequence::default();
        seq.matters.rotation = vec![true];
        b.add_sequence("idle", seq);
        b.finalize().unwrap();

        let mut with = Vec::new();
        b.serialize(&mut with).unwrap();
        let back = ShapeBuilder::deserialize(&mut Cursor::new(with), Settings::default()).unwrap();
        assert_eq!(back.shape().sequences.len(), 1);

        let mut settings = Settings::default();
        settings.export.export_sequences = false;
        let b = ShapeBuilder::from_shape(b.into_shape(), settings);
        let mut without = Vec::new();
        b.serialize(&mut without).unwrap();
        let back = ShapeBuilder::deserialize(&mut Cursor::new(without), Settings::default()).unwrap();
        assert!(back.shape().sequences.is_empty());
        assert_eq!(b.shape().sequences.len(), 1);
    }
}
