use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info};

use super::mesh::{read_mesh, write_mesh};
use super::trailer::{read_trailer, write_trailer};
use crate::error::{DtsError, DtsResult};
use crate::math::{Box3, glm};
use crate::model::{
    Decal, DecalState, DetailLevel, IflMaterial, MeshKind, Node, Object, ObjectState, Shape,
    StringTable, SubShape, Trigger,
};
use crate::stream::{DtsStream, StreamHeader, StreamValue};

macro_rules! record_value {
    ($ty:ident { $($field:ident: $kind:ident),+ $(,)? }) => {
        impl StreamValue for $ty {
            const WORDS32: usize = [$(stringify!($field)),+].len();

            fn store(&self, stream: &mut DtsStream) {
                $(stream.write::<$kind>(self.$field);)+
            }

            fn load(stream: &mut DtsStream) -> DtsResult<Self> {
                Ok($ty {
                    $($field: stream.read::<$kind>()?,)+
                })
            }
        }
    };
}

record_value!(Node {
    name: i32,
    parent: i32,
    first_object: i32,
    first_child: i32,
    next_sibling: i32,
});

record_value!(Object {
    name: i32,
    num_meshes: i32,
    first_mesh: i32,
    node: i32,
    sibling: i32,
    first_decal: i32,
});

record_value!(Decal {
    name: i32,
    num_meshes: i32,
    first_mesh: i32,
    object: i32,
    sibling: i32,
});

record_value!(IflMaterial {
    name: i32,
    slot: i32,
    first_frame: i32,
    time: i32,
    num_frames: i32,
});

record_value!(ObjectState {
    vis: f32,
    frame: i32,
    mat_frame: i32,
});

record_value!(DecalState { frame: i32 });

record_value!(Trigger { state: u32, pos: f32 });

record_value!(DetailLevel {
    name: i32,
    subshape: i32,
    object_detail: i32,
    size: f32,
    avg_error: f32,
    max_error: f32,
    poly_count: i32,
});

/// Counts group at the start of the body.
#[derive(Debug, Default)]
struct Counts {
    nodes: i32,
    objects: i32,
    decals: i32,
    subshapes: i32,
    ifl_materials: i32,
    node_rotations: i32,
    node_translations: i32,
    uniform_scales: i32,
    aligned_scales: i32,
    arbitrary_scales: i32,
    ground_frames: i32,
    object_states: i32,
    decal_states: i32,
    triggers: i32,
    detail_levels: i32,
    meshes: i32,
    names: i32,
}

impl Counts {
    fn of(shape: &Shape) -> Self {
        Self {
            nodes: shape.nodes.len() as i32,
            objects: shape.objects.len() as i32,
            decals: shape.decals.len() as i32,
            subshapes: shape.subshapes.len() as i32,
            ifl_materials: shape.ifl_materials.len() as i32,
            node_rotations: shape.node_rotations.len() as i32,
            node_translations: shape.node_translations.len() as i32,
            uniform_scales: shape.node_uniform_scales.len() as i32,
            aligned_scales: shape.node_aligned_scales.len() as i32,
            arbitrary_scales: shape.node_arbitrary_scale_factors.len() as i32,
            ground_frames: shape.ground_rotations.len() as i32,
            object_states: shape.object_states.len() as i32,
            decal_states: shape.decal_states.len() as i32,
            triggers: shape.triggers.len() as i32,
            detail_levels: shape.detail_levels.len() as i32,
            meshes: shape.meshes.len() as i32,
            names: shape.names.len() as i32,
        }
    }

    fn as_array(&self) -> [i32; 17] {
        [
            self.nodes,
            self.objects,
            self.decals,
            self.subshapes,
            self.ifl_materials,
            self.node_rotations,
            self.node_translations,
            self.uniform_scales,
            self.aligned_scales,
            self.arbitrary_scales,
            self.ground_frames,
            self.object_states,
            self.decal_states,
            self.triggers,
            self.detail_levels,
            self.meshes,
            self.names,
        ]
    }

    fn read(stream: &mut DtsStream) -> DtsResult<Self> {
        let mut c = [0i32; 17];
        for v in &mut c {
            *v = stream.read_s32()?;
        }
        let [
            nodes,
            objects,
            decals,
            subshapes,
            ifl_materials,
            node_rotations,
            node_translations,
            uniform_scales,
            aligned_scales,
            arbitrary_scales,
            ground_frames,
            object_states,
            decal_states,
            triggers,
            detail_levels,
            meshes,
            names,
        ] = c;
        Ok(Self {
            nodes,
            objects,
            decals,
            subshapes,
            ifl_materials,
            node_rotations,
            node_translations,
            uniform_scales,
            aligned_scales,
            arbitrary_scales,
            ground_frames,
            object_states,
            decal_states,
            triggers,
            detail_levels,
            meshes,
            names,
        })
    }
}

/// Serialize `shape` as body then trailer. The shape is validated first so
/// a broken reference never reaches the file.
pub fn write_shape<W: Write>(w: &mut W, shape: &Shape, exporter_version: u32) -> DtsResult<StreamHeader> {
    shape.validate()?;
    let mut stream = DtsStream::new();
    write_body(&mut stream, shape);
    let header = stream.flush(w, exporter_version)?;
    write_trailer(w, &shape.sequences, &shape.materials)?;
    debug!(
        "wrote shape: {} nodes, {} meshes, {} sequences",
        shape.nodes.len(),
        shape.meshes.len(),
        shape.sequences.len()
    );
    Ok(header)
}

fn write_body(stream: &mut DtsStream, shape: &Shape) {
    for count in Counts::of(shape).as_array() {
        stream.write_s32(count);
    }
    stream.write_s32(shape.smallest_visible_size);
    stream.write_s32(shape.smallest_visible_dl);
    stream.store_checkpoint();

    stream.write_f32(shape.radius);
    stream.write_f32(shape.tube_radius);
    stream.write(shape.center);
    stream.write(shape.bounds);
    stream.store_checkpoint();

    stream.write_all(&shape.nodes);
    stream.store_checkpoint();
    stream.write_all(&shape.objects);
    stream.store_checkpoint();
    stream.write_all(&shape.decals);
    stream.store_checkpoint();
    stream.write_all(&shape.ifl_materials);
    stream.store_checkpoint();

    // Subshapes go out field by field
    for ss in &shape.subshapes {
        stream.write_s32(ss.first_node);
    }
    for ss in &shape.subshapes {
        stream.write_s32(ss.first_object);
    }
    for ss in &shape.subshapes {
        stream.write_s32(ss.first_decal);
    }
    stream.store_checkpoint();
    for ss in &shape.subshapes {
        stream.write_s32(ss.num_nodes);
    }
    for ss in &shape.subshapes {
        stream.write_s32(ss.num_objects);
    }
    for ss in &shape.subshapes {
        stream.write_s32(ss.num_decals);
    }
    stream.store_checkpoint();

    for (rot, trans) in shape.default_rotations.iter().zip(&shape.default_translations) {
        stream.write(*rot);
        stream.write(*trans);
    }
    stream.write_all(&shape.node_translations);
    stream.write_all(&shape.node_rotations);
    stream.store_checkpoint();

    stream.write_all(&shape.node_uniform_scales);
    stream.write_all(&shape.node_aligned_scales);
    stream.write_all(&shape.node_arbitrary_scale_factors);
    stream.write_all(&shape.node_arbitrary_scale_rots);
    stream.store_checkpoint();

    stream.write_all(&shape.ground_translations);
    stream.write_all(&shape.ground_rotations);
    stream.store_checkpoint();

    stream.write_all(&shape.object_states);
    stream.store_checkpoint();
    stream.write_all(&shape.decal_states);
    stream.store_checkpoint();
    stream.write_all(&shape.triggers);
    stream.store_checkpoint();
    stream.write_all(&shape.detail_levels);
    stream.store_checkpoint();

    for mesh in &shape.meshes {
        stream.write_u32(mesh.kind().tag());
        write_mesh(stream, mesh);
    }
    stream.store_checkpoint();

    for name in shape.names.iter() {
        stream.write_cstring(name);
    }
    stream.store_checkpoint();
}

/// Load a whole shape. Any corruption aborts the load; there is no partial
/// result.
pub fn read_shape<R: Read>(r: &mut R) -> DtsResult<Shape> {
    let (mut stream, header) = DtsStream::read_body(r)?;
    // Trailer follows the body
    let (sequences, materials) = read_trailer(r)?;

    let mut shape = Shape {
        sequences,
        materials,
        ..Shape::default()
    };
    read_body(&mut stream, &mut shape)?;

    let (num_nodes, num_decals, num_ifls, num_objects) = (
        shape.nodes.len(),
        shape.decals.len(),
        shape.ifl_materials.len(),
        shape.objects.len(),
    );
    for seq in &mut shape.sequences {
        seq.matters.truncate(num_nodes, num_decals, num_ifls, num_objects);
    }

    debug!(
        "read shape (exporter {}): {} nodes, {} meshes, {} sequences, {} checkpoints",
        header.exporter_version,
        shape.nodes.len(),
        shape.meshes.len(),
        shape.sequences.len(),
        stream.checkpoint_count()
    );
    Ok(shape)
}

fn read_body(stream: &mut DtsStream, shape: &mut Shape) -> DtsResult<()> {
    let counts = Counts::read(stream)?;
    shape.smallest_visible_size = stream.read_s32()?;
    shape.smallest_visible_dl = stream.read_s32()?;
    stream.read_checkpoint()?;

    shape.radius = stream.read_f32()?;
    shape.tube_radius = stream.read_f32()?;
    shape.center = stream.read()?;
    shape.bounds = stream.read::<Box3>()?;
    stream.read_checkpoint()?;

    shape.nodes = stream.read_many(counts.nodes)?;
    stream.read_checkpoint()?;
    shape.objects = stream.read_many(counts.objects)?;
    stream.read_checkpoint()?;
    shape.decals = stream.read_many(counts.decals)?;
    stream.read_checkpoint()?;
    shape.ifl_materials = stream.read_many(counts.ifl_materials)?;
    stream.read_checkpoint()?;

    let first_node: Vec<i32> = stream.read_many(counts.subshapes)?;
    let first_object: Vec<i32> = stream.read_many(counts.subshapes)?;
    let first_decal: Vec<i32> = stream.read_many(counts.subshapes)?;
    stream.read_checkpoint()?;
    let num_nodes: Vec<i32> = stream.read_many(counts.subshapes)?;
    let num_objects: Vec<i32> = stream.read_many(counts.subshapes)?;
    let num_decals: Vec<i32> = stream.read_many(counts.subshapes)?;
    stream.read_checkpoint()?;
    shape.subshapes = (0..first_node.len())
        .map(|i| SubShape {
            first_node: first_node[i],
            first_object: first_object[i],
            first_decal: first_decal[i],
            num_nodes: num_nodes[i],
            num_objects: num_objects[i],
            num_decals: num_decals[i],
        })
        .collect();

    for _ in 0..counts.nodes {
        shape.default_rotations.push(stream.read::<glm::Quat>()?);
        shape.default_translations.push(stream.read::<glm::Vec3>()?);
    }
    shape.node_translations = stream.read_many(counts.node_translations)?;
    shape.node_rotations = stream.read_many(counts.node_rotations)?;
    stream.read_checkpoint()?;

    shape.node_uniform_scales = stream.read_many(counts.uniform_scales)?;
    shape.node_aligned_scales = stream.read_many(counts.aligned_scales)?;
    shape.node_arbitrary_scale_factors = stream.read_many(counts.arbitrary_scales)?;
    shape.node_arbitrary_scale_rots = stream.read_many(counts.arbitrary_scales)?;
    stream.read_checkpoint()?;

    shape.ground_translations = stream.read_many(counts.ground_frames)?;
    shape.ground_rotations = stream.read_many(counts.ground_frames)?;
    stream.read_checkpoint()?;

    shape.object_states = stream.read_many(counts.object_states)?;
    stream.read_checkpoint()?;
    shape.decal_states = stream.read_many(counts.decal_states)?;
    stream.read_checkpoint()?;
    shape.triggers = stream.read_many(counts.triggers)?;
    stream.read_checkpoint()?;
    shape.detail_levels = stream.read_many(counts.detail_levels)?;
    stream.read_checkpoint()?;

    if counts.meshes < 0 {
        return Err(DtsError::InvalidHeader(format!("{} meshes", counts.meshes)));
    }
    for _ in 0..counts.meshes {
        let kind = MeshKind::from_u32(stream.read_u32()?)?;
        let mesh = read_mesh(stream, kind, &shape.meshes)?;
        shape.meshes.push(mesh);
    }
    stream.read_checkpoint()?;

    let mut names = StringTable::default();
    for _ in 0..counts.names.max(0) {
        names.push_raw(stream.read_cstring()?);
    }
    shape.names = names;
    stream.read_checkpoint()
}

pub fn read_shape_file(path: impl AsRef<Path>) -> DtsResult<Shape> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let shape = read_shape(&mut reader)?;
    info!("loaded {}", path.display());
    Ok(shape)
}

pub fn write_shape_file(path: impl AsRef<Path>, shape: &Shape, exporter_version: u32) -> DtsResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_shape(&mut writer, shape, exporter_version)?;
    writer.flush()?;
    info!("saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn empty_shape_has_seventeen_checkpoints() {
        let shape = Shape::new();
        let mut stream = DtsStream::new();
        write_body(&mut stream, &shape);
        assert_eq!(stream.checkpoint_count(), 17);

        let mut out = Vec::new();
        write_shape(&mut out, &shape, 0).unwrap();
        let back = read_shape(&mut Cursor::new(out)).unwrap();
        assert!(back.nodes.is_empty());
        assert!(back.meshes.is_empty());
    }

    #[test]
    fn unknown_mesh_kind_aborts_load() {
        let mut shape = Shape::new();
        shape.meshes.push(crate::model::Mesh::new(MeshKind::Null));
        let mut out = Vec::new();
        write_shape(&mut out, &shape, 0).unwrap();

        // Header, counts, bounds, then one checkpoint word per group
        let tag_word = 4 + 19 + 2 + 3 + 6 + 15;
        out[tag_word * 4] = 9;
        let err = read_shape(&mut Cursor::new(out)).unwrap_err();
        assert!(matches!(err, DtsError::MalformedMeshType(9)));
    }
}
