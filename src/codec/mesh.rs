use std::sync::Arc;

use log::warn;

use crate::error::{DtsError, DtsResult};
use crate::math::{Box3, glm};
use crate::model::{
    Cluster, DecalData, Mesh, MeshData, MeshKind, Primitive, SkinData, SortedData,
};
use crate::stream::{DtsStream, StreamValue};

impl StreamValue for Primitive {
    const WORDS32: usize = 1;
    const WORDS16: usize = 2;

    fn store(&self, stream: &mut DtsStream) {
        stream.write_u16(self.first_element as u16);
        stream.write_u16(self.num_elements as u16);
        stream.write_u32(self.matindex);
    }

    fn load(stream: &mut DtsStream) -> DtsResult<Self> {
        let first_element = stream.read_u16()? as i32;
        let num_elements = stream.read_u16()? as i32;
        let matindex = stream.read_u32()?;
        Ok(Primitive::new(first_element, num_elements, matindex))
    }
}

impl StreamValue for Cluster {
    const WORDS32: usize = 8;

    fn store(&self, stream: &mut DtsStream) {
        stream.write_s32(self.start_primitive);
        stream.write_s32(self.end_primitive);
        stream.write(self.normal);
        stream.write_f32(self.k);
        stream.write_s32(self.front_cluster);
        stream.write_s32(self.back_cluster);
    }

    fn load(stream: &mut DtsStream) -> DtsResult<Self> {
        Ok(Cluster {
            start_primitive: stream.read_s32()?,
            end_primitive: stream.read_s32()?,
            normal: stream.read()?,
            k: stream.read_f32()?,
            front_cluster: stream.read_s32()?,
            back_cluster: stream.read_s32()?,
        })
    }
}

/// One normal per vertex; missing normals go out as zero vectors so the
/// reader stays in step.
fn write_normals(stream: &mut DtsStream, normals: &[glm::Vec3], count: usize) {
    for i in 0..count {
        stream.write(normals.get(i).copied().unwrap_or_else(glm::Vec3::zeros));
    }
}

/// Mesh payload after its kind tag. Meshes with a parent only write counts
/// for the arrays they share.
pub(crate) fn write_mesh(stream: &mut DtsStream, mesh: &Mesh) {
    match &mesh.data {
        MeshData::Null => {}
        MeshData::Decal(decal) => write_decal(stream, mesh, decal),
        data => {
            write_common(stream, mesh);
            match data {
                MeshData::Skin(skin) => write_skin(stream, mesh, skin),
                MeshData::Sorted(sorted) => write_sorted(stream, sorted),
                _ => {}
            }
        }
    }
}

fn write_common(stream: &mut DtsStream, mesh: &Mesh) {
    let owns_data = mesh.parent < 0;
    let is_skin = mesh.kind() == MeshKind::Skin;

    stream.store_checkpoint();
    stream.write_s32(mesh.num_frames);
    stream.write_s32(mesh.mat_frames);
    stream.write_s32(mesh.parent);
    stream.write(mesh.bounds);
    stream.write(mesh.center);
    stream.write_f32(mesh.radius);

    // Skin vertices live in the skin block
    if is_skin {
        stream.write_s32(0);
    } else {
        stream.write_s32(mesh.verts.len() as i32);
        if owns_data {
            stream.write_all(&mesh.verts);
        }
    }

    stream.write_s32(mesh.tverts.len() as i32);
    if owns_data {
        stream.write_all(&mesh.tverts);
    }

    if owns_data && !is_skin {
        write_normals(stream, &mesh.normals, mesh.verts.len());
        for _ in 0..mesh.verts.len() {
            stream.write_u8(0);
        }
    }

    stream.write_counted(&mesh.primitives);
    stream.write_counted(&mesh.indices);
    stream.write_counted(&mesh.merge_indices);
    stream.write_s32(mesh.verts_per_frame);
    stream.write_u32(mesh.flags);
    stream.store_checkpoint();
}

fn write_skin(stream: &mut DtsStream, mesh: &Mesh, skin: &SkinData) {
    let owns_data = mesh.parent < 0;

    stream.write_s32(mesh.verts.len() as i32);
    if owns_data {
        stream.write_all(&mesh.verts);
        for _ in 0..mesh.verts.len() {
            stream.write_u8(0);
        }
        write_normals(stream, &mesh.normals, mesh.verts.len());
    }

    stream.write_s32(skin.node_transforms.len() as i32);
    if owns_data {
        stream.write_all(&skin.node_transforms);
    }

    stream.write_s32(skin.vindex.len() as i32);
    if owns_data {
        stream.write_all(&skin.vindex);
        stream.write_all(&skin.bindex);
        stream.write_all(&skin.vweight);
    }

    stream.write_s32(skin.node_index.len() as i32);
    if owns_data {
        stream.write_all(&skin.node_index);
    }
    stream.store_checkpoint();
}

fn write_sorted(stream: &mut DtsStream, sorted: &SortedData) {
    stream.write_counted(&sorted.clusters);
    stream.write_counted(&sorted.start_cluster);
    stream.write_counted(&sorted.first_verts);
    stream.write_counted(&sorted.num_verts);
    stream.write_counted(&sorted.first_tverts);
    stream.write_u32(sorted.always_write_depth as u32);
    stream.store_checkpoint();
}

fn write_decal(stream: &mut DtsStream, mesh: &Mesh, decal: &DecalData) {
    stream.write_counted(&mesh.primitives);
    stream.write_counted(&mesh.indices);
    stream.write_counted(&decal.start_primitive);
    let n = decal.start_primitive.len();
    for texgen in [&decal.texgen_s, &decal.texgen_t] {
        for i in 0..n {
            stream.write(texgen.get(i).copied().unwrap_or_else(glm::Vec4::zeros));
        }
    }
    stream.write_s32(decal.material_index);
    stream.store_checkpoint();
}

/// Read one mesh of `kind`. `earlier` holds the meshes already read, so a
/// parent reference can alias its arrays.
pub(crate) fn read_mesh(stream: &mut DtsStream, kind: MeshKind, earlier: &[Mesh]) -> DtsResult<Mesh> {
    let mut mesh = Mesh::new(kind);
    match kind {
        MeshKind::Null => {}
        MeshKind::Decal => read_decal(stream, &mut mesh)?,
        _ => {
            read_common(stream, &mut mesh, earlier)?;
            match kind {
                MeshKind::Skin => read_skin(stream, &mut mesh, earlier)?,
                MeshKind::Sorted => read_sorted(stream, &mut mesh)?,
                _ => {}
            }
        }
    }
    Ok(mesh)
}

fn parent_of<'a>(mesh: &Mesh, earlier: &'a [Mesh]) -> DtsResult<Option<&'a Mesh>> {
    if mesh.parent < 0 {
        return Ok(None);
    }
    earlier
        .get(mesh.parent as usize)
        .map(Some)
        .ok_or_else(|| DtsError::out_of_range("parent mesh", mesh.parent, earlier.len()))
}

fn read_common(stream: &mut DtsStream, mesh: &mut Mesh, earlier: &[Mesh]) -> DtsResult<()> {
    stream.read_checkpoint()?;
    mesh.num_frames = stream.read_s32()?;
    mesh.mat_frames = stream.read_s32()?;
    mesh.parent = stream.read_s32()?;
    mesh.bounds = stream.read::<Box3>()?;
    mesh.center = stream.read()?;
    mesh.radius = stream.read_f32()?;

    match parent_of(mesh, earlier)? {
        Some(parent) => {
            stream.read_s32()?;
            stream.read_s32()?;
            mesh.verts = Arc::clone(&parent.verts);
            mesh.tverts = Arc::clone(&parent.tverts);
            mesh.normals = Arc::clone(&parent.normals);
            mesh.enormals = Arc::clone(&parent.enormals);
        }
        None => {
            let verts: Vec<glm::Vec3> = stream.read_counted()?;
            mesh.tverts = Arc::new(stream.read_counted()?);
            mesh.normals = Arc::new(stream.read_many(verts.len() as i32)?);
            // Encoded normals are not used
            stream.read_many::<u8>(verts.len() as i32)?;
            mesh.verts = Arc::new(verts);
        }
    }

    mesh.primitives = stream.read_counted()?;
    mesh.indices = stream.read_counted()?;
    mesh.merge_indices = stream.read_counted()?;
    mesh.verts_per_frame = stream.read_s32()?;
    mesh.flags = stream.read_u32()?;
    stream.read_checkpoint()
}

fn read_skin(stream: &mut DtsStream, mesh: &mut Mesh, earlier: &[Mesh]) -> DtsResult<()> {
    let parent = parent_of(mesh, earlier)?;
    let skin = match parent {
        Some(parent) => {
            // vert, transform, weight and node index counts
            for _ in 0..4 {
                stream.read_s32()?;
            }
            match parent.skin() {
                Some(shared) => shared.clone(),
                None => {
                    warn!("skin mesh parent {} is a {} mesh", mesh.parent, parent.kind().name());
                    SkinData::default()
                }
            }
        }
        None => {
            let verts: Vec<glm::Vec3> = stream.read_counted()?;
            stream.read_many::<u8>(verts.len() as i32)?;
            mesh.normals = Arc::new(stream.read_many(verts.len() as i32)?);
            mesh.verts = Arc::new(verts);

            let node_transforms = stream.read_counted()?;
            let weights = stream.read_s32()?;
            let vindex = stream.read_many(weights)?;
            let bindex = stream.read_many(weights)?;
            let vweight = stream.read_many(weights)?;
            let node_index = stream.read_counted()?;
            SkinData {
                node_transforms: Arc::new(node_transforms),
                vindex: Arc::new(vindex),
                bindex: Arc::new(bindex),
                vweight: Arc::new(vweight),
                node_index: Arc::new(node_index),
            }
        }
    };
    mesh.data = MeshData::Skin(skin);
    stream.read_checkpoint()
}

fn read_sorted(stream: &mut DtsStream, mesh: &mut Mesh) -> DtsResult<()> {
    let sorted = SortedData {
        clusters: stream.read_counted()?,
        start_cluster: stream.read_counted()?,
        first_verts: stream.read_counted()?,
        num_verts: stream.read_counted()?,
        first_tverts: stream.read_counted()?,
        always_write_depth: stream.read_u32()? != 0,
    };
    mesh.data = MeshData::Sorted(sorted);
    stream.read_checkpoint()
}

fn read_decal(stream: &mut DtsStream, mesh: &mut Mesh) -> DtsResult<()> {
    mesh.primitives = stream.read_counted()?;
    mesh.indices = stream.read_counted()?;
    let start_primitive: Vec<i32> = stream.read_counted()?;
    let n = start_primitive.len() as i32;
    let decal = DecalData {
        texgen_s: stream.read_many(n)?,
        texgen_t: stream.read_many(n)?,
        material_index: stream.read_s32()?,
        start_primitive,
    };
    mesh.data = MeshData::Decal(decal);
    stream.read_checkpoint()
}
