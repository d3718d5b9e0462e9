//! Translucent face sorting for sorted meshes.
//!
//! Faces are partitioned into a tree of splitting planes so that, wherever
//! the camera sits, walking the resulting clusters draws them back to
//! front. The tree is built over a shared [`SortGeometry`] that grows as
//! faces get cut, then flattened into the cluster array stored on disk.

mod clusters;
mod face;
mod translucent;

pub use clusters::{ClusterOutput, draw_order, remove_useless_clusters};
pub use face::{FaceInfo, SortFace, SortGeometry, face_plane};
pub use translucent::{SortNode, TranslucentSort};

use std::sync::Arc;

use log::debug;

use crate::error::{DtsError, DtsResult};
use crate::math::glm;
use crate::model::{Mesh, MeshData, MeshKind, SortedData};
use crate::settings::SortSettings;

fn frame_slice<T: Clone>(data: &[T], frame: usize, per_frame: usize) -> Vec<T> {
    let start = (frame * per_frame).min(data.len());
    let end = (start + per_frame).min(data.len());
    data[start..end].to_vec()
}

impl Mesh {
    /// Turn a standard mesh into a sorted mesh.
    pub fn sort_mesh(&mut self, settings: &SortSettings) -> DtsResult<()> {
        if self.kind() != MeshKind::Standard {
            return Err(DtsError::UnsortableMesh(self.kind().name()));
        }
        debug!(
            "sorting mesh: depth {} big faces {} layers up {} down {} write depth {}",
            settings.max_depth,
            settings.num_big_faces,
            settings.z_layer_up,
            settings.z_layer_down,
            settings.always_write_depth
        );
        self.generate_clusters(settings)?;
        if let Some(sorted) = self.sorted_mut() {
            sorted.always_write_depth = settings.always_write_depth;
        }
        debug!(
            "sorting mesh: {} clusters",
            self.sorted().map_or(0, |s| s.clusters.len())
        );
        Ok(())
    }

    /// Sort every frame and material frame and merge the results into the
    /// sorted mesh layout: per-frame vertex runs, per-frame cluster entry
    /// points and per-(frame, material frame) texture coordinate runs.
    pub fn generate_clusters(&mut self, settings: &SortSettings) -> DtsResult<()> {
        let tris = self.triangles();
        let num_frames = self.num_frames.max(1) as usize;
        let mat_frames = self.mat_frames.max(1) as usize;
        let per_frame = if self.verts_per_frame > 0 {
            self.verts_per_frame as usize
        } else {
            self.verts.len()
        };

        let mut sorted = SortedData::default();
        let mut verts = Vec::new();
        let mut normals = Vec::new();
        let mut tverts: Vec<glm::Vec2> = Vec::new();
        let mut primitives = Vec::new();
        let mut indices = Vec::new();

        for frame in 0..num_frames {
            for mat_frame in 0..mat_frames {
                let geo = SortGeometry::new(
                    frame_slice(&self.verts, frame, per_frame),
                    frame_slice(&self.normals, frame, per_frame),
                    frame_slice(&self.tverts, mat_frame, per_frame),
                );
                let sort = TranslucentSort::build(geo, &tris, settings)?;
                sorted.first_tverts.push(tverts.len() as i32);
                tverts.extend_from_slice(&sort.geo.tverts);
                if mat_frame > 0 {
                    // Same geometry, only the texture coordinates differ
                    continue;
                }

                let mut out = sort.generate_clusters();
                remove_useless_clusters(&mut out.clusters);

                sorted.start_cluster.push(sorted.clusters.len() as i32);
                sorted.first_verts.push(verts.len() as i32);
                sorted.num_verts.push(sort.geo.verts.len() as i32);

                let (prim_base, cluster_base) = (primitives.len() as i32, sorted.clusters.len() as i32);
                let index_base = indices.len() as i32;
                for c in out.clusters.iter_mut() {
                    c.start_primitive += prim_base;
                    c.end_primitive += prim_base;
                    if c.front_cluster != -1 {
                        c.front_cluster += cluster_base;
                    }
                    if c.back_cluster != -1 {
                        c.back_cluster += cluster_base;
                    }
                }
                for p in out.primitives.iter_mut() {
                    p.first_element += index_base;
                }
                verts.extend_from_slice(&sort.geo.verts);
                normals.extend_from_slice(&sort.geo.norms);
                indices.extend(out.indices);
                primitives.extend(out.primitives);
                sorted.clusters.extend(out.clusters);
            }
        }

        self.data = MeshData::Sorted(sorted);
        self.parent = -1;
        self.verts_per_frame = self.sorted().and_then(|s| s.num_verts.first()).copied().unwrap_or(0);
        self.verts = Arc::new(verts);
        self.normals = Arc::new(normals);
        self.tverts = Arc::new(tverts);
        self.enormals = Arc::new(Vec::new());
        self.primitives = primitives;
        self.indices = indices;
        self.merge_indices.clear();
        Ok(())
    }
}
