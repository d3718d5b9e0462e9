//! Triangle strip generation.
//!
//! A [`Stripper`] only decides which faces run together and in what order.
//! Turning those runs into index strips is shared: every strip is checked
//! against the source winding as it is emitted and cut where a face would
//! come out flipped, so unwinding the output always gives back the input
//! triangles.

mod adjacency;
mod greedy;
mod nv;
mod vertex_cache;

pub use adjacency::{EdgeInfo, FaceGraph, MeshAdjacency};
pub use greedy::GreedyStripper;
pub use nv::NvStripper;
pub use vertex_cache::VertexCache;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{Mesh, MeshData, Primitive, PrimitiveType, Triangle};
use crate::settings::{StripAlgorithm, StripSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    Strip,
    List,
}

/// One output primitive: a strip, or a list of independent triangles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripGroup {
    pub kind: GroupKind,
    pub indices: Vec<u16>,
    pub matindex: u32, // packed word of the source triangles
}

impl StripGroup {
    pub fn triangles(&self) -> Vec<Triangle> {
        match self.kind {
            GroupKind::Strip => crate::model::unwind_strip(&self.indices)
                .into_iter()
                .map(|indices| Triangle {
                    indices,
                    matindex: self.matindex,
                })
                .collect(),
            GroupKind::List => self
                .indices
                .chunks_exact(3)
                .map(|t| Triangle::new(t[0], t[1], t[2], self.matindex))
                .collect(),
        }
    }

    pub fn primitive(&self, first_element: i32) -> Primitive {
        let kind = match self.kind {
            GroupKind::Strip => PrimitiveType::Strip,
            GroupKind::List => PrimitiveType::Triangles,
        };
        Primitive::new(
            first_element,
            self.indices.len() as i32,
            Primitive::with_kind(self.matindex, kind) | Primitive::INDEXED,
        )
    }
}

/// Face orderings produced by a stripper for one material. Entries index
/// the face slice handed to [`Stripper::face_runs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceRuns {
    pub strips: Vec<Vec<usize>>, // consecutive faces share an edge
    pub list: Vec<usize>,
}

pub trait Stripper {
    fn name(&self) -> &'static str;

    /// Order `faces` into strip runs. Every face must show up exactly once,
    /// either in a run or in the list.
    fn face_runs(&self, faces: &[[u16; 3]]) -> FaceRuns;
}

pub fn stripper_for(settings: &StripSettings) -> Box<dyn Stripper> {
    match settings.algorithm {
        StripAlgorithm::CacheSimulation => {
            Box::new(NvStripper::new(settings.cache_size, settings.min_strip_length))
        }
        StripAlgorithm::DegreeGreedy => Box::new(GreedyStripper::new(settings.max_strip_size)),
    }
}

fn canonical(face: [u16; 3]) -> [u16; 3] {
    Triangle::new(face[0], face[1], face[2], 0).canonical()
}

/// The vertex of `face` other than `a` and `b`, when `face` holds both.
fn third(face: &[u16; 3], a: u16, b: u16) -> Option<u16> {
    if !face.contains(&a) || !face.contains(&b) {
        return None;
    }
    face.iter().copied().find(|&v| v != a && v != b)
}

/// Rotation `[x, a, b]` of `face` whose last two vertices are also in `next`.
fn rotate_shared_last(face: &[u16; 3], next: &[u16; 3]) -> Option<[u16; 3]> {
    (0..3)
        .map(|r| [face[r], face[(r + 1) % 3], face[(r + 2) % 3]])
        .find(|t| !next.contains(&t[0]) && next.contains(&t[1]) && next.contains(&t[2]))
}

/// Turn a face run into index strips, starting a new strip wherever the
/// next face does not continue the current one with matching winding.
/// Single faces come back as three-index strips.
pub fn emit_run(faces: &[[u16; 3]], run: &[usize]) -> Vec<Vec<u16>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < run.len() {
        let face = faces[run[i]];
        let opening = run.get(i + 1).and_then(|&n| {
            let next = faces[n];
            let [x, a, b] = rotate_shared_last(&face, &next)?;
            let u = third(&next, a, b)?;
            (canonical([u, b, a]) == canonical(next)).then_some((x, a, b, u))
        });
        let Some((x, a, b, u)) = opening else {
            out.push(face.to_vec());
            i += 1;
            continue;
        };

        // When the third face turns on the other edge, a leading
        // degenerate flips the parity so the strip can follow it.
        let turns = run.get(i + 2).is_some_and(|&n| {
            let g = faces[n];
            g.contains(&a) && g.contains(&u) && !g.contains(&b)
        });
        let mut strip = if turns {
            vec![x, x, b, a, u]
        } else {
            vec![x, a, b, u]
        };
        i += 2;

        while let Some(&n) = run.get(i) {
            let face = faces[n];
            let (p, q) = (strip[strip.len() - 2], strip[strip.len() - 1]);
            let Some(w) = third(&face, p, q) else { break };
            let tri = if strip.len() % 2 == 0 { [p, q, w] } else { [w, q, p] };
            if canonical(tri) != canonical(face) {
                break;
            }
            strip.push(w);
            i += 1;
        }
        out.push(strip);
    }
    out
}

/// Join strips with degenerate triangles, keeping each strip's parity.
pub fn stitch(strips: &[Vec<u16>]) -> Vec<u16> {
    let mut out: Vec<u16> = Vec::new();
    for strip in strips {
        if let (Some(&last), Some(&first)) = (out.last(), strip.first()) {
            if out.len() % 2 == 1 {
                out.push(last);
            }
            out.push(last);
            out.push(first);
        }
        out.extend_from_slice(strip);
    }
    out
}

/// Strip `tris`, one material at a time, in first-seen material order.
pub fn stripify(tris: &[Triangle], settings: &StripSettings) -> Vec<StripGroup> {
    let stripper = stripper_for(settings);
    stripify_with(tris, stripper.as_ref(), settings)
}

pub fn stripify_with(
    tris: &[Triangle],
    stripper: &dyn Stripper,
    settings: &StripSettings,
) -> Vec<StripGroup> {
    let mut materials: Vec<(u32, Vec<[u16; 3]>, Vec<[u16; 3]>)> = Vec::new();
    for t in tris {
        let pos = match materials.iter().position(|(m, _, _)| *m == t.matindex) {
            Some(pos) => pos,
            None => {
                materials.push((t.matindex, Vec::new(), Vec::new()));
                materials.len() - 1
            }
        };
        let (_, faces, degenerate) = &mut materials[pos];
        if t.is_degenerate() {
            degenerate.push(t.indices);
        } else {
            faces.push(t.indices);
        }
    }

    let mut groups = Vec::new();
    for (matindex, faces, degenerate) in materials {
        let runs = stripper.face_runs(&faces);
        let mut list: Vec<u16> = Vec::new();
        let mut strips = Vec::new();

        if settings.lists_only {
            for &f in runs.strips.iter().flatten().chain(&runs.list) {
                list.extend_from_slice(&faces[f]);
            }
        } else {
            for run in &runs.strips {
                for strip in emit_run(&faces, run) {
                    if strip.len() == 3 {
                        list.extend(strip);
                    } else {
                        strips.push(strip);
                    }
                }
            }
            for &f in &runs.list {
                list.extend_from_slice(&faces[f]);
            }
        }
        for face in degenerate {
            list.extend_from_slice(&face);
        }

        debug!(
            "{} stripper: material {:#x}, {} faces -> {} strips, {} loose",
            stripper.name(),
            matindex,
            faces.len(),
            strips.len(),
            list.len() / 3
        );

        if settings.stitch && strips.len() > 1 {
            strips = vec![stitch(&strips)];
        }
        groups.extend(strips.into_iter().map(|indices| StripGroup {
            kind: GroupKind::Strip,
            indices,
            matindex,
        }));
        if !list.is_empty() {
            groups.push(StripGroup {
                kind: GroupKind::List,
                indices: list,
                matindex,
            });
        }
    }
    groups
}

/// Renumber vertices in first-use order. Returns the new groups and the
/// old -> new map (-1 means unused); the vertex buffer must be reordered to
/// match.
pub fn remap_indices(groups: &[StripGroup], num_verts: usize) -> (Vec<StripGroup>, Vec<i32>) {
    let mut map = vec![-1i32; num_verts];
    let mut next = 0i32;
    let remapped = groups
        .iter()
        .map(|g| {
            let indices = g
                .indices
                .iter()
                .map(|&i| {
                    let slot = &mut map[i as usize];
                    if *slot == -1 {
                        *slot = next;
                        next += 1;
                    }
                    *slot as u16
                })
                .collect();
            StripGroup {
                indices,
                ..g.clone()
            }
        })
        .collect();
    (remapped, map)
}

/// Simulated cache misses for drawing `groups` in order.
pub fn cache_misses(groups: &[StripGroup], cache_size: usize) -> usize {
    let mut cache = VertexCache::new(cache_size);
    groups
        .iter()
        .map(|g| cache.count_misses(g.indices.iter().copied()))
        .sum()
}

fn append_groups(indices: &mut Vec<u16>, primitives: &mut Vec<Primitive>, groups: &[StripGroup]) {
    for g in groups {
        primitives.push(g.primitive(indices.len() as i32));
        indices.extend_from_slice(&g.indices);
    }
}

impl Mesh {
    /// Replace the primitives with strips. Sorted meshes are stripped one
    /// cluster at a time so cluster ranges stay valid.
    pub fn wind_strip(&mut self, settings: &StripSettings) {
        let stripper = stripper_for(settings);
        let mut indices = Vec::new();
        let mut primitives = Vec::new();

        if let MeshData::Sorted(sorted) = &self.data {
            let mut clusters = sorted.clusters.clone();
            for c in clusters.iter_mut() {
                let start = c.start_primitive.max(0) as usize;
                let end = (c.end_primitive.max(0) as usize).min(self.primitives.len());
                let tris = self.triangles_of(self.primitives.get(start..end).unwrap_or(&[]));
                c.start_primitive = primitives.len() as i32;
                let groups = stripify_with(&tris, stripper.as_ref(), settings);
                append_groups(&mut indices, &mut primitives, &groups);
                c.end_primitive = primitives.len() as i32;
            }
            if let Some(sorted) = self.sorted_mut() {
                sorted.clusters = clusters;
            }
        } else {
            let groups = stripify_with(&self.triangles(), stripper.as_ref(), settings);
            append_groups(&mut indices, &mut primitives, &groups);
        }

        debug!(
            "stripped mesh: {} primitives -> {}",
            self.primitives.len(),
            primitives.len()
        );
        self.indices = indices;
        self.primitives = primitives;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cluster, MeshKind};

    fn multiset(tris: &[Triangle]) -> Vec<([u16; 3], u32)> {
        let mut v: Vec<_> = tris
            .iter()
            .map(|t| (t.canonical(), Primitive::with_kind(t.matindex, PrimitiveType::Triangles)))
            .collect();
        v.sort_unstable();
        v
    }

    fn unwound(groups: &[StripGroup]) -> Vec<Triangle> {
        groups.iter().flat_map(StripGroup::triangles).collect()
    }

    #[test]
    fn run_opening_follows_turns() {
        // Fan-like run around vertex 1 needs the parity flip
        let faces = [[0, 1, 2], [2, 1, 3], [3, 1, 4]];
        let strips = emit_run(&faces, &[0, 1, 2]);
        assert_eq!(strips.len(), 1);
        let got: Vec<[u16; 3]> = crate::model::unwind_strip(&strips[0])
            .into_iter()
            .map(canonical)
            .collect();
        let want: Vec<[u16; 3]> = faces.iter().map(|&f| canonical(f)).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn flipped_face_starts_a_new_strip() {
        let faces = [[0, 2, 1], [1, 2, 3], [2, 3, 4]];
        let strips = emit_run(&faces, &[0, 1, 2]);
        let total: usize = strips.iter().map(|s| crate::model::unwind_strip(s).len()).sum();
        assert_eq!(total, 3);
        for s in &strips {
            for t in crate::model::unwind_strip(s) {
                assert!(faces.iter().any(|&f| canonical(f) == canonical(t)));
            }
        }
    }

    #[test]
    fn stitched_strips_keep_their_triangles() {
        let a = vec![0, 1, 2, 3, 4];
        let b = vec![5, 6, 7, 8];
        let joined = stitch(&[a.clone(), b.clone()]);
        let mut want = crate::model::unwind_strip(&a);
        want.extend(crate::model::unwind_strip(&b));
        assert_eq!(crate::model::unwind_strip(&joined), want);
    }

    #[test]
    fn materials_stay_apart() {
        let tris = [
            Triangle::new(0, 2, 1, 0),
            Triangle::new(1, 2, 3, 1),
            Triangle::new(2, 4, 3, 1),
        ];
        for algorithm in [StripAlgorithm::CacheSimulation, StripAlgorithm::DegreeGreedy] {
            let settings = StripSettings {
                algorithm,
                ..StripSettings::default()
            };
            let groups = stripify(&tris, &settings);
            assert!(groups.iter().all(|g| g.matindex == 0 || g.matindex == 1));
            assert_eq!(multiset(&unwound(&groups)), multiset(&tris));
        }
    }

    #[test]
    fn degenerate_and_duplicate_faces_survive() {
        let tris = [
            Triangle::new(0, 1, 2, 0),
            Triangle::new(1, 2, 0, 0),
            Triangle::new(3, 3, 4, 0),
        ];
        let groups = stripify(&tris, &StripSettings::default());
        let list: Vec<_> = groups.iter().filter(|g| g.kind == GroupKind::List).collect();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].indices.len(), 9);
    }

    #[test]
    fn remap_numbers_by_first_use() {
        let groups = vec![StripGroup {
            kind: GroupKind::Strip,
            indices: vec![7, 3, 9, 3],
            matindex: 0,
        }];
        let (remapped, map) = remap_indices(&groups, 10);
        assert_eq!(remapped[0].indices, vec![0, 1, 2, 1]);
        assert_eq!(map[7], 0);
        assert_eq!(map[0], -1);
    }

    #[test]
    fn sorted_mesh_is_stripped_per_cluster() {
        let mut mesh = Mesh::new(MeshKind::Sorted);
        mesh.indices = vec![0, 2, 1, 1, 2, 3, 4, 6, 5, 5, 6, 7];
        let m = Primitive::pack(PrimitiveType::Triangles, Some(0), true);
        mesh.primitives = (0..4).map(|i| Primitive::new(i * 3, 3, m)).collect();
        if let Some(sorted) = mesh.sorted_mut() {
            sorted.clusters = vec![
                Cluster {
                    start_primitive: 0,
                    end_primitive: 2,
                    ..Cluster::default()
                },
                Cluster {
                    start_primitive: 2,
                    end_primitive: 4,
                    ..Cluster::default()
                },
            ];
        }
        mesh.wind_strip(&StripSettings::default());
        let clusters = &mesh.sorted().unwrap().clusters;
        assert_eq!(clusters[0].start_primitive, 0);
        assert_eq!(clusters[0].end_primitive, clusters[1].start_primitive);
        assert_eq!(clusters[1].end_primitive as usize, mesh.primitives.len());
        assert_eq!(mesh.primitives.len(), 2);
        assert!(mesh.primitives.iter().all(|p| p.is_strip()));
    }
}
