use log::warn;

use super::translucent::TranslucentSort;
use crate::math::glm;
use crate::model::{Cluster, Primitive, PrimitiveType};

/// Flattened output of one sort: clusters whose primitive ranges index
/// `primitives`, which in turn index `indices`.
#[derive(Debug, Clone, Default)]
pub struct ClusterOutput {
    pub clusters: Vec<Cluster>,
    pub primitives: Vec<Primitive>,
    pub indices: Vec<u16>,
}

struct Emitter<'a> {
    sort: &'a TranslucentSort,
    hidden: Vec<glm::Vec3>, // faces facing one of these are known to face away
    out: ClusterOutput,
}

fn list_word(matindex: u32) -> u32 {
    Primitive::with_kind(matindex, PrimitiveType::Triangles) | Primitive::INDEXED
}

impl Emitter<'_> {
    fn is_hidden(&self, face: usize) -> bool {
        let normal = &self.sort.geo.faces[face].plane.normal;
        self.hidden.iter().any(|h| glm::dot(h, normal) > 0.99)
    }

    fn push_face(&mut self, face: usize, start_new: bool) {
        let f = &self.sort.geo.faces[face];
        let word = list_word(f.matindex);
        if start_new || self.out.primitives.is_empty() {
            let first = self.out.indices.len() as i32;
            self.out.primitives.push(Primitive::new(first, 0, word));
        }
        if let Some(p) = self.out.primitives.last_mut() {
            p.num_elements += 3;
        }
        self.out.indices.extend_from_slice(&f.indices);
    }

    fn can_join(&self, face: usize) -> bool {
        let word = list_word(self.sort.geo.faces[face].matindex);
        self.out.primitives.last().is_some_and(|p| p.matindex == word)
    }

    /// Emit `faces` as few list primitives as materials allow, in passes:
    /// each pass takes every remaining face of one material.
    fn add_faces(&mut self, faces: &[usize], continue_last: bool) {
        let mut pending: Vec<usize> = faces.iter().copied().filter(|&f| !self.is_hidden(f)).collect();
        let mut start_new = !continue_last || self.out.primitives.is_empty();
        while !pending.is_empty() {
            let mut rest = Vec::new();
            for f in pending {
                if !start_new && !self.can_join(f) {
                    rest.push(f);
                    continue;
                }
                self.push_face(f, start_new);
                start_new = false;
            }
            pending = rest;
            start_new = true;
        }
    }

    fn add_layers(&mut self, layers: &[Vec<usize>], continue_last: bool) {
        let start = self.out.primitives.len();
        for layer in layers {
            let mut sorted = layer.clone();
            sorted.sort_unstable();
            let cont = continue_last && self.out.primitives.len() == start;
            self.add_faces(&sorted, cont);
        }
    }

    fn generate(&mut self, node: usize, ret: i32) {
        let sort = self.sort;
        let n = &sort.nodes[node];
        let idx = self.out.clusters.len();
        self.out.clusters.push(Cluster::default());
        self.out.clusters.push(Cluster::default());

        let start = self.out.primitives.len() as i32;
        self.add_layers(&n.back_layers, false);
        let end = self.out.primitives.len() as i32;
        {
            let c = &mut self.out.clusters[idx];
            c.start_primitive = start;
            c.end_primitive = end;
            c.normal = n.split.normal;
            c.k = n.split.k;
        }

        let next = (idx + 1) as i32;
        match (n.front, n.back) {
            (Some(front), Some(back)) => {
                // Camera in front: back side, then front side
                let front_side = self.out.clusters.len() as i32;
                self.generate(front, next);
                self.out.clusters[idx].front_cluster = self.out.clusters.len() as i32;
                self.hidden.push(-n.split.normal);
                self.generate(back, front_side);
                self.hidden.pop();

                // Camera behind: front side, then back side
                let back_side = self.out.clusters.len() as i32;
                self.generate(back, next);
                self.out.clusters[idx].back_cluster = self.out.clusters.len() as i32;
                self.hidden.push(n.split.normal);
                self.generate(front, back_side);
                self.hidden.pop();
            }
            (Some(child), None) | (None, Some(child)) => {
                let first = self.out.clusters.len() as i32;
                self.out.clusters[idx].front_cluster = first;
                self.out.clusters[idx].back_cluster = first;
                self.generate(child, next);
            }
            (None, None) => {
                let cont = start != self.out.primitives.len() as i32;
                self.add_faces(&n.middle, cont);
                let cont = start != self.out.primitives.len() as i32;
                self.add_layers(&n.front_layers, cont);
                let c = &mut self.out.clusters[idx];
                c.end_primitive = self.out.primitives.len() as i32;
                c.front_cluster = ret;
                c.back_cluster = ret;
            }
        }

        if n.front.is_some() || n.back.is_some() {
            let start = self.out.primitives.len() as i32;
            self.add_layers(&n.front_layers, false);
            let end = self.out.primitives.len() as i32;
            let c = &mut self.out.clusters[idx + 1];
            *c = Cluster {
                start_primitive: start,
                end_primitive: end,
                front_cluster: ret,
                back_cluster: ret,
                ..Cluster::default()
            };
        } else {
            self.out.clusters.remove(idx + 1);
        }
    }
}

impl TranslucentSort {
    /// Flatten the tree into clusters and list primitives.
    pub fn generate_clusters(&self) -> ClusterOutput {
        let mut emitter = Emitter {
            sort: self,
            hidden: Vec::new(),
            out: ClusterOutput::default(),
        };
        if !self.nodes.is_empty() {
            emitter.generate(0, -1);
        }
        emitter.out
    }
}

/// Drop clusters with no primitives and a single successor, relinking
/// everything that pointed at them. The entry cluster is always kept.
pub fn remove_useless_clusters(clusters: &mut Vec<Cluster>) {
    let mut k = 1;
    while k < clusters.len() {
        let c = clusters[k];
        if c.start_primitive != c.end_primitive || c.front_cluster != c.back_cluster {
            k += 1;
            continue;
        }
        let target = c.front_cluster;
        let ki = k as i32;
        for (l, other) in clusters.iter_mut().enumerate() {
            if l == k {
                continue;
            }
            for link in [&mut other.front_cluster, &mut other.back_cluster] {
                if *link == ki {
                    *link = target;
                }
                if *link > ki {
                    *link -= 1;
                }
            }
        }
        clusters.remove(k);
        // A parent may have become useless
        k = 1;
    }
}

/// Primitive indices drawn for a camera at `camera`, in draw order.
pub fn draw_order(clusters: &[Cluster], start: usize, camera: &glm::Vec3) -> Vec<usize> {
    let mut out = Vec::new();
    let mut current = start as i32;
    let mut steps = 0;
    while current >= 0 && (current as usize) < clusters.len() {
        if steps > clusters.len() {
            warn!("cluster chain from {start} does not terminate");
            break;
        }
        steps += 1;
        let c = &clusters[current as usize];
        out.extend(c.start_primitive.max(0) as usize..c.end_primitive.max(0) as usize);
        current = c.next_for(camera);
    }
    out
}
