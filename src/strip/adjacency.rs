use std::collections::{HashMap, HashSet};

use log::warn;

use crate::model::Triangle;

/// Undirected edge shared by at most two faces.
#[derive(Debug, Clone)]
pub struct EdgeInfo {
    pub v0: u16,
    pub v1: u16,
    pub face0: Option<usize>,
    pub face1: Option<usize>,
}

/// Face/edge arena used by the cache-simulation stripper.
///
/// Exact duplicate faces are left out of `faces`; their input positions are
/// kept in `duplicates` so callers can still emit them.
#[derive(Debug, Default)]
pub struct MeshAdjacency {
    pub faces: Vec<[u16; 3]>,
    pub source: Vec<usize>, // unique face -> input position
    pub duplicates: Vec<usize>,
    pub edges: Vec<EdgeInfo>,
    lookup: HashMap<(u16, u16), usize>,
    vertex_edges: HashMap<u16, Vec<usize>>,
}

fn edge_key(a: u16, b: u16) -> (u16, u16) {
    if a <= b { (a, b) } else { (b, a) }
}

fn canonical(face: &[u16; 3]) -> [u16; 3] {
    Triangle::new(face[0], face[1], face[2], 0).canonical()
}

impl MeshAdjacency {
    pub fn build(input: &[[u16; 3]]) -> Self {
        let mut adj = Self::default();
        let mut seen = HashSet::new();
        for (pos, face) in input.iter().enumerate() {
            if !seen.insert(canonical(face)) {
                adj.duplicates.push(pos);
                continue;
            }
            let id = adj.faces.len();
            adj.faces.push(*face);
            adj.source.push(pos);
            let [a, b, c] = *face;
            for (v0, v1) in [(a, b), (b, c), (c, a)] {
                adj.link(v0, v1, id);
            }
        }
        adj
    }

    fn link(&mut self, v0: u16, v1: u16, face: usize) {
        match self.lookup.get(&edge_key(v0, v1)) {
            Some(&e) => {
                let edge = &mut self.edges[e];
                if edge.face1.is_some() {
                    warn!("NonManifoldEdge: edge {v0}-{v1} has more than two faces, face {face} not linked");
                } else {
                    edge.face1 = Some(face);
                }
            }
            None => {
                let e = self.edges.len();
                self.edges.push(EdgeInfo {
                    v0,
                    v1,
                    face0: Some(face),
                    face1: None,
                });
                self.lookup.insert(edge_key(v0, v1), e);
                self.vertex_edges.entry(v0).or_default().push(e);
                self.vertex_edges.entry(v1).or_default().push(e);
            }
        }
    }

    pub fn find_edge(&self, a: u16, b: u16) -> Option<usize> {
        self.lookup.get(&edge_key(a, b)).copied()
    }

    pub fn edges_at(&self, v: u16) -> &[usize] {
        self.vertex_edges.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The face across edge `a`-`b` from `face`, if `face` is linked to it.
    pub fn other_face(&self, a: u16, b: u16, face: usize) -> Option<usize> {
        let edge = &self.edges[self.find_edge(a, b)?];
        if edge.face0 == Some(face) {
            edge.face1
        } else if edge.face1 == Some(face) {
            edge.face0
        } else {
            None
        }
    }

    pub fn neighbour_count(&self, face: usize) -> usize {
        let [a, b, c] = self.faces[face];
        [(a, b), (b, c), (c, a)]
            .into_iter()
            .filter(|&(v0, v1)| self.other_face(v0, v1, face).is_some())
            .count()
    }

    pub fn boundary_edges(&self, face: usize) -> usize {
        3 - self.neighbour_count(face)
    }
}

/// Face graph linking faces across reversed directed edges, as used by the
/// degree-greedy stripper. Faces over the same three vertices are never
/// linked.
#[derive(Debug, Default)]
pub struct FaceGraph {
    pub neighbours: Vec<Vec<usize>>,
}

pub fn directed_edges(face: &[u16; 3]) -> [(u16, u16); 3] {
    let [a, b, c] = *face;
    [(a, b), (b, c), (c, a)]
}

fn same_vertices(f: &[u16; 3], g: &[u16; 3]) -> bool {
    f.iter().all(|v| g.contains(v))
}

impl FaceGraph {
    pub fn build(faces: &[[u16; 3]]) -> Self {
        let mut by_edge: HashMap<(u16, u16), Vec<usize>> = HashMap::new();
        for (i, face) in faces.iter().enumerate() {
            for e in directed_edges(face) {
                by_edge.entry(e).or_default().push(i);
            }
        }
        let mut neighbours = vec![Vec::new(); faces.len()];
        for (i, face) in faces.iter().enumerate() {
            for (a, b) in directed_edges(face) {
                let Some(others) = by_edge.get(&(b, a)) else {
                    continue;
                };
                for &j in others {
                    if j == i || same_vertices(face, &faces[j]) || neighbours[i].contains(&j) {
                        continue;
                    }
                    neighbours[i].push(j);
                    neighbours[j].push(i);
                }
            }
        }
        Self { neighbours }
    }

    pub fn degree(&self, face: usize) -> usize {
        self.neighbours[face].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_set_aside() {
        let adj = MeshAdjacency::build(&[[0, 1, 2], [1, 2, 0], [2, 1, 3]]);
        assert_eq!(adj.faces.len(), 2);
        assert_eq!(adj.duplicates, vec![1]);
        assert_eq!(adj.source, vec![0, 2]);
        assert_eq!(adj.other_face(1, 2, 0), Some(1));
        assert_eq!(adj.boundary_edges(0), 2);
    }

    #[test]
    fn third_face_on_an_edge_is_not_linked() {
        let adj = MeshAdjacency::build(&[[0, 1, 2], [1, 0, 3], [0, 1, 4]]);
        let e = adj.find_edge(0, 1).unwrap();
        assert_eq!(adj.edges[e].face0, Some(0));
        assert_eq!(adj.edges[e].face1, Some(1));
        assert_eq!(adj.other_face(0, 1, 2), None);
    }

    #[test]
    fn graph_skips_flipped_twins() {
        // 0 and 1 are the same triangle facing away from each other
        let graph = FaceGraph::build(&[[0, 1, 2], [0, 2, 1], [2, 1, 3]]);
        assert!(!graph.neighbours[0].contains(&1));
        assert_eq!(graph.neighbours[0], vec![2]);
        assert_eq!(graph.degree(2), 1);
    }
}
