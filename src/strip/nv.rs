use std::collections::HashSet;

use log::debug;

use super::adjacency::MeshAdjacency;
use super::vertex_cache::VertexCache;
use super::{FaceRuns, Stripper};

const NUM_SAMPLES: usize = 10;

/// Cache-simulation stripper: grows candidate strips from several seed faces,
/// keeps the most promising experiment each round, then cuts the strips to
/// fit the vertex cache and orders them for cache reuse.
#[derive(Debug, Clone)]
pub struct NvStripper {
    pub cache_size: usize,
    pub min_strip_length: usize, // in faces
}

impl Default for NvStripper {
    fn default() -> Self {
        Self {
            cache_size: 16,
            min_strip_length: 0,
        }
    }
}

impl Stripper for NvStripper {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn face_runs(&self, faces: &[[u16; 3]]) -> FaceRuns {
        let adj = MeshAdjacency::build(faces);
        if adj.faces.is_empty() {
            return FaceRuns {
                strips: Vec::new(),
                list: adj.duplicates,
            };
        }
        let mut session = Session::new(&adj);
        let committed = session.find_all_strips();
        debug!(
            "cache stripper committed {} strips over {} faces",
            committed.len(),
            adj.faces.len()
        );
        let (strips, list) = self.split_and_order(&adj, committed);

        let to_input = |f: &usize| adj.source[*f];
        let mut runs = FaceRuns {
            strips: strips.iter().map(|s| s.iter().map(to_input).collect()).collect(),
            list: list.iter().map(to_input).collect(),
        };
        runs.list.extend_from_slice(&adj.duplicates);
        runs
    }
}

impl NvStripper {
    pub fn new(cache_size: usize, min_strip_length: usize) -> Self {
        Self {
            cache_size,
            min_strip_length,
        }
    }

    /// Cut strips into cache-sized pieces, move short ones to a list and
    /// order everything greedily by cache hits.
    fn split_and_order(
        &self,
        adj: &MeshAdjacency,
        committed: Vec<StripInfo>,
    ) -> (Vec<Vec<usize>>, Vec<usize>) {
        let threshold = self.cache_size.saturating_sub(4).max(1);
        let pieces: Vec<Vec<usize>> = committed
            .iter()
            .flat_map(|s| s.faces.chunks(threshold).map(<[usize]>::to_vec))
            .collect();

        let (big, small): (Vec<_>, Vec<_>) = pieces
            .into_iter()
            .partition(|p| p.len() >= self.min_strip_length);

        // Loose faces, best cache hit first
        let loose: Vec<usize> = small.into_iter().flatten().collect();
        let mut cache = VertexCache::new(self.cache_size);
        let mut visited = vec![false; loose.len()];
        let mut list = Vec::with_capacity(loose.len());
        loop {
            let mut best: Option<(usize, usize)> = None;
            for (i, &f) in loose.iter().enumerate() {
                if visited[i] {
                    continue;
                }
                let hits = cache.face_hits(&adj.faces[f]);
                if best.is_none_or(|(h, _)| hits > h) {
                    best = Some((hits, i));
                }
            }
            let Some((_, i)) = best else { break };
            visited[i] = true;
            cache.touch_face(&adj.faces[loose[i]]);
            list.push(loose[i]);
        }

        if big.is_empty() {
            return (big, list);
        }

        // Start from the strip with the fewest neighbours per face
        let mut cache = VertexCache::new(self.cache_size);
        let avg_neighbours = |s: &[usize]| {
            s.iter().map(|&f| adj.neighbour_count(f)).sum::<usize>() as f32 / s.len() as f32
        };
        let first = (0..big.len())
            .min_by(|&a, &b| avg_neighbours(&big[a]).total_cmp(&avg_neighbours(&big[b])))
            .unwrap_or(0);

        let mut visited = vec![false; big.len()];
        let mut ordered = Vec::with_capacity(big.len());
        let mut next = Some(first);
        while let Some(i) = next {
            visited[i] = true;
            for &f in &big[i] {
                cache.touch_face(&adj.faces[f]);
            }
            ordered.push(big[i].clone());

            let mut best: Option<(f32, usize)> = None;
            for (j, strip) in big.iter().enumerate() {
                if visited[j] {
                    continue;
                }
                let hits: usize = strip.iter().map(|&f| cache.face_hits(&adj.faces[f])).sum();
                let hits = hits as f32 / strip.len() as f32;
                if best.is_none_or(|(h, _)| hits > h) {
                    best = Some((hits, j));
                }
            }
            next = best.map(|(_, j)| j);
        }
        (ordered, list)
    }
}

#[derive(Debug, Clone, Copy)]
struct FaceState {
    strip_id: i32,      // committed strip, -1 means none
    test_strip_id: i32, // strip of the running experiment
    experiment_id: i32,
}

impl Default for FaceState {
    fn default() -> Self {
        Self {
            strip_id: -1,
            test_strip_id: -1,
            experiment_id: -1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StartInfo {
    face: usize,
    edge: usize,
    to_v1: bool,
}

#[derive(Debug, Clone)]
struct StripInfo {
    start: StartInfo,
    strip_id: i32,
    experiment_id: i32, // -1 once committed
    faces: Vec<usize>,
}

impl StripInfo {
    fn new(start: StartInfo, strip_id: i32, experiment_id: i32) -> Self {
        Self {
            start,
            strip_id,
            experiment_id,
            faces: Vec::new(),
        }
    }

    fn is_experiment(&self) -> bool {
        self.experiment_id >= 0
    }
}

struct Session<'a> {
    adj: &'a MeshAdjacency,
    state: Vec<FaceState>,
    mesh_jump: f32,
    first_reset: bool,
    next_strip: i32,
    next_experiment: i32,
}

/// The vertex of `face` that is neither `a` nor `b`.
fn next_index(face: &[u16; 3], a: u16, b: u16) -> Option<u16> {
    face.iter().copied().find(|&v| v != a && v != b)
}

impl<'a> Session<'a> {
    fn new(adj: &'a MeshAdjacency) -> Self {
        Self {
            adj,
            state: vec![FaceState::default(); adj.faces.len()],
            mesh_jump: 0.0,
            first_reset: true,
            next_strip: 0,
            next_experiment: 0,
        }
    }

    fn strip_id(&mut self) -> i32 {
        self.next_strip += 1;
        self.next_strip - 1
    }

    fn experiment_id(&mut self) -> i32 {
        self.next_experiment += 1;
        self.next_experiment - 1
    }

    fn is_in_strip(&self, strip: &StripInfo, face: usize) -> bool {
        let s = &self.state[face];
        if strip.is_experiment() {
            s.test_strip_id == strip.strip_id
        } else {
            s.strip_id == strip.strip_id
        }
    }

    fn is_marked(&self, strip: &StripInfo, face: usize) -> bool {
        let s = &self.state[face];
        s.strip_id >= 0 || (strip.is_experiment() && s.experiment_id == strip.experiment_id)
    }

    fn mark(&mut self, strip: &StripInfo, face: usize) {
        let s = &mut self.state[face];
        if strip.is_experiment() {
            s.experiment_id = strip.experiment_id;
            s.test_strip_id = strip.strip_id;
        } else {
            s.experiment_id = -1;
            s.strip_id = strip.strip_id;
        }
    }

    fn shares_edge(&self, strip: &StripInfo, face: usize) -> bool {
        let [a, b, c] = self.adj.faces[face];
        [(a, b), (b, c), (c, a)].into_iter().any(|(v0, v1)| {
            self.adj.find_edge(v0, v1).is_some_and(|e| {
                let edge = &self.adj.edges[e];
                edge.face0.is_some_and(|f| self.is_in_strip(strip, f))
                    || edge.face1.is_some_and(|f| self.is_in_strip(strip, f))
            })
        })
    }

    /// Grow `strip` forward and backward from its start face.
    fn build(&mut self, strip: &mut StripInfo) {
        let adj = self.adj;
        let start = strip.start;
        self.mark(strip, start.face);

        let edge = &adj.edges[start.edge];
        let (v0, v1) = if start.to_v1 {
            (edge.v0, edge.v1)
        } else {
            (edge.v1, edge.v0)
        };
        let Some(v2) = next_index(&adj.faces[start.face], v0, v1) else {
            strip.faces = vec![start.face];
            return;
        };

        let mut used: HashSet<u16> = HashSet::from([v0, v1, v2]);
        let mut forward = vec![start.face];
        let (mut nv0, mut nv1) = (v1, v2);
        let mut current = start.face;
        while let Some(next) = adj.other_face(nv0, nv1, current) {
            if self.is_marked(strip, next) {
                break;
            }
            let face = adj.faces[next];
            if face.iter().all(|v| used.contains(v)) {
                break;
            }
            let Some(nv) = next_index(&face, nv0, nv1) else {
                break;
            };
            forward.push(next);
            self.mark(strip, next);
            used.extend(face);
            (nv0, nv1) = (nv1, nv);
            current = next;
        }

        let mut backward = Vec::new();
        let (mut nv0, mut nv1) = (v1, v0);
        let mut current = start.face;
        while let Some(next) = adj.other_face(nv0, nv1, current) {
            if self.is_marked(strip, next) {
                break;
            }
            let face = adj.faces[next];
            if face.iter().all(|v| used.contains(v)) {
                break;
            }
            let Some(nv) = next_index(&face, nv0, nv1) else {
                break;
            };
            backward.push(next);
            self.mark(strip, next);
            used.extend(face);
            (nv0, nv1) = (nv1, nv);
            current = next;
        }

        strip.faces = backward.into_iter().rev().chain(forward).collect();
    }

    /// Pick where the strip following `strip` starts: an untouched face on
    /// an edge around the strip's starting vertex.
    fn find_traversal(&self, strip: &StripInfo) -> Option<StartInfo> {
        let start_edge = &self.adj.edges[strip.start.edge];
        let v = if strip.start.to_v1 {
            start_edge.v1
        } else {
            start_edge.v0
        };
        for &e in self.adj.edges_at(v) {
            let edge = &self.adj.edges[e];
            let (Some(f0), Some(f1)) = (edge.face0, edge.face1) else {
                continue;
            };
            let face = if !self.is_in_strip(strip, f0) && !self.is_marked(strip, f1) {
                f1
            } else if !self.is_in_strip(strip, f1) && !self.is_marked(strip, f0) {
                f0
            } else {
                continue;
            };
            let to_v1 = if self.shares_edge(strip, face) {
                edge.v0 == v
            } else {
                edge.v1 == v
            };
            return Some(StartInfo { face, edge: e, to_v1 });
        }
        None
    }

    /// First face with at least two boundary edges.
    fn find_start_point(&self) -> Option<usize> {
        (0..self.adj.faces.len()).find(|&f| self.adj.boundary_edges(f) >= 2)
    }

    fn find_good_reset_point(&mut self) -> Option<usize> {
        let n = self.state.len();
        let jump = ((n - 1) as f32 * self.mesh_jump) as usize;
        let start = if self.first_reset {
            self.first_reset = false;
            self.find_start_point().unwrap_or(jump)
        } else {
            jump
        }
        .min(n - 1);

        let mut result = None;
        let mut i = start;
        loop {
            if self.state[i].strip_id < 0 {
                result = Some(i);
                break;
            }
            i = (i + 1) % n;
            if i == start {
                break;
            }
        }

        self.mesh_jump += 0.1;
        if self.mesh_jump > 1.0 {
            self.mesh_jump = 0.05;
        }
        result
    }

    fn find_all_strips(&mut self) -> Vec<StripInfo> {
        let adj = self.adj;
        let mut all = Vec::new();
        let mut done = false;
        while !done {
            // Phase 1: six directed start edges per reset point
            let mut experiments: Vec<Vec<StripInfo>> = Vec::new();
            let mut reset_points = Vec::new();
            for _ in 0..NUM_SAMPLES {
                let Some(face) = self.find_good_reset_point() else {
                    done = true;
                    break;
                };
                if reset_points.contains(&face) {
                    continue;
                }
                reset_points.push(face);

                let [a, b, c] = adj.faces[face];
                for (x, y, to_v1) in [
                    (a, b, true),
                    (b, a, false),
                    (b, c, true),
                    (c, b, false),
                    (c, a, true),
                    (a, c, false),
                ] {
                    let Some(edge) = adj.find_edge(x, y) else {
                        continue;
                    };
                    let start = StartInfo { face, edge, to_v1 };
                    let (sid, eid) = (self.strip_id(), self.experiment_id());
                    experiments.push(vec![StripInfo::new(start, sid, eid)]);
                }
            }
            if experiments.is_empty() {
                break;
            }

            // Phase 2: build each experiment until it runs out of faces
            for experiment in experiments.iter_mut() {
                let experiment_id = experiment[0].experiment_id;
                self.build(&mut experiment[0]);
                loop {
                    let Some(start) = experiment.last().and_then(|s| self.find_traversal(s)) else {
                        break;
                    };
                    let sid = self.strip_id();
                    let mut strip = StripInfo::new(start, sid, experiment_id);
                    self.build(&mut strip);
                    experiment.push(strip);
                }
            }

            // Phase 3: score
            let mut best_index = 0;
            let mut best_value = 0.0f32;
            for (i, experiment) in experiments.iter().enumerate() {
                let faces: usize = experiment.iter().map(|s| s.faces.len()).sum();
                let num_strips = experiment.len() as f32;
                let avg = faces as f32 / num_strips;
                let value = avg + avg * num_strips;
                if value > best_value {
                    best_value = value;
                    best_index = i;
                }
            }

            // Phase 4: commit the winner only
            for mut strip in experiments.swap_remove(best_index) {
                strip.experiment_id = -1;
                for &f in &strip.faces {
                    self.mark(&strip, f);
                }
                all.push(strip);
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: u16) -> Vec<[u16; 3]> {
        let w = n + 1;
        let mut faces = Vec::new();
        for r in 0..n {
            for c in 0..n {
                let a = r * w + c;
                let (b, d, e) = (a + 1, a + w, a + w + 1);
                faces.push([a, d, b]);
                faces.push([b, d, e]);
            }
        }
        faces
    }

    #[test]
    fn every_face_lands_in_exactly_one_run() {
        let faces = grid(4);
        let runs = NvStripper::new(16, 0).face_runs(&faces);
        let mut seen: Vec<usize> = runs.strips.iter().flatten().chain(&runs.list).copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..faces.len()).collect::<Vec<_>>());
    }

    #[test]
    fn pieces_fit_the_cache() {
        let runs = NvStripper::new(8, 0).face_runs(&grid(6));
        assert!(runs.strips.iter().all(|s| s.len() <= 4));
    }

    #[test]
    fn short_strips_become_a_list() {
        let runs = NvStripper::new(16, 1000).face_runs(&grid(3));
        assert!(runs.strips.is_empty());
        assert_eq!(runs.list.len(), 18);
    }

    #[test]
    fn consecutive_strip_faces_share_an_edge() {
        let faces = grid(5);
        let runs = NvStripper::new(16, 0).face_runs(&faces);
        for strip in &runs.strips {
            for pair in strip.windows(2) {
                let (f, g) = (faces[pair[0]], faces[pair[1]]);
                assert_eq!(f.iter().filter(|v| g.contains(v)).count(), 2);
            }
        }
    }
}
