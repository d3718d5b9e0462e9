use log::debug;

use super::adjacency::{FaceGraph, directed_edges};
use super::{FaceRuns, Stripper};

/// Quick stripper: visits faces from the least connected up and walks each
/// strip along the neighbour holding the next edge with the right winding.
#[derive(Debug, Clone)]
pub struct GreedyStripper {
    pub max_strip_size: usize, // in indices
}

impl Default for GreedyStripper {
    fn default() -> Self {
        Self { max_strip_size: 7 }
    }
}

impl GreedyStripper {
    pub fn new(max_strip_size: usize) -> Self {
        Self { max_strip_size }
    }
}

fn third(face: &[u16; 3], a: u16, b: u16) -> Option<u16> {
    face.iter().copied().find(|&v| v != a && v != b)
}

struct Walk<'a> {
    faces: &'a [[u16; 3]],
    graph: FaceGraph,
    used: Vec<bool>,
}

impl Walk<'_> {
    fn live_degree(&self, face: usize) -> usize {
        self.graph.neighbours[face]
            .iter()
            .filter(|&&n| !self.used[n])
            .count()
    }

    /// Unused neighbour with the lowest live degree; ties go to the last one.
    fn lowest_degree_neighbour(&self, face: usize) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for &n in &self.graph.neighbours[face] {
            if self.used[n] {
                continue;
            }
            let degree = self.live_degree(n);
            if best.is_none_or(|(d, _)| degree <= d) {
                best = Some((degree, n));
            }
        }
        best.map(|(_, n)| n)
    }

    fn make_strip(&mut self, first: usize, max_strip_size: usize) -> Option<Vec<usize>> {
        self.used[first] = true;
        let second = self.lowest_degree_neighbour(first)?;

        // Common edge last: the first face becomes [x, a, b] with a->b shared
        let f = self.faces[first];
        let s = self.faces[second];
        let [_, a, b] = (0..3)
            .map(|r| [f[r], f[(r + 1) % 3], f[(r + 2) % 3]])
            .find(|t| directed_edges(&s).contains(&(t[2], t[1])))?;
        let u = third(&s, a, b)?;
        self.used[second] = true;

        let mut run = vec![first, second];
        let mut tail = (b, u);
        let mut len = 4;
        let mut clockwise = true;
        let mut node = second;
        while len < max_strip_size {
            let (p, q) = tail;
            let fake = if clockwise { (p, q) } else { (q, p) };
            clockwise = !clockwise;
            let next = self.graph.neighbours[node]
                .iter()
                .copied()
                .find(|&n| !self.used[n] && directed_edges(&self.faces[n]).contains(&fake));
            let Some(next) = next else { break };
            let Some(w) = third(&self.faces[next], p, q) else {
                break;
            };
            self.used[next] = true;
            run.push(next);
            tail = (q, w);
            len += 1;
            node = next;
        }
        Some(run)
    }
}

impl Stripper for GreedyStripper {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn face_runs(&self, faces: &[[u16; 3]]) -> FaceRuns {
        let mut walk = Walk {
            faces,
            graph: FaceGraph::build(faces),
            used: vec![false; faces.len()],
        };
        let mut order: Vec<usize> = (0..faces.len()).collect();
        order.sort_by_key(|&f| walk.graph.degree(f));

        let mut runs = FaceRuns::default();
        let mut orphans = Vec::new();
        for f in order {
            if walk.used[f] {
                continue;
            }
            if walk.live_degree(f) == 0 {
                walk.used[f] = true;
                orphans.push(f);
                continue;
            }
            match walk.make_strip(f, self.max_strip_size) {
                Some(run) => runs.strips.push(run),
                None => orphans.push(f),
            }
        }
        debug!(
            "greedy stripper built {} strips, {} triangles left over",
            runs.strips.len(),
            orphans.len()
        );
        runs.list = orphans;
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_becomes_one_run() {
        let runs = GreedyStripper::new(7).face_runs(&[[0, 2, 1], [1, 2, 3]]);
        assert_eq!(runs.strips, vec![vec![0, 1]]);
        assert!(runs.list.is_empty());
    }

    #[test]
    fn isolated_faces_are_orphans() {
        let runs = GreedyStripper::new(7).face_runs(&[[0, 1, 2], [3, 4, 5]]);
        assert!(runs.strips.is_empty());
        assert_eq!(runs.list, vec![0, 1]);
    }

    #[test]
    fn strip_length_is_capped() {
        // A row of six triangles
        let faces = [[0, 1, 2], [2, 1, 3], [2, 3, 4], [4, 3, 5], [4, 5, 6], [6, 5, 7]];
        let runs = GreedyStripper::new(5).face_runs(&faces);
        assert!(runs.strips.iter().all(|r| r.len() <= 3));
        let total: usize = runs.strips.iter().map(Vec::len).sum::<usize>() + runs.list.len();
        assert_eq!(total, faces.len());
    }
}
