use log::debug;

use crate::error::DtsResult;

use super::face::{FaceInfo, SortGeometry, any_set, test};
use crate::math::{PlaneF, glm};
use crate::model::Triangle;
use crate::settings::SortSettings;

/// One node of the sort tree. Faces are indices into the shared
/// [`SortGeometry`].
#[derive(Debug, Clone, Default)]
pub struct SortNode {
    pub depth: u32,
    pub back_layers: Vec<Vec<usize>>,  // drawn first, in order
    pub front_layers: Vec<Vec<usize>>, // drawn last, in order
    pub middle: Vec<usize>,            // leftovers once the tree is too deep
    pub split: PlaneF,
    pub front: Option<usize>,
    pub back: Option<usize>,
}

impl SortNode {
    fn new(depth: u32) -> Self {
        Self {
            depth,
            split: PlaneF::new(glm::vec3(0.0, 0.0, 0.0), 0.0),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.back_layers.is_empty()
            && self.front_layers.is_empty()
            && self.middle.is_empty()
            && self.front.is_none()
            && self.back.is_none()
    }
}

/// Binary partition of a translucent face set. Nodes live in one arena;
/// `nodes[0]` is the root.
#[derive(Debug, Clone)]
pub struct TranslucentSort {
    pub geo: SortGeometry,
    pub nodes: Vec<SortNode>,
    settings: SortSettings,
}

impl TranslucentSort {
    pub fn new(geo: SortGeometry, settings: &SortSettings) -> Self {
        Self {
            geo,
            nodes: Vec::new(),
            settings: settings.clone(),
        }
    }

    /// Sort `tris` over the given vertex arrays.
    pub fn build(geo: SortGeometry, tris: &[Triangle], settings: &SortSettings) -> DtsResult<Self> {
        let mut sort = Self::new(geo, settings);
        for t in tris {
            sort.geo.push_face(t.indices, t.matindex);
        }
        let mut infos = vec![FaceInfo::default(); sort.geo.faces.len()];
        sort.assign_priorities(&mut infos);
        for i in 0..infos.len() {
            FaceInfo::classify(&mut infos, &sort.geo, i);
        }
        sort.sort_node(infos, 0)?;
        debug!(
            "translucent sort: {} faces in, {} after splitting, {} nodes",
            tris.len(),
            sort.geo.faces.len(),
            sort.nodes.len()
        );
        Ok(sort)
    }

    /// The `num_big_faces` largest faces get decreasing priority, the rest 0.
    fn assign_priorities(&self, infos: &mut [FaceInfo]) {
        let mut by_size: Vec<usize> = (0..infos.len()).collect();
        by_size.sort_by(|&a, &b| self.geo.faces[b].extent.total_cmp(&self.geo.faces[a].extent));
        let n = self.settings.num_big_faces;
        for (rank, &f) in by_size.iter().take(n).enumerate() {
            infos[f].priority = (n - rank) as i32;
        }
    }

    /// Faces of the whole tree, for checks and statistics.
    pub fn node_faces(&self, node: usize) -> Vec<usize> {
        let n = &self.nodes[node];
        let mut out: Vec<usize> = n.back_layers.iter().flatten().copied().collect();
        out.extend(&n.middle);
        out.extend(n.front_layers.iter().flatten());
        for child in [n.back, n.front].into_iter().flatten() {
            out.extend(self.node_faces(child));
        }
        out
    }

    fn sort_node(&mut self, mut infos: Vec<FaceInfo>, depth: u32) -> DtsResult<Option<usize>> {
        let id = self.nodes.len();
        self.nodes.push(SortNode::new(depth));
        let mut node = SortNode::new(depth);

        peel(&mut infos, &mut node);

        if let Some(cut_face) = choose_splitter(&infos) {
            if depth < self.settings.max_depth {
                self.split_node(&mut infos, &mut node, cut_face, depth)?;
            } else if self.settings.z_layer_up {
                node.middle = self.layer_sort(&infos, true);
            } else if self.settings.z_layer_down {
                node.middle = self.layer_sort(&infos, false);
            } else {
                node.middle = cope_sort(&mut infos);
            }
        }

        if depth > 0 && node.is_empty() {
            // Nothing was pushed after this node
            self.nodes.truncate(id);
            return Ok(None);
        }
        self.nodes[id] = node;
        Ok(Some(id))
    }

    fn split_node(
        &mut self,
        infos: &mut Vec<FaceInfo>,
        node: &mut SortNode,
        cut_face: usize,
        depth: u32,
    ) -> DtsResult<()> {
        let plane = self.geo.faces[cut_face].plane;

        if any_set(&infos[cut_face].cut) {
            infos.resize_with(self.geo.faces.len(), FaceInfo::used);
            let cut = infos[cut_face].cut.clone();
            for i in 0..cut.len() {
                if !cut[i] || infos[i].used {
                    continue;
                }
                let parts = self.geo.split_face(i, &plane)?;
                if parts.is_empty() {
                    continue;
                }
                let priority = infos[i].priority;
                infos.resize_with(self.geo.faces.len(), FaceInfo::default);
                for &p in &parts {
                    infos[p].priority = priority;
                    infos[p].parent = i as i32;
                }
                infos[i].used = true;
                infos[i].children = parts;
            }
            for i in 0..infos.len() {
                if !infos[i].used {
                    FaceInfo::classify(infos, &self.geo, i);
                }
            }
        }

        // The splitter and coplanar faces facing its way go behind, everything else in front
        let cutter = &infos[cut_face];
        let goes_back: Vec<bool> = (0..infos.len())
            .map(|i| {
                !infos[i].used
                    && (i == cut_face
                        || test(&cutter.behind, i)
                        || (test(&cutter.coplanar, i)
                            && glm::dot(&plane.normal, &self.geo.faces[i].plane.normal) > 0.0))
            })
            .collect();
        let goes_front: Vec<bool> = (0..infos.len())
            .map(|i| !infos[i].used && !goes_back[i])
            .collect();

        let mut back_infos = infos.clone();
        FaceInfo::clear(&mut back_infos, &goes_front);
        node.back = self.sort_node(back_infos, depth + 1)?;

        let mut front_infos = infos.clone();
        FaceInfo::clear(&mut front_infos, &goes_back);
        node.front = self.sort_node(front_infos, depth + 1)?;

        node.split = plane;
        Ok(())
    }

    /// Up-facing faces bottom to top and down-facing faces top to bottom.
    fn layer_sort(&self, infos: &[FaceInfo], up_first: bool) -> Vec<usize> {
        let mut up = Vec::new();
        let mut down = Vec::new();
        for (i, info) in infos.iter().enumerate() {
            if info.used {
                continue;
            }
            let zs = self.geo.face_verts(i).map(|v| v.z);
            let key = if up_first {
                zs[0].min(zs[1]).min(zs[2])
            } else {
                zs[0].max(zs[1]).max(zs[2])
            };
            if self.geo.faces[i].plane.normal.z > 0.0 {
                up.push((key, i));
            } else {
                down.push((key, i));
            }
        }
        up.sort_by(|a, b| a.0.total_cmp(&b.0));
        down.sort_by(|a, b| b.0.total_cmp(&a.0));
        let (first, second) = if up_first { (up, down) } else { (down, up) };
        first.into_iter().chain(second).map(|(_, i)| i).collect()
    }
}

/// Peel faces nobody sits behind into back layers and faces nobody sits in
/// front of into front layers until neither side gives anything.
fn peel(infos: &mut [FaceInfo], node: &mut SortNode) {
    loop {
        let back: Vec<usize> = (0..infos.len())
            .filter(|&i| !infos[i].used && !any_set(&infos[i].behind) && !any_set(&infos[i].cut))
            .collect();
        for &i in &back {
            infos[i].used = true;
        }
        let front: Vec<usize> = (0..infos.len())
            .filter(|&i| !infos[i].used && !any_set(&infos[i].in_front) && !any_set(&infos[i].cut))
            .collect();
        if back.is_empty() && front.is_empty() {
            break;
        }

        let mut remove = vec![false; infos.len()];
        for &i in back.iter().chain(&front) {
            remove[i] = true;
        }
        FaceInfo::clear(infos, &remove);
        if !back.is_empty() {
            node.back_layers.push(back);
        }
        if !front.is_empty() {
            node.front_layers.insert(0, front);
        }
    }
}

/// Highest priority first, then fewest cuts, then the most even split.
fn choose_splitter(infos: &[FaceInfo]) -> Option<usize> {
    let mut best: Option<(usize, i32, usize, usize)> = None;
    for (i, info) in infos.iter().enumerate() {
        if info.used {
            continue;
        }
        let live = |set: &[bool]| {
            set.iter()
                .enumerate()
                .filter(|&(j, &b)| b && infos.get(j).is_some_and(|f| !f.used))
                .count()
        };
        let cuts = live(&info.cut);
        let balance = live(&info.in_front).abs_diff(live(&info.behind));
        let better = best.is_none_or(|(_, p, c, b)| {
            info.priority > p || (info.priority == p && (cuts < c || (cuts == c && balance < b)))
        });
        if better {
            best = Some((i, info.priority, cuts, balance));
        }
    }
    best.map(|(i, ..)| i)
}

/// Fallback order for faces that could not be split any further: draw the
/// face with the fewest others behind it next, or put a face with nothing
/// in front of it at the end. A bounded pass of pairwise swaps then fixes
/// what it can.
fn cope_sort(infos: &mut [FaceInfo]) -> Vec<usize> {
    let saved = infos.to_vec();
    let mut back_order = Vec::new();
    let mut front_order = Vec::new();
    loop {
        let mut best: Option<(usize, usize, bool)> = None;
        for i in 0..infos.len() {
            if infos[i].used {
                continue;
            }
            let (mut front_count, mut back_count) = (0, 0);
            for j in 0..infos.len() {
                if infos[j].used {
                    continue;
                }
                if test(&infos[i].in_front, j) {
                    front_count += 1;
                } else if test(&infos[i].behind, j) {
                    back_count += 1;
                } else if test(&infos[i].cut, j) {
                    front_count += 1;
                    back_count += 1;
                }
            }
            if best.is_none_or(|(count, ..)| back_count < count) {
                best = Some((back_count, i, false));
            }
            if front_count == 0 && best.is_some_and(|(count, ..)| count > 0) {
                best = Some((0, i, true));
            }
        }
        let Some((_, face, to_front)) = best else {
            break;
        };
        if to_front {
            front_order.insert(0, face);
        } else {
            back_order.push(face);
        }
        let mut remove = vec![false; infos.len()];
        remove[face] = true;
        FaceInfo::clear(infos, &remove);
    }
    infos.clone_from_slice(&saved);

    let mut order = back_order;
    order.extend(front_order);
    local_swaps(&saved, &mut order);
    order
}

fn local_swaps(infos: &[FaceInfo], order: &mut [usize]) {
    let behind = |a: usize, b: usize| test(&infos[a].behind, b);
    let in_front = |a: usize, b: usize| test(&infos[a].in_front, b);
    let cut = |a: usize, b: usize| test(&infos[a].cut, b);

    let n = order.len();
    let mut budget = (n * n).max(16);
    let mut i = 0;
    while i < n && budget > 0 {
        budget -= 1;
        let f1 = order[i];
        let mut swapped = false;
        for j in i + 1..n {
            let f2 = order[j];
            let misplaced = (behind(f1, f2) && in_front(f2, f1))
                || (cut(f1, f2) && in_front(f2, f1))
                || (behind(f1, f2) && cut(f2, f1));
            if !misplaced {
                continue;
            }
            let movable = order[i + 1..j].iter().all(|&f12| {
                (behind(f1, f12) || in_front(f12, f1)) && (behind(f12, f2) || in_front(f2, f12))
            });
            if movable {
                order.swap(i, j);
                swapped = true;
                break;
            }
        }
        if !swapped {
            i += 1;
        }
    }
}
