use crate::error::{DtsError, DtsResult};
use crate::math::{PlaneF, PlaneSide, glm};

/// A triangle being sorted, with its plane cached.
#[derive(Debug, Clone)]
pub struct SortFace {
    pub indices: [u16; 3],
    pub matindex: u32,
    pub plane: PlaneF,
    pub extent: f32, // squared length of the longest edge
}

/// Vertex and face arrays shared by every node of one sort. Splitting a
/// face appends vertices and faces; nothing is ever removed.
#[derive(Debug, Clone, Default)]
pub struct SortGeometry {
    pub verts: Vec<glm::Vec3>,
    pub norms: Vec<glm::Vec3>,
    pub tverts: Vec<glm::Vec2>,
    pub faces: Vec<SortFace>,
}

/// Plane of a triangle, computed from the two edges meeting opposite its
/// longest edge. Returns the plane and the squared longest edge.
pub fn face_plane(v0: &glm::Vec3, v1: &glm::Vec3, v2: &glm::Vec3) -> (PlaneF, f32) {
    let e01 = v1 - v0;
    let e12 = v2 - v1;
    let e20 = v0 - v2;
    let (l01, l12, l20) = (glm::dot(&e01, &e01), glm::dot(&e12, &e12), glm::dot(&e20, &e20));
    let cross = if l01 >= l12 && l01 >= l20 {
        glm::cross(&e12, &e20)
    } else if l12 >= l20 && l12 >= l01 {
        glm::cross(&e20, &e01)
    } else {
        glm::cross(&e01, &e12)
    };
    let len = glm::length(&cross);
    let normal = if len > 0.0 { -cross / len } else { glm::vec3(0.0, 0.0, 0.0) };
    let plane = PlaneF::new(normal, glm::dot(&normal, v0));
    (plane, l01.max(l12).max(l20))
}

impl SortGeometry {
    pub fn new(verts: Vec<glm::Vec3>, mut norms: Vec<glm::Vec3>, mut tverts: Vec<glm::Vec2>) -> Self {
        norms.resize(verts.len(), glm::vec3(0.0, 0.0, 0.0));
        tverts.resize(verts.len(), glm::vec2(0.0, 0.0));
        Self {
            verts,
            norms,
            tverts,
            faces: Vec::new(),
        }
    }

    pub fn push_face(&mut self, indices: [u16; 3], matindex: u32) -> usize {
        let [a, b, c] = indices.map(|i| self.verts[i as usize]);
        let (plane, extent) = face_plane(&a, &b, &c);
        self.faces.push(SortFace {
            indices,
            matindex,
            plane,
            extent,
        });
        self.faces.len() - 1
    }

    pub fn face_verts(&self, face: usize) -> [&glm::Vec3; 3] {
        let [a, b, c] = self.faces[face].indices;
        [
            &self.verts[a as usize],
            &self.verts[b as usize],
            &self.verts[c as usize],
        ]
    }

    /// Where `other` lies relative to the plane of `face`.
    pub fn classify(&self, face: usize, other: usize) -> PlaneSide {
        self.faces[face].plane.classify_triangle(self.face_verts(other))
    }

    fn push_vertex(&mut self, from: u16, to: u16, t: f32) -> DtsResult<u16> {
        let index = u16::try_from(self.verts.len())
            .map_err(|_| DtsError::TooManyVertices(self.verts.len() + 1))?;
        let (a, b) = (from as usize, to as usize);
        let v = self.verts[a] + (self.verts[b] - self.verts[a]) * t;
        let tv = self.tverts[a] + (self.tverts[b] - self.tverts[a]) * t;
        let n = self.norms[a] + (self.norms[b] - self.norms[a]) * t;
        let len = glm::length(&n);
        self.verts.push(v);
        self.tverts.push(tv);
        self.norms.push(if len > 0.0 { n / len } else { n });
        Ok(index)
    }

    /// Cut `face` along `plane` into two or three new faces and return
    /// their indices. Fragments keep the source winding and material.
    /// Fails once the new vertices no longer fit 16-bit indices.
    pub fn split_face(&mut self, face: usize, plane: &PlaneF) -> DtsResult<Vec<usize>> {
        let idx = self.faces[face].indices;
        let matindex = self.faces[face].matindex;
        let ks = idx.map(|i| glm::dot(&plane.normal, &self.verts[i as usize]));

        // One vertex on the plane: two fragments
        if let Some(on) = (0..3).find(|&r| (ks[r] - plane.k).abs() < PlaneF::EPSILON) {
            let (i0, i1, i2) = (idx[on], idx[(on + 1) % 3], idx[(on + 2) % 3]);
            let (k1, k2) = (ks[(on + 1) % 3], ks[(on + 2) % 3]);
            if (k2 - k1).abs() < f32::EPSILON {
                return Ok(Vec::new());
            }
            let i12 = self.push_vertex(i1, i2, (plane.k - k1) / (k2 - k1))?;
            return Ok(vec![
                self.push_face([i0, i1, i12], matindex),
                self.push_face([i0, i12, i2], matindex),
            ]);
        }

        // The vertex alone on its side of the plane goes first
        let code = (0..3).fold(0, |acc, r| acc | (((ks[r] < plane.k) as u8) << r));
        let rogue = match code {
            1 | 6 => 0,
            2 | 5 => 1,
            4 | 3 => 2,
            _ => return Ok(Vec::new()),
        };
        let (i0, i1, i2) = (idx[rogue], idx[(rogue + 1) % 3], idx[(rogue + 2) % 3]);
        let (k0, k1, k2) = (ks[rogue], ks[(rogue + 1) % 3], ks[(rogue + 2) % 3]);
        let i01 = self.push_vertex(i0, i1, (plane.k - k0) / (k1 - k0))?;
        let i02 = self.push_vertex(i0, i2, (plane.k - k0) / (k2 - k0))?;
        Ok(vec![
            self.push_face([i0, i01, i02], matindex),
            self.push_face([i01, i1, i02], matindex),
            self.push_face([i1, i2, i02], matindex),
        ])
    }
}

/// Per-node bookkeeping for one face: which faces sit in front of, behind,
/// across or on its plane. Only faces that were unused when the table was
/// built are recorded.
#[derive(Debug, Clone)]
pub struct FaceInfo {
    pub used: bool,
    pub priority: i32,
    pub parent: i32,          // -1 means an original face
    pub children: Vec<usize>, // fragments after a split
    pub in_front: Vec<bool>,
    pub behind: Vec<bool>,
    pub cut: Vec<bool>,
    pub coplanar: Vec<bool>,
}

impl Default for FaceInfo {
    fn default() -> Self {
        Self {
            used: false,
            priority: 0,
            parent: -1,
            children: Vec::new(),
            in_front: Vec::new(),
            behind: Vec::new(),
            cut: Vec::new(),
            coplanar: Vec::new(),
        }
    }
}

pub fn any_set(set: &[bool]) -> bool {
    set.iter().any(|&b| b)
}

pub fn test(set: &[bool], i: usize) -> bool {
    set.get(i).copied().unwrap_or(false)
}

fn subtract(set: &mut [bool], remove: &[bool]) {
    for (s, &r) in set.iter_mut().zip(remove) {
        if r {
            *s = false;
        }
    }
}

impl FaceInfo {
    pub fn used() -> Self {
        Self {
            used: true,
            ..Self::default()
        }
    }

    /// Rebuild the four relation sets of `me` against every unused face.
    pub fn classify(infos: &mut [FaceInfo], geo: &SortGeometry, me: usize) {
        let n = geo.faces.len();
        let mut in_front = vec![false; n];
        let mut behind = vec![false; n];
        let mut cut = vec![false; n];
        let mut coplanar = vec![false; n];
        for other in 0..n {
            if other == me || infos.get(other).is_none_or(|f| f.used) {
                continue;
            }
            match geo.classify(me, other) {
                PlaneSide::Front => in_front[other] = true,
                PlaneSide::Back => behind[other] = true,
                PlaneSide::Cross => cut[other] = true,
                PlaneSide::On => coplanar[other] = true,
            }
        }
        let info = &mut infos[me];
        info.in_front = in_front;
        info.behind = behind;
        info.cut = cut;
        info.coplanar = coplanar;
    }

    /// Drop `remove` from every relation set and mark those faces used.
    pub fn clear(infos: &mut [FaceInfo], remove: &[bool]) {
        for (i, info) in infos.iter_mut().enumerate() {
            subtract(&mut info.in_front, remove);
            subtract(&mut info.behind, remove);
            subtract(&mut info.cut, remove);
            subtract(&mut info.coplanar, remove);
            if test(remove, i) {
                info.used = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> SortGeometry {
        let mut geo = SortGeometry::new(
            vec![
                glm::vec3(-1.0, 0.0, -1.0),
                glm::vec3(-1.0, 0.0, 1.0),
                glm::vec3(1.0, 0.0, 1.0),
                glm::vec3(1.0, 0.0, -1.0),
            ],
            Vec::new(),
            vec![
                glm::vec2(0.0, 0.0),
                glm::vec2(0.0, 1.0),
                glm::vec2(1.0, 1.0),
                glm::vec2(1.0, 0.0),
            ],
        );
        geo.push_face([0, 1, 2], 0);
        geo.push_face([0, 2, 3], 0);
        geo
    }

    #[test]
    fn plane_matches_engine_winding() {
        let (a, b, c) = (
            glm::vec3(0.0, 0.0, 0.0),
            glm::vec3(0.0, 1.0, 0.0),
            glm::vec3(1.0, 0.0, 0.0),
        );
        let (plane, extent) = face_plane(&a, &b, &c);
        let engine = PlaneF::from_points(&a, &b, &c);
        assert!((plane.normal - engine.normal).norm() < 1e-6);
        assert!((extent - 2.0).abs() < 1e-6);
    }

    #[test]
    fn split_through_edges_gives_three_fragments() {
        let mut geo = square();
        let plane = PlaneF::new(glm::vec3(1.0, 0.0, 0.0), 0.5);
        let parts = geo.split_face(0, &plane).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(geo.verts.len(), 6);
        for &p in &parts {
            assert_ne!(plane.classify_triangle(geo.face_verts(p)), PlaneSide::Cross);
            assert_eq!(geo.faces[p].matindex, 0);
            let n = geo.faces[p].plane.normal;
            assert!((n - geo.faces[0].plane.normal).norm() < 1e-4);
        }
        // tverts follow the positions
        let tv = geo.tverts[4];
        let v = geo.verts[4];
        assert!((tv.x - (v.x + 1.0) / 2.0).abs() < 1e-5);
    }

    #[test]
    fn split_through_a_vertex_gives_two_fragments() {
        let mut geo = square();
        // passes through vertex 0 and the middle of edge 1-2
        let plane = PlaneF::from_points(
            &glm::vec3(-1.0, 0.0, -1.0),
            &glm::vec3(0.0, 1.0, 1.0),
            &glm::vec3(0.0, -1.0, 1.0),
        );
        let parts = geo.split_face(0, &plane).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(geo.verts.len(), 5);
    }

    #[test]
    fn splits_stop_at_the_16_bit_limit() {
        let mut geo = square();
        let last = glm::vec3(1.0, 0.0, -1.0);
        geo.verts.resize(u16::MAX as usize, last);
        geo.norms.resize(u16::MAX as usize, glm::vec3(0.0, 0.0, 0.0));
        geo.tverts.resize(u16::MAX as usize, glm::vec2(0.0, 0.0));

        // Through vertex 0: one new vertex, index 65535, still fits
        let through_vertex = PlaneF::from_points(
            &glm::vec3(-1.0, 0.0, -1.0),
            &glm::vec3(0.0, 1.0, 1.0),
            &glm::vec3(0.0, -1.0, 1.0),
        );
        assert_eq!(geo.split_face(0, &through_vertex).unwrap().len(), 2);
        assert_eq!(geo.verts.len(), u16::MAX as usize + 1);

        let across = PlaneF::new(glm::vec3(1.0, 0.0, 0.0), 0.5);
        assert!(matches!(
            geo.split_face(1, &across),
            Err(DtsError::TooManyVertices(65537))
        ));
    }

    #[test]
    fn classification_and_clearing() {
        let mut geo = square();
        geo.verts.push(glm::vec3(0.0, 2.0, 0.0));
        geo.push_face([0, 4, 2], 1);
        let mut infos = vec![FaceInfo::default(); 3];
        for i in 0..3 {
            FaceInfo::classify(&mut infos, &geo, i);
        }
        assert!(infos[0].coplanar[1]);
        assert!(any_set(&infos[0].in_front) || any_set(&infos[0].behind));

        FaceInfo::clear(&mut infos, &[false, true, false]);
        assert!(infos[1].used);
        assert!(!infos[0].coplanar[1]);
    }
}
