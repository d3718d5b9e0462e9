use std::io::Cursor;
use std::sync::Arc;

use dts::math::{PlaneF, glm};
use dts::model::{Material, MaterialFlags, Mesh, MeshKind, Primitive, PrimitiveType, Shape, Triangle};
use dts::settings::{SortSettings, StripAlgorithm, StripSettings};
use dts::sort::draw_order;
use dts::strip::{GroupKind, StripGroup, cache_misses, stripify};
use dts::stream::{read_integer_set, write_integer_set};
use dts::{ShapeBuilder, read_shape, write_shape};
use rstest::rstest;

/// `n` x `n` quads on a regular vertex grid, row by row, two triangles each.
fn grid(n: u16, matindex: u32) -> Vec<Triangle> {
    let row = n + 1;
    let mut tris = Vec::new();
    for y in 0..n {
        for x in 0..n {
            let a = y * row + x;
            let (b, c, d) = (a + 1, a + row + 1, a + row);
            tris.push(Triangle::new(a, b, c, matindex));
            tris.push(Triangle::new(a, c, d, matindex));
        }
    }
    tris
}

fn multiset(tris: &[Triangle]) -> Vec<([u16; 3], u32)> {
    let mut v: Vec<_> = tris
        .iter()
        .map(|t| (t.canonical(), Primitive::with_kind(t.matindex, PrimitiveType::Triangles)))
        .collect();
    v.sort_unstable();
    v
}

fn word(material: u32) -> u32 {
    Primitive::pack(PrimitiveType::Triangles, Some(material), true)
}

#[rstest]
#[case(StripAlgorithm::CacheSimulation, false)]
#[case(StripAlgorithm::CacheSimulation, true)]
#[case(StripAlgorithm::DegreeGreedy, false)]
#[case(StripAlgorithm::DegreeGreedy, true)]
fn strips_unwind_to_the_input(#[case] algorithm: StripAlgorithm, #[case] stitch: bool) {
    let mut tris = grid(6, word(0));
    tris.extend(grid(3, word(1)));
    // A lone face, a repeat and a sliver
    tris.push(Triangle::new(40, 41, 47, word(2)));
    tris.push(Triangle::new(40, 41, 47, word(2)));
    tris.push(Triangle::new(5, 5, 6, word(0)));

    let settings = StripSettings {
        algorithm,
        stitch,
        ..StripSettings::default()
    };
    let groups = stripify(&tris, &settings);
    let unwound: Vec<Triangle> = groups.iter().flat_map(StripGroup::triangles).collect();
    assert_eq!(multiset(&unwound), multiset(&tris));

    for g in &groups {
        if g.kind == GroupKind::List {
            assert_eq!(g.indices.len() % 3, 0);
        }
    }
}

#[rstest]
#[case(StripAlgorithm::CacheSimulation)]
#[case(StripAlgorithm::DegreeGreedy)]
fn non_manifold_edges_keep_every_face(#[case] algorithm: StripAlgorithm) {
    // Four faces hinge on edge 0-1, each with a neighbour of its own
    let w = word(0);
    let tris = vec![
        Triangle::new(0, 1, 2, w),
        Triangle::new(1, 0, 3, w),
        Triangle::new(0, 1, 4, w),
        Triangle::new(1, 0, 5, w),
        Triangle::new(2, 1, 6, w),
        Triangle::new(3, 0, 7, w),
        Triangle::new(4, 1, 8, w),
        Triangle::new(5, 0, 9, w),
    ];
    let settings = StripSettings {
        algorithm,
        ..StripSettings::default()
    };
    let groups = stripify(&tris, &settings);
    let unwound: Vec<Triangle> = groups.iter().flat_map(StripGroup::triangles).collect();
    assert_eq!(multiset(&unwound), multiset(&tris));
}

#[rstest]
#[case(8)]
#[case(16)]
#[case(24)]
fn strips_beat_the_raw_list_on_a_grid(#[case] cache_size: usize) {
    let tris = grid(10, word(0));
    let raw = StripGroup {
        kind: GroupKind::List,
        indices: tris.iter().flat_map(|t| t.indices).collect(),
        matindex: word(0),
    };
    let settings = StripSettings {
        algorithm: StripAlgorithm::CacheSimulation,
        cache_size,
        ..StripSettings::default()
    };
    let groups = stripify(&tris, &settings);
    let raw_misses = cache_misses(std::slice::from_ref(&raw), cache_size);
    let strip_misses = cache_misses(&groups, cache_size);
    assert!(
        strip_misses < raw_misses,
        "cache {cache_size}: strips miss {strip_misses}, list misses {raw_misses}"
    );
}

fn layer(z: f32) -> [glm::Vec3; 4] {
    [
        glm::vec3(0.0, 0.0, z),
        glm::vec3(0.0, 1.0, z),
        glm::vec3(1.0, 0.0, z),
        glm::vec3(1.0, 1.0, z),
    ]
}

/// Overlapping glass panes given out of order, sorted through the builder
/// and read back from a file.
fn sorted_panes() -> Shape {
    let mut mesh = Mesh::new(MeshKind::Standard);
    let mut verts = Vec::new();
    let mut tris = Vec::new();
    for z in [1.0, 2.0, 0.0] {
        let b = verts.len() as u16;
        verts.extend_from_slice(&layer(z));
        tris.push(Triangle::new(b, b + 1, b + 2, word(0)));
        tris.push(Triangle::new(b + 2, b + 1, b + 3, word(0)));
    }
    mesh.tverts = Arc::new(vec![glm::vec2(0.0, 0.0); verts.len()]);
    mesh.normals = Arc::new(vec![glm::vec3(0.0, 0.0, 1.0); verts.len()]);
    mesh.verts_per_frame = verts.len() as i32;
    mesh.verts = Arc::new(verts);
    mesh.set_triangles(&tris);

    let mut b = ShapeBuilder::new();
    let root = b
        .add_node("root", None, glm::vec3(0.0, 0.0, 0.0), glm::quat_identity())
        .unwrap();
    let panes = b.add_object("panes", Some(root)).unwrap();
    b.add_mesh_to_object(panes, mesh).unwrap();
    b.add_material(Material::new("glass", MaterialFlags::Translucent as u32));
    assert_eq!(b.sort_translucent().unwrap(), 1);
    b.finalize().unwrap();

    let mut file = Vec::new();
    write_shape(&mut file, b.shape(), 0).unwrap();
    read_shape(&mut Cursor::new(file)).unwrap()
}

#[test]
fn sorted_panes_draw_back_to_front() {
    let shape = sorted_panes();
    let mesh = &shape.meshes[0];
    assert_eq!(mesh.kind(), MeshKind::Sorted);

    let sorted = mesh.sorted().unwrap();
    let camera = glm::vec3(0.5, 0.5, 10.0);
    let prims: Vec<Primitive> = draw_order(&sorted.clusters, sorted.start_cluster[0] as usize, &camera)
        .into_iter()
        .map(|p| mesh.primitives[p])
        .collect();
    let heights: Vec<f32> = mesh
        .triangles_of(&prims)
        .iter()
        .map(|t| mesh.verts[t.indices[0] as usize].z)
        .collect();
    assert_eq!(heights, vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
}

#[test]
fn integer_sets_come_back_in_whole_words() {
    let mut bits = vec![false; 40];
    for i in [1, 7, 31, 32, 39] {
        bits[i] = true;
    }
    let mut out = Vec::new();
    write_integer_set(&mut out, &bits).unwrap();
    let back = read_integer_set(&mut Cursor::new(out)).unwrap();
    assert_eq!(back.len(), 64);
    assert_eq!(&back[..40], &bits[..]);
    assert!(back[40..].iter().all(|b| !b));
}

/// A tilted plank in a pinwheel of three, turned `angle` radians about z.
/// Each plank rises along its length, so the three overlap in a cycle.
fn plank(angle: f32) -> [glm::Vec3; 4] {
    let u = glm::vec3(angle.cos(), angle.sin(), 0.0);
    let w = glm::vec3(-angle.sin(), angle.cos(), 0.0);
    let at = |s: f32, t: f32| u * s + w * t + glm::vec3(0.0, 0.0, 0.5 + 0.3 * s);
    [at(-1.5, 0.2), at(-1.5, 0.7), at(1.5, 0.2), at(1.5, 0.7)]
}

/// Three pinwheel planks and two upright quads crossing each other.
fn tangle() -> Mesh {
    let third = std::f32::consts::TAU / 3.0;
    let quads = [
        plank(0.0),
        plank(third),
        plank(2.0 * third),
        [
            glm::vec3(3.0, 2.0, -0.5),
            glm::vec3(3.0, 2.0, 1.5),
            glm::vec3(3.0, 4.0, -0.5),
            glm::vec3(3.0, 4.0, 1.5),
        ],
        [
            glm::vec3(2.0, 3.0, -0.5),
            glm::vec3(4.0, 3.0, -0.5),
            glm::vec3(2.0, 3.0, 1.5),
            glm::vec3(4.0, 3.0, 1.5),
        ],
    ];
    let mut mesh = Mesh::new(MeshKind::Standard);
    let mut verts = Vec::new();
    let mut tris = Vec::new();
    for q in &quads {
        let b = verts.len() as u16;
        verts.extend_from_slice(q);
        tris.push(Triangle::new(b, b + 1, b + 2, word(0)));
        tris.push(Triangle::new(b + 2, b + 1, b + 3, word(0)));
    }
    mesh.tverts = Arc::new(vec![glm::vec2(0.0, 0.0); verts.len()]);
    mesh.normals = Arc::new(vec![glm::vec3(0.0, 0.0, 1.0); verts.len()]);
    mesh.verts_per_frame = verts.len() as i32;
    mesh.verts = Arc::new(verts);
    mesh.set_triangles(&tris);
    mesh
}

fn drawn(mesh: &Mesh, camera: &glm::Vec3) -> Vec<[u16; 3]> {
    let sorted = mesh.sorted().unwrap();
    let prims: Vec<Primitive> = draw_order(&sorted.clusters, sorted.start_cluster[0] as usize, camera)
        .into_iter()
        .map(|p| mesh.primitives[p])
        .collect();
    mesh.triangles_of(&prims).into_iter().map(|t| t.indices).collect()
}

/// Fraction along `from -> to` where the segment crosses the inside of `tri`.
fn crossing(from: &glm::Vec3, to: &glm::Vec3, tri: [&glm::Vec3; 3]) -> Option<f32> {
    let dir = to - from;
    let (e1, e2) = (tri[1] - tri[0], tri[2] - tri[0]);
    let p = glm::cross(&dir, &e2);
    let det = glm::dot(&e1, &p);
    if det.abs() < 1e-9 {
        return None;
    }
    let s = from - tri[0];
    let u = glm::dot(&s, &p) / det;
    let q = glm::cross(&s, &e1);
    let v = glm::dot(&dir, &q) / det;
    let t = glm::dot(&e2, &q) / det;
    let inside = u > 1e-4 && v > 1e-4 && u + v < 1.0 - 1e-4;
    (inside && t > 1e-4 && t < 1.0 - 1e-4).then_some(t)
}

/// Pairs of visible faces where the earlier one covers the later one.
fn painter_violations(verts: &[glm::Vec3], faces: &[[u16; 3]], camera: &glm::Vec3) -> usize {
    let corners = |f: &[u16; 3]| f.map(|v| &verts[v as usize]);
    let visible: Vec<&[u16; 3]> = faces
        .iter()
        .filter(|f| {
            let [a, b, c] = corners(*f);
            PlaneF::from_points(a, b, c).distance(camera) > 0.0
        })
        .collect();
    let mut count = 0;
    for (i, earlier) in visible.iter().enumerate() {
        for later in &visible[i + 1..] {
            let [a, b, c] = corners(*later);
            let centre = (a + b + c) / 3.0;
            let samples = [
                centre,
                centre + (a - centre) * 0.9,
                centre + (b - centre) * 0.9,
                centre + (c - centre) * 0.9,
            ];
            if samples
                .iter()
                .any(|s| crossing(camera, s, corners(*earlier)).is_some())
            {
                count += 1;
            }
        }
    }
    count
}

#[rstest]
#[case(4)]
#[case(6)]
#[case(10)]
fn tangled_faces_split_into_a_safe_order(#[case] max_depth: u32) {
    let mut mesh = tangle();
    let settings = SortSettings {
        max_depth,
        z_layer_up: false,
        z_layer_down: false,
        ..SortSettings::default()
    };
    mesh.sort_mesh(&settings).unwrap();

    let sorted = mesh.sorted().unwrap();
    assert!(mesh.verts.len() > 20, "crossing quads were not cut");
    assert!(sorted.clusters.len() > 1);

    for camera in [
        glm::vec3(0.2, 0.3, 6.0),
        glm::vec3(-2.5, 1.0, 3.0),
        glm::vec3(1.5, -2.0, 2.0),
        glm::vec3(0.1, -0.2, -5.0),
        glm::vec3(3.2, 2.6, 6.0),
        glm::vec3(6.0, 2.5, 0.5),
        glm::vec3(2.2, 5.0, 0.8),
    ] {
        let faces = drawn(&mesh, &camera);
        assert!(!faces.is_empty());
        assert_eq!(
            painter_violations(&mesh.verts, &faces, &camera),
            0,
            "depth {max_depth}, camera {camera:?}"
        );
    }
}

#[test]
fn unsplit_tangle_still_draws_every_face() {
    let mut mesh = tangle();
    let settings = SortSettings {
        max_depth: 0,
        z_layer_up: false,
        z_layer_down: false,
        ..SortSettings::default()
    };
    mesh.sort_mesh(&settings).unwrap();
    assert_eq!(mesh.verts.len(), 20);

    let mut faces = drawn(&mesh, &glm::vec3(0.2, 0.3, 6.0));
    assert_eq!(faces.len(), 10);
    faces.sort_unstable();
    faces.dedup();
    assert_eq!(faces.len(), 10);
}
