//! Integration tests for building and flattening BVHs.

use flatbvh::prelude::*;
use glam::Vec3;

/// Small deterministic generator so the tests need no RNG crate.
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32) / ((1u64 << 24) as f32)
    }
}

fn random_scene(count: u32, seed: u64) -> Vec<Primitive> {
    let mut rng = Lcg(seed);
    (0..count)
        .map(|id| {
            let c = Vec3::new(rng.next_f32(), rng.next_f32(), rng.next_f32()) * 100.0;
            let h = Vec3::new(rng.next_f32(), rng.next_f32(), rng.next_f32()) * 3.0;
            Primitive::new(BoundingBox::new(c - h, c + h), id)
        })
        .collect()
}

fn bb(min: [f32; 3], max: [f32; 3]) -> BoundingBox {
    BoundingBox::new(Vec3::from(min), Vec3::from(max))
}

fn header(primitive_id: i32, hit: i32, miss: i32) -> RecordHeader {
    RecordHeader {
        primitive_id,
        hit,
        miss,
    }
}

#[test]
fn test_record_count_is_three_per_node() {
    for count in [1u32, 2, 3, 5, 64, 100, 513] {
        let records = Bvh::build(&random_scene(count, count as u64))
            .unwrap()
            .serialize()
            .unwrap();
        let expected = if count == 1 { 3 } else { 3 * (2 * count as usize - 1) };
        assert_eq!(records.len(), expected, "count = {count}");
    }
}

#[test]
fn test_every_id_appears_once_on_a_leaf() {
    let prims = random_scene(300, 7);
    let records = Bvh::build(&prims).unwrap().serialize().unwrap();

    let mut ids: Vec<i32> = Vec::new();
    for (index, h, _) in records.nodes() {
        if h.primitive_id >= 0 {
            ids.push(h.primitive_id);
            // a leaf has nothing below it: hit just falls through
            assert_eq!(h.hit, h.miss, "leaf at {index} descends");
        } else {
            assert_eq!(h.primitive_id, -1);
            assert_eq!(h.hit, index as i32 + 3, "internal node at {index} must descend left");
        }
    }
    ids.sort_unstable();
    assert_eq!(ids, (0..300).collect::<Vec<i32>>());
}

#[test]
fn test_internal_boxes_contain_children() {
    let records = Bvh::build(&random_scene(200, 11)).unwrap().serialize().unwrap();
    for (index, h, bbox) in records.nodes() {
        if h.is_leaf() {
            continue;
        }
        let left = h.hit as usize;
        // the left child's miss skips to its right sibling
        let right = records.header(left).unwrap().miss as usize;
        let left_box = records.bounds(left).unwrap();
        let right_box = records.bounds(right).unwrap();
        assert!(bbox.contains(&left_box), "node {index} does not contain left child");
        assert!(bbox.contains(&right_box), "node {index} does not contain right child");
        assert_eq!(bbox, left_box.union(&right_box), "node {index} box is not tight");
    }
}

#[test]
fn test_output_is_deterministic() {
    let prims = random_scene(250, 3);
    let a = Bvh::build(&prims).unwrap().serialize().unwrap();
    let b = Bvh::build(&prims).unwrap().serialize().unwrap();
    assert_eq!(a.to_bytes(RecordLayout::Padded), b.to_bytes(RecordLayout::Padded));
}

#[test]
fn test_identical_boxes_use_parity_fallback() {
    let prims: Vec<Primitive> = (0..1000)
        .map(|id| Primitive::new(bb([1.0, 1.0, 1.0], [1.0, 1.0, 1.0]), id))
        .collect();
    let bvh = Bvh::build(&prims).unwrap();
    assert_eq!(bvh.node_count(), 1999);
    assert_eq!(bvh.stats().sah_splits, 0);
    // every internal node above a pair went through the fallback
    let pair_nodes = bvh
        .preorder()
        .map(|id| bvh.node(id))
        .filter(|n| match (n.left, n.right) {
            (Some(l), Some(r)) => bvh.node(l).is_leaf() && bvh.node(r).is_leaf(),
            _ => false,
        })
        .count();
    assert_eq!(bvh.stats().fallback_splits, 999 - pair_nodes);
    let records = bvh.serialize().unwrap();
    assert_eq!(records.len(), 3 * 1999);
}

#[test]
fn test_identical_boxes_with_extent() {
    // extent is positive but every centroid coincides
    let prims: Vec<Primitive> = (0..64)
        .map(|id| Primitive::new(bb([0.0, 0.0, 0.0], [2.0, 1.0, 1.0]), id))
        .collect();
    let bvh = Bvh::build(&prims).unwrap();
    assert_eq!(bvh.node_count(), 127);
    assert_eq!(bvh.stats().sah_splits, 0);
    assert!(bvh.stats().fallback_splits > 0);
    assert_eq!(bvh.depth(), 7);
}

#[test]
fn test_single_primitive_scenario() {
    let b = bb([0.0, 1.0, 2.0], [3.0, 4.0, 5.0]);
    let bvh = Bvh::build(&[Primitive::new(b, 5)]).unwrap();

    let records = bvh.serialize().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records.records()[0], Record::Header(header(5, -1, -1)));
    assert_eq!(records.records()[1], Record::Vector(b.min));
    assert_eq!(records.records()[2], Record::Vector(b.max));

    let mut chained = RecordBuffer::new();
    bvh.serialize_into(&mut chained, 12).unwrap();
    assert_eq!(chained.records()[0], Record::Header(header(5, 12, 12)));
}

#[test]
fn test_two_primitive_scenario() {
    let a = bb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
    let b = bb([3.0, 0.0, 0.0], [4.0, 1.0, 1.0]);
    let records = Bvh::build(&[Primitive::new(a, 0), Primitive::new(b, 1)])
        .unwrap()
        .serialize()
        .unwrap();
    let u = a.union(&b);
    assert_eq!(
        records.records(),
        &[
            Record::Header(header(-1, 3, -1)),
            Record::Vector(u.min),
            Record::Vector(u.max),
            Record::Header(header(0, 6, 6)),
            Record::Vector(a.min),
            Record::Vector(a.max),
            Record::Header(header(1, -1, -1)),
            Record::Vector(b.min),
            Record::Vector(b.max),
        ]
    );
}

#[test]
fn test_root_miss_terminates() {
    let records = Bvh::build(&random_scene(40, 5)).unwrap().serialize().unwrap();
    assert_eq!(records.header(0).unwrap().miss, TERMINATE);

    // the last record in preorder is the rightmost leaf; it always terminates
    let last = records.headers().last().unwrap();
    assert_eq!(last.hit, TERMINATE);
    assert_eq!(last.miss, TERMINATE);

    let mut walk = records.walk(|_| false);
    assert_eq!(walk.next(), None);
    assert_eq!(walk.steps(), 1);
}

#[test]
fn test_walk_matches_brute_force_overlap() {
    let prims = random_scene(400, 99);
    let records = Bvh::build(&prims).unwrap().serialize().unwrap();

    for query in [
        bb([10.0, 10.0, 10.0], [30.0, 30.0, 30.0]),
        bb([50.0, 0.0, 0.0], [51.0, 100.0, 100.0]),
        bb([-10.0, -10.0, -10.0], [-5.0, -5.0, -5.0]),
    ] {
        let mut found: Vec<u32> = records.walk(|b| b.intersects(&query)).collect();
        found.sort_unstable();
        let expected: Vec<u32> = prims
            .iter()
            .filter(|p| p.bbox.intersects(&query))
            .map(|p| p.id)
            .collect();
        assert_eq!(found, expected, "query {query:?}");
    }
}

#[test]
fn test_empty_input_has_no_buffer() {
    let bvh = Bvh::build(&[]).unwrap();
    assert!(bvh.is_empty());
    assert!(matches!(bvh.serialize(), Err(Error::EmptyTree)));
    assert!(flatten(&[], &BuildSettings::default()).unwrap().is_none());
}

#[test]
fn test_flatten_matches_build_then_serialize() {
    let prims = random_scene(50, 21);
    let settings = BuildSettings::default();
    let flat = flatten(&prims, &settings).unwrap().unwrap();
    let direct = Bvh::build(&prims).unwrap().serialize().unwrap();
    assert_eq!(flat, direct);
}

#[test]
fn test_bin_count_changes_nothing_structural() {
    let prims = random_scene(120, 8);
    for bins in [1, 4, 10, 32] {
        let settings = BuildSettings {
            bins,
            ..BuildSettings::default()
        };
        let bvh = Bvh::build_with(&prims, &settings).unwrap();
        assert_eq!(bvh.node_count(), 239, "bins = {bins}");
        assert_eq!(bvh.leaf_count(), 120);
    }
}

#[test]
fn test_hand_built_tree_serializes() {
    let a = bb([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
    let b = bb([2.0, 0.0, 0.0], [3.0, 1.0, 1.0]);
    let c = bb([5.0, 0.0, 0.0], [6.0, 1.0, 1.0]);
    let ab = a.union(&b);
    let nodes = vec![
        Node::leaf(&Primitive::new(a, 0)),
        Node::leaf(&Primitive::new(b, 1)),
        Node::leaf(&Primitive::new(c, 2)),
        Node::internal(ab, NodeId::new(0), NodeId::new(1)),
        Node::internal(ab.union(&c), NodeId::new(3), NodeId::new(2)),
    ];
    let bvh = Bvh::from_nodes(nodes, NodeId::new(4)).unwrap();
    assert_eq!(bvh.root(), Some(NodeId::new(4)));

    let records = bvh.serialize().unwrap();
    let links: Vec<(i32, i32, i32)> = records
        .headers()
        .map(|h| (h.primitive_id, h.hit, h.miss))
        .collect();
    assert_eq!(links, vec![(-1, 3, -1), (-1, 6, 12), (0, 9, 9), (1, 12, 12), (2, -1, -1)]);
}

#[test]
fn test_mesh_pipeline() {
    // 4x4 grid of quads, two triangles each
    let mut mesh = Mesh::new();
    for z in 0..4 {
        for x in 0..4 {
            let base = mesh.vertices.len() as u32;
            let (x, z) = (x as f32, z as f32);
            mesh.vertices.extend([
                Vec3::new(x, 0.0, z),
                Vec3::new(x + 1.0, 0.0, z),
                Vec3::new(x + 1.0, 0.5, z + 1.0),
                Vec3::new(x, 0.5, z + 1.0),
            ]);
            mesh.triangles.push(Triangle::new(base, base + 1, base + 2));
            mesh.triangles.push(Triangle::new(base, base + 2, base + 3).with_shade(1));
        }
    }
    let prims = mesh.primitives().unwrap();
    let records = Bvh::build(&prims).unwrap().serialize().unwrap();
    assert_eq!(records.len(), 3 * (2 * 32 - 1));
    assert_eq!(mesh.index_records().len(), 32);
    assert_eq!(mesh.vertex_records().len(), 64);
}
