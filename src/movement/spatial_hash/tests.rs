use super::*;

fn circle(x: f32, y: f32, r: f32) -> Aabb {
    Aabb::around(Vec2::new(x, y), r)
}

#[test]
fn test_query_finds_overlapping_proxies() {
    let mut hash = SpatialHash::new(10.0);
    hash.insert(Proxy::Body(0), circle(0.0, 0.0, 1.0));
    hash.insert(Proxy::Body(1), circle(5.0, 0.0, 1.0));
    hash.insert(Proxy::Body(2), circle(40.0, 40.0, 1.0));

    let mut out = Vec::new();
    hash.query_aabb(&circle(3.0, 0.0, 3.0), &mut out);
    out.sort();

    assert_eq!(out, vec![Proxy::Body(0), Proxy::Body(1)]);
}

#[test]
fn test_large_proxy_is_reported_once() {
    let mut hash = SpatialHash::new(2.0);
    hash.insert(Proxy::Obstacle(7), circle(0.0, 0.0, 9.0));
    assert!(hash.non_empty_cells() > 50);

    let mut out = Vec::new();
    hash.query_aabb(&circle(0.0, 0.0, 20.0), &mut out);
    assert_eq!(out, vec![Proxy::Obstacle(7)]);
}

#[test]
fn test_negative_coordinates_hash_correctly() {
    let mut hash = SpatialHash::new(4.0);
    hash.insert(Proxy::Body(0), circle(-3.0, -3.0, 0.5));

    let mut out = Vec::new();
    hash.query_aabb(&circle(-2.0, -2.0, 1.0), &mut out);
    assert_eq!(out, vec![Proxy::Body(0)]);

    hash.query_aabb(&circle(2.0, 2.0, 1.0), &mut out);
    assert!(out.is_empty());
}

#[test]
fn test_pairs_are_unique_across_shared_cells() {
    let mut hash = SpatialHash::new(1.0);
    // Both boxes span several of the same cells.
    hash.insert(Proxy::Body(0), circle(0.0, 0.0, 2.0));
    hash.insert(Proxy::Body(1), circle(1.0, 1.0, 2.0));
    hash.insert(Proxy::Obstacle(0), circle(30.0, 0.0, 0.5));

    let mut pairs = Vec::new();
    hash.overlapping_pairs(&mut pairs);

    assert_eq!(pairs, vec![(Proxy::Body(0), Proxy::Body(1))]);
}

#[test]
fn test_touching_boxes_overlap() {
    let mut hash = SpatialHash::new(10.0);
    hash.insert(Proxy::Body(0), circle(0.0, 0.0, 1.0));
    hash.insert(Proxy::Body(1), circle(2.0, 0.0, 1.0));

    let mut pairs = Vec::new();
    hash.overlapping_pairs(&mut pairs);
    assert_eq!(pairs.len(), 1);
}

#[test]
fn test_clear_keeps_cell_size_and_empties_cells() {
    let mut hash = SpatialHash::new(5.0);
    hash.insert(Proxy::Body(0), circle(0.0, 0.0, 1.0));
    hash.clear();

    assert!(hash.is_empty());
    assert_eq!(hash.non_empty_cells(), 0);
    assert_eq!(hash.cell_size(), 5.0);

    let mut out = Vec::new();
    hash.query_aabb(&circle(0.0, 0.0, 10.0), &mut out);
    assert!(out.is_empty());
}

#[test]
fn test_segment_query_returns_candidates_along_segment() {
    let mut hash = SpatialHash::new(5.0);
    hash.insert(Proxy::Body(0), circle(10.0, 0.0, 1.0));
    hash.insert(Proxy::Body(1), circle(10.0, 30.0, 1.0));

    let mut out = Vec::new();
    hash.query_segment(Vec2::new(0.0, 0.0), Vec2::new(20.0, 0.0), &mut out);
    assert_eq!(out, vec![Proxy::Body(0)]);
}
