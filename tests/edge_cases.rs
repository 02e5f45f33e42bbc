use bytes::Bytes;

use dimtree::{GeomError, Item, SpatialIndex};

/// Test 1: everything on an empty index is a quiet no-op
#[test]
fn test_empty_index_queries() {
    let mut index = SpatialIndex::new();
    assert_eq!(index.count(), 0);
    assert!(index.is_empty());
    assert_eq!(index.bounds(), ([0.0; 3], [0.0; 3]));

    let mut calls = 0;
    assert!(index.search(&Item::rect2("", [-1.0, -1.0], [1.0, 1.0]), |_| {
        calls += 1;
        true
    }));
    assert!(index.knn(&Item::point2("", 0.0, 0.0), |_, _| {
        calls += 1;
        true
    }));
    assert!(index.scan(|_| {
        calls += 1;
        true
    }));
    assert_eq!(calls, 0);

    index.remove(&Item::point3("nothing", 1.0, 2.0, 3.0));
    assert!(index.is_empty());
}

/// Test 2: removal goes by handle, not by coordinates or key
#[test]
fn test_identity_not_coordinates() {
    let mut index = SpatialIndex::new();
    let original = Item::point2("spot", 7.0, 7.0);
    let twin = Item::point2("spot", 7.0, 7.0);
    index.insert(&original);

    index.remove(&twin);
    assert_eq!(index.count(), 1, "a look-alike handle must not match");

    index.remove(&original.clone());
    assert_eq!(index.count(), 0, "a clone of the handle must match");
}

/// Test 3: a point behaves as a degenerate rectangle, edges included
#[test]
fn test_point_touching_window_edge() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point2("corner", 1.0, 1.0));

    let mut hits = 0;
    index.search(&Item::rect2("", [0.0, 0.0], [1.0, 1.0]), |_| {
        hits += 1;
        true
    });
    assert_eq!(hits, 1);

    hits = 0;
    index.search(&Item::rect2("", [1.0, 1.0], [2.0, 2.0]), |_| {
        hits += 1;
        true
    });
    assert_eq!(hits, 1);

    hits = 0;
    index.search(&Item::rect2("", [1.1, 1.1], [2.0, 2.0]), |_| {
        hits += 1;
        true
    });
    assert_eq!(hits, 0);
}

/// Test 4: untrusted blobs are validated up front
#[test]
fn test_blob_validation() {
    assert!(matches!(
        Item::new("bad", Bytes::new()),
        Err(GeomError::Truncated { .. })
    ));
    assert!(matches!(
        Item::new("bad", Bytes::from_static(&[9, 1, 2, 3])),
        Err(GeomError::BadTag(9))
    ));

    let good = Item::point3("good", 1.0, 2.0, 3.0);
    let mut truncated = good.value().to_vec();
    truncated.pop();
    assert!(matches!(
        Item::new("bad", truncated),
        Err(GeomError::Truncated { .. })
    ));

    // a valid blob round-trips into a working handle
    let rebuilt = Item::new("good", good.value().clone()).unwrap();
    let mut index = SpatialIndex::new();
    index.insert(&rebuilt);
    assert_eq!(index.count(), 1);
    index.remove(&rebuilt);
    assert_eq!(index.count(), 0);
}

/// Test 5: keys are opaque bytes of any size
#[test]
fn test_long_and_binary_keys() {
    let mut index = SpatialIndex::new();
    let long_key = "x".repeat(1_000);
    let a = Item::point2(long_key.clone(), 0.0, 0.0);
    let b = Item::point2(Bytes::from_static(&[0x00, 0xff, 0x7f]), 0.5, 0.5);
    index.insert(&a);
    index.insert(&b);

    let mut found = Vec::new();
    index.search(&Item::rect2("", [-1.0, -1.0], [1.0, 1.0]), |item| {
        found.push(item.key().clone());
        true
    });
    assert_eq!(found.len(), 2);
    assert!(found.contains(&Bytes::from(long_key)));
}

/// Test 6: extreme but valid coordinates stay queryable
#[test]
fn test_extreme_coordinates() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point2("north", 0.0, 90.0));
    index.insert(&Item::point2("south", 0.0, -90.0));
    index.insert(&Item::point2("west", 180.0, 0.0));
    index.insert(&Item::point2("east", -180.0, 0.0));

    let mut hits = 0;
    index.search(&Item::rect2("", [-180.0, -90.0], [180.0, 90.0]), |_| {
        hits += 1;
        true
    });
    assert_eq!(hits, 4);

    let mut dists = Vec::new();
    index.knn(&Item::point2("", 0.0, 89.0), |_, dist| {
        dists.push(dist);
        true
    });
    assert_eq!(dists.len(), 4);
    assert_eq!(dists[0], 1.0);
}

/// Test 7: early exit propagates `false` from every streaming entry point
#[test]
fn test_early_exit_returns_false() {
    let mut index = SpatialIndex::new();
    for i in 0..20 {
        index.insert(&Item::point2("", i as f64, 0.0));
        index.insert(&Item::point3("", i as f64, 0.0, 1.0));
    }
    let window = Item::rect3("", [-1.0, -1.0, -2.0], [30.0, 1.0, 2.0]);
    assert!(!index.search(&window, |_| false));
    assert!(!index.scan(|_| false));
    assert!(!index.knn(&Item::point3("", 0.0, 0.0, 0.0), |_, _| false));
}

/// Test 8: a removed handle can be inserted again
#[test]
fn test_reinsert_after_remove() {
    let mut index = SpatialIndex::new();
    let item = Item::rect3("box", [0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
    for _ in 0..3 {
        index.insert(&item);
        assert_eq!(index.count(), 1);
        index.remove(&item);
        assert_eq!(index.count(), 0);
    }
}
