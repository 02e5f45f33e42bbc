use super::*;
use crate::geom::Item;

fn collect_keys(index: &SpatialIndex, query: &Item) -> Vec<String> {
    let mut keys = Vec::new();
    index.search(query, |item| {
        keys.push(String::from_utf8_lossy(item.key()).into_owned());
        true
    });
    keys.sort();
    keys
}

#[test]
fn test_dispatch_by_dimensionality() {
    let mut index = SpatialIndex::new();
    let flat = Item::point2("flat", 1.0, 2.0);
    let tall = Item::point3("tall", 1.0, 2.0, 3.0);
    index.insert(&flat);
    index.insert(&tall);

    assert_eq!(index.tree2.count(), 1);
    assert_eq!(index.tree3.count(), 1);
    assert_eq!(index.count(), 2);

    index.remove(&flat);
    assert_eq!(index.tree2.count(), 0);
    assert_eq!(index.tree3.count(), 1);
    index.remove(&tall);
    assert!(index.is_empty());
}

#[test]
fn test_2d_item_vs_3d_query() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point2("origin", 0.0, 0.0));

    // a 3D window whose z-range covers 0 sees planar items
    let hit = Item::rect3("", [-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
    assert_eq!(collect_keys(&index, &hit), vec!["origin"]);

    // one floating above the plane does not
    let miss = Item::rect3("", [-1.0, -1.0, 5.0], [1.0, 1.0, 10.0]);
    assert!(collect_keys(&index, &miss).is_empty());
}

#[test]
fn test_3d_item_vs_2d_query() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point3("ground", 0.0, 0.0, 0.0));

    // a 2D window widens to an unbounded z-range over the 3D tree
    let window = Item::rect2("", [-1.0, -1.0], [1.0, 1.0]);
    assert_eq!(collect_keys(&index, &window), vec!["ground"]);

    index.insert(&Item::point3("aloft", 0.0, 0.0, 5.0));
    assert_eq!(collect_keys(&index, &window), vec!["aloft", "ground"]);
}

#[test]
fn test_search_streams_both_populations() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point2("p2", 0.5, 0.5));
    index.insert(&Item::point3("p3", 0.5, 0.5, 0.5));
    index.insert(&Item::point2("far2", 50.0, 50.0));
    index.insert(&Item::point3("far3", 50.0, 50.0, 50.0));

    let window = Item::rect3("", [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
    assert_eq!(collect_keys(&index, &window), vec!["p2", "p3"]);

    let window = Item::rect2("", [0.0, 0.0], [1.0, 1.0]);
    assert_eq!(collect_keys(&index, &window), vec!["p2", "p3"]);
}

#[test]
fn test_search_early_exit_spans_trees() {
    let mut index = SpatialIndex::new();
    for i in 0..10 {
        index.insert(&Item::point2("", i as f64, 0.0));
        index.insert(&Item::point3("", i as f64, 0.0, 0.0));
    }
    let mut seen = 0;
    let continued = index.search(&Item::rect2("", [-1.0, -1.0], [11.0, 1.0]), |_| {
        seen += 1;
        seen < 13
    });
    // the stop lands in the middle of the second tree's pass
    assert!(!continued);
    assert_eq!(seen, 13);
}

#[test]
fn test_bounds_mixing() {
    let mut index = SpatialIndex::new();
    assert_eq!(index.bounds(), ([0.0; 3], [0.0; 3]));

    // planar objects contribute nothing to z
    let flat = Item::rect2("flat", [-10.0, -5.0], [10.0, 5.0]);
    index.insert(&flat);
    assert_eq!(index.bounds(), ([-10.0, -5.0, 0.0], [10.0, 5.0, 0.0]));

    let tall = Item::rect3("tall", [-1.0, -1.0, -7.0], [20.0, 1.0, 7.0]);
    index.insert(&tall);
    assert_eq!(index.bounds(), ([-10.0, -5.0, -7.0], [20.0, 5.0, 7.0]));

    index.remove(&flat);
    assert_eq!(index.bounds(), ([-1.0, -1.0, -7.0], [20.0, 1.0, 7.0]));
}

#[test]
fn test_knn_single_population_bypass() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point2("near", 1.0, 0.0));
    index.insert(&Item::point2("far", 5.0, 0.0));

    let mut dists = Vec::new();
    assert!(index.knn(&Item::point2("", 0.0, 0.0), |_, dist| {
        dists.push(dist);
        true
    }));
    assert_eq!(dists, vec![1.0, 25.0]);

    let mut index = SpatialIndex::new();
    index.insert(&Item::point3("near", 0.0, 0.0, 2.0));
    index.insert(&Item::point3("far", 0.0, 0.0, 6.0));
    let mut dists = Vec::new();
    assert!(index.knn(&Item::point3("", 0.0, 0.0, 0.0), |_, dist| {
        dists.push(dist);
        true
    }));
    assert_eq!(dists, vec![4.0, 36.0]);
}

#[test]
fn test_knn_empty_index() {
    let index = SpatialIndex::new();
    let mut calls = 0;
    assert!(index.knn(&Item::point3("", 0.0, 0.0, 0.0), |_, _| {
        calls += 1;
        true
    }));
    assert_eq!(calls, 0);
}

#[test]
fn test_knn_merged_ordering() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point3("d0", 0.0, 0.0, 0.0));
    index.insert(&Item::point2("d1", 1.0, 0.0));
    index.insert(&Item::point3("d4", 0.0, 2.0, 0.0));
    index.insert(&Item::point2("d9", 0.0, 3.0));
    index.insert(&Item::point3("d16", 0.0, 0.0, 4.0));

    let mut results = Vec::new();
    assert!(index.knn(&Item::point3("", 0.0, 0.0, 0.0), |item, dist| {
        results.push((String::from_utf8_lossy(item.key()).into_owned(), dist));
        true
    }));
    assert_eq!(
        results,
        vec![
            ("d0".to_string(), 0.0),
            ("d1".to_string(), 1.0),
            ("d4".to_string(), 4.0),
            ("d9".to_string(), 9.0),
            ("d16".to_string(), 16.0),
        ]
    );
}

#[test]
fn test_knn_merged_tie_goes_to_3d() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point2("flat", 1.0, 0.0));
    index.insert(&Item::point3("tall", 0.0, 1.0, 0.0));

    let mut keys = Vec::new();
    assert!(index.knn(&Item::point3("", 0.0, 0.0, 0.0), |item, dist| {
        assert_eq!(dist, 1.0);
        keys.push(String::from_utf8_lossy(item.key()).into_owned());
        true
    }));
    assert_eq!(keys, vec!["tall", "flat"]);
}

#[test]
fn test_knn_merged_early_exit() {
    let mut index = SpatialIndex::new();
    for i in 0..100 {
        index.insert(&Item::point2("", i as f64, 0.0));
        index.insert(&Item::point3("", i as f64, 0.0, 1.0));
    }
    let mut seen = 0;
    let continued = index.knn(&Item::point3("", 0.0, 0.0, 0.0), |_, _| {
        seen += 1;
        seen < 5
    });
    assert!(!continued);
    assert_eq!(seen, 5);
}

#[test]
fn test_knn_merged_uneven_exhaustion() {
    // one stream dries up long before the other; the merge must drain the
    // survivor in order
    let mut index = SpatialIndex::new();
    index.insert(&Item::point2("only2", 0.5, 0.0));
    for i in 0..50 {
        index.insert(&Item::point3("", i as f64, 0.0, 0.0));
    }
    let mut dists = Vec::new();
    assert!(index.knn(&Item::point3("", 0.0, 0.0, 0.0), |_, dist| {
        dists.push(dist);
        true
    }));
    assert_eq!(dists.len(), 51);
    assert!(dists.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_nan_query_rejected() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point2("a", 0.0, 0.0));

    let bad = Item::point2("", f64::NAN, 0.0);
    let mut calls = 0;
    assert!(index.search(&bad, |_| {
        calls += 1;
        true
    }));
    assert!(index.knn(&bad, |_, _| {
        calls += 1;
        true
    }));
    assert_eq!(calls, 0);
}

#[test]
fn test_scan_covers_both_trees() {
    let mut index = SpatialIndex::new();
    index.insert(&Item::point2("a", 0.0, 0.0));
    index.insert(&Item::point3("b", 0.0, 0.0, 0.0));
    let mut seen = 0;
    assert!(index.scan(|_| {
        seen += 1;
        true
    }));
    assert_eq!(seen, 2);

    let mut seen = 0;
    assert!(!index.scan(|_| {
        seen += 1;
        false
    }));
    assert_eq!(seen, 1);
}
