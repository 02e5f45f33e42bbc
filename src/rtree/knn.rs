//! Best-first nearest-neighbor traversal.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geom::Item;
use crate::rtree::node::{Children, NodeId};
use crate::rtree::RTree;

enum Entry<'t> {
    Node(NodeId),
    Item(&'t Item),
}

struct QueueEntry<'t> {
    dist: f64,
    entry: Entry<'t>,
}

impl QueueEntry<'_> {
    fn is_item(&self) -> bool {
        matches!(self.entry, Entry::Item(_))
    }
}

impl PartialEq for QueueEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}

impl Eq for QueueEntry<'_> {}

impl PartialOrd for QueueEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so the max-heap pops the closest entry first
        other.dist.total_cmp(&self.dist)
    }
}

impl<const D: usize> RTree<D> {
    /// Stream items from nearest to farthest by squared box distance.
    ///
    /// Distances are nondecreasing across callback invocations: a node's
    /// box never sits farther from the query point than anything below it,
    /// so expanding the closest queue entry preserves order. Returns
    /// `false` iff the callback stopped the stream.
    pub fn knn(&self, point: [f64; D], mut cb: impl FnMut(&Item, f64) -> bool) -> bool {
        let mut queue = BinaryHeap::new();
        let mut node = Some(self.root);
        while let Some(id) = node {
            // enqueue the children of the node under expansion
            match &self.node(id).children {
                Children::Items(items) => {
                    for item in items {
                        queue.push(QueueEntry {
                            dist: self.item_rect(item).point_dist_sq(point),
                            entry: Entry::Item(item),
                        });
                    }
                }
                Children::Nodes(ids) => {
                    for &child in ids {
                        queue.push(QueueEntry {
                            dist: self.node(child).bbox.point_dist_sq(point),
                            entry: Entry::Node(child),
                        });
                    }
                }
            }
            // deliver items while they hold the front of the queue
            while queue.peek().is_some_and(QueueEntry::is_item) {
                let Some(QueueEntry {
                    dist,
                    entry: Entry::Item(item),
                }) = queue.pop()
                else {
                    break;
                };
                if !cb(item, dist) {
                    return false;
                }
            }
            node = match queue.pop() {
                Some(QueueEntry {
                    entry: Entry::Node(id),
                    ..
                }) => Some(id),
                _ => None,
            };
        }
        true
    }
}
