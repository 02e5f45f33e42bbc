//! R*-style dynamic R-tree, parameterized over dimension.
//!
//! One implementation serves both the planar and the volumetric index:
//! [`RTree<2>`] and [`RTree<3>`]. Insertion descends to the subtree whose
//! bounding box grows least, splitting overflowing nodes along the axis
//! with the smallest running-margin sum. Deletion searches containing
//! branches iteratively and condenses empty nodes bottom-up. There is no
//! reinsert-on-underflow pass; tree quality is maintained by splits alone.
//!
//! The tree stores item *handles*; removal matches by handle identity, so
//! records with identical coordinates stay individually addressable.

mod knn;
mod node;


use crate::geom::{Item, Transform};
use crate::rect::Rect;

use node::{Children, Node, NodeId};

pub const DEFAULT_MAX_ENTRIES: usize = 9;

/// Construction parameters for a tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeOptions<const D: usize> {
    /// Maximum children per node. Values below 4 are raised to 4.
    pub max_entries: usize,
    /// Optional coordinate transform applied wherever the tree decodes a
    /// rectangle (items and queries alike).
    pub transform: Option<Transform<D>>,
}

impl<const D: usize> Default for TreeOptions<D> {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            transform: None,
        }
    }
}

/// A dynamic spatial index over `D`-dimensional axis-aligned rectangles.
pub struct RTree<const D: usize> {
    max_entries: usize,
    min_entries: usize,
    transform: Option<Transform<D>>,
    nodes: Vec<Node<D>>,
    free: Vec<NodeId>,
    root: NodeId,
    // scratch for insert/remove/condense, cleared at the start of each op
    path: Vec<NodeId>,
}

pub type RTree2 = RTree<2>;
pub type RTree3 = RTree<3>;

impl<const D: usize> RTree<D> {
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }

    pub fn with_options(opts: TreeOptions<D>) -> Self {
        let max_entries = opts.max_entries.max(4);
        let min_entries = ((max_entries as f64 * 0.4).ceil() as usize).max(2);
        let mut tree = Self {
            max_entries,
            min_entries,
            transform: opts.transform,
            nodes: Vec::new(),
            free: Vec::new(),
            root: NodeId::new(0),
            path: Vec::new(),
        };
        tree.root = tree.alloc(Node::empty_leaf());
        tree
    }

    /// True iff the tree holds no items. O(1).
    pub fn is_empty(&self) -> bool {
        self.node(self.root).len() == 0
    }

    /// Number of items in the tree.
    pub fn count(&self) -> usize {
        self.count_node(self.root)
    }

    /// Min/max corners of everything indexed, or zeroes when empty.
    pub fn bounds(&self) -> ([f64; D], [f64; D]) {
        let root = self.node(self.root);
        if root.len() == 0 {
            return ([0.0; D], [0.0; D]);
        }
        (root.bbox.min, root.bbox.max)
    }

    /// Insert an item. The tree keeps a clone of the handle.
    pub fn insert(&mut self, item: &Item) {
        let bbox = self.item_rect(item);
        let level = self.node(self.root).height - 1;
        self.insert_item(item.clone(), bbox, level);
    }

    /// Insert items one at a time.
    pub fn load(&mut self, items: &[Item]) {
        for item in items {
            self.insert(item);
        }
    }

    /// Remove an item by handle identity. Absent items are a no-op.
    pub fn remove(&mut self, item: &Item) {
        let bbox = self.item_rect(item);
        self.path.clear();
        let mut indexes: Vec<usize> = Vec::new();

        let mut node = Some(self.root);
        let mut parent: Option<NodeId> = None;
        let mut i = 0usize;
        let mut going_up = false;

        while node.is_some() || !self.path.is_empty() {
            let current = match node.take() {
                Some(id) => id,
                None => {
                    let id = self.path.pop().expect("path drains with the loop");
                    parent = self.path.last().copied();
                    i = indexes.pop().expect("index stack stays in step with path");
                    going_up = true;
                    id
                }
            };

            if self.node(current).is_leaf()
                && let Some(pos) = self.find_item(current, item)
            {
                if let Children::Items(items) = &mut self.node_mut(current).children {
                    items.remove(pos);
                }
                self.path.push(current);
                self.condense();
                return;
            }

            if !going_up && !self.node(current).is_leaf() && self.node(current).bbox.contains(&bbox)
            {
                // descend into a containing branch
                self.path.push(current);
                indexes.push(i);
                i = 0;
                parent = Some(current);
                node = self.child_node_at(current, 0);
            } else if let Some(p) = parent {
                // advance to the next sibling
                i += 1;
                node = self.child_node_at(p, i);
                going_up = false;
            } else {
                node = None;
            }
        }
    }

    /// Stream every item whose rectangle intersects the query item's
    /// rectangle. Returns `false` iff the callback stopped the search.
    pub fn search(&self, query: &Item, cb: impl FnMut(&Item) -> bool) -> bool {
        self.search_rect(self.item_rect(query), cb)
    }

    /// Like [`RTree::search`] with an explicit query window. The window is
    /// taken as-is; no transform is applied.
    pub fn search_rect(&self, query: Rect<D>, mut cb: impl FnMut(&Item) -> bool) -> bool {
        if !self.node(self.root).bbox.intersects(&query) {
            return true;
        }
        self.search_node(self.root, &query, &mut cb)
    }

    /// Visit every item in traversal order. Returns `false` on early exit.
    pub fn scan(&self, mut cb: impl FnMut(&Item) -> bool) -> bool {
        self.scan_node(self.root, &mut cb)
    }

    /// Walk nodes and leaf items. Nodes report their height (leaves at 1),
    /// leaf items report level 0 together with the item handle.
    pub fn traverse(&self, mut cb: impl FnMut(&Rect<D>, usize, Option<&Item>) -> bool) -> bool {
        self.traverse_node(self.root, &mut cb)
    }

    // ---- internals -------------------------------------------------------

    fn alloc(&mut self, node: Node<D>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.idx()] = node;
                id
            }
            None => {
                let id = NodeId::new(self.nodes.len());
                self.nodes.push(node);
                id
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        // reset the slot so item handles drop now, not at reuse
        self.nodes[id.idx()] = Node::empty_leaf();
        self.free.push(id);
    }

    fn node(&self, id: NodeId) -> &Node<D> {
        &self.nodes[id.idx()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<D> {
        &mut self.nodes[id.idx()]
    }

    /// An item's rectangle as this tree sees it (transform applied).
    fn item_rect(&self, item: &Item) -> Rect<D> {
        item_rect_with(self.transform, item)
    }

    fn child_rect(&self, id: NodeId, i: usize) -> Rect<D> {
        match &self.node(id).children {
            Children::Items(items) => self.item_rect(&items[i]),
            Children::Nodes(ids) => self.node(ids[i]).bbox,
        }
    }

    fn child_node_at(&self, id: NodeId, i: usize) -> Option<NodeId> {
        match &self.node(id).children {
            Children::Nodes(ids) => ids.get(i).copied(),
            Children::Items(_) => None,
        }
    }

    /// Bounding box over children `k..p` of a node.
    fn dist_bbox(&self, id: NodeId, k: usize, p: usize) -> Rect<D> {
        let mut bbox = Rect::EMPTY;
        for i in k..p {
            let child = self.child_rect(id, i);
            bbox.extend(&child);
        }
        bbox
    }

    fn calc_bbox(&mut self, id: NodeId) {
        let bbox = self.dist_bbox(id, 0, self.node(id).len());
        self.node_mut(id).bbox = bbox;
    }

    fn insert_item(&mut self, item: Item, bbox: Rect<D>, level: usize) {
        let leaf = self.choose_subtree(&bbox, level);
        match &mut self.node_mut(leaf).children {
            Children::Items(items) => items.push(item),
            Children::Nodes(_) => unreachable!("insert descends to a leaf"),
        }
        self.node_mut(leaf).bbox.extend(&bbox);

        // split overflowing nodes from the leaf level upward
        let mut level = self.path.len() - 1;
        while self.node(self.path[level]).len() > self.max_entries {
            self.split(level);
            if level == 0 {
                // root split; every node on the path was just recomputed
                return;
            }
            level -= 1;
        }

        // propagate the extension over the unsplit prefix of the path
        for idx in 0..=level {
            let id = self.path[idx];
            self.node_mut(id).bbox.extend(&bbox);
        }
    }

    /// Descend to the insertion target at `level`, recording the path.
    /// The child whose box grows least wins; ties break on smaller area,
    /// then on first seen.
    fn choose_subtree(&mut self, bbox: &Rect<D>, level: usize) -> NodeId {
        self.path.clear();
        let mut node = self.root;
        loop {
            self.path.push(node);
            if self.node(node).is_leaf() || self.path.len() - 1 == level {
                break;
            }
            let Children::Nodes(children) = &self.node(node).children else {
                unreachable!("non-leaf nodes hold node children");
            };
            let mut min_enlargement = f64::INFINITY;
            let mut min_area = f64::INFINITY;
            let mut target = None;
            for &child_id in children {
                let child = self.node(child_id);
                let area = child.bbox.area();
                let enlargement = bbox.enlarged_area(&child.bbox) - area;
                if enlargement < min_enlargement {
                    min_enlargement = enlargement;
                    if area < min_area {
                        min_area = area;
                    }
                    target = Some(child_id);
                } else if enlargement == min_enlargement && area < min_area {
                    min_area = area;
                    target = Some(child_id);
                }
            }
            node = target.unwrap_or(children[0]);
        }
        node
    }

    fn split(&mut self, level: usize) {
        let id = self.path[level];
        let total = self.node(id).len();
        let m = self.min_entries;

        self.choose_split_axis(id, m, total);
        let split_index = self.choose_split_index(id, m, total);

        let spliced = match &mut self.node_mut(id).children {
            Children::Items(items) => Children::Items(items.split_off(split_index)),
            Children::Nodes(ids) => Children::Nodes(ids.split_off(split_index)),
        };
        let sibling = self.alloc(Node {
            bbox: Rect::EMPTY,
            height: self.node(id).height,
            children: spliced,
        });

        self.calc_bbox(id);
        self.calc_bbox(sibling);

        if level != 0 {
            let parent = self.path[level - 1];
            match &mut self.node_mut(parent).children {
                Children::Nodes(ids) => ids.push(sibling),
                Children::Items(_) => unreachable!("parent of a split node is internal"),
            }
        } else {
            self.split_root(sibling);
        }
    }

    fn split_root(&mut self, sibling: NodeId) {
        let old_root = self.root;
        let new_root = self.alloc(Node {
            bbox: Rect::EMPTY,
            height: self.node(old_root).height + 1,
            children: Children::Nodes(vec![old_root, sibling]),
        });
        self.calc_bbox(new_root);
        self.root = new_root;
    }

    fn choose_split_axis(&mut self, id: NodeId, m: usize, total: usize) {
        let mut margins = [0.0; D];
        for (axis, margin) in margins.iter_mut().enumerate() {
            *margin = self.all_dist_margin(id, m, total, axis);
        }
        // ties resolve toward the later axis
        let mut best = 0;
        for axis in 1..D {
            if margins[axis] <= margins[best] {
                best = axis;
            }
        }
        // the margin pass left the children sorted by the last axis
        if best != D - 1 {
            self.sort_children(id, best);
        }
    }

    /// Margin statistic for splitting along `axis`. Sorts the children by
    /// that axis as a side effect.
    fn all_dist_margin(&mut self, id: NodeId, m: usize, total: usize, axis: usize) -> f64 {
        self.sort_children(id, axis);
        let mut left = self.dist_bbox(id, 0, m);
        let right = self.dist_bbox(id, total - m, total);
        let mut margin = left.margin() + right.margin();
        // the right seed stays fixed while the left accumulator sweeps forward
        for i in m..total - m {
            let child = self.child_rect(id, i);
            left.extend(&child);
            margin += left.margin() + right.margin();
        }
        margin
    }

    fn sort_children(&mut self, id: NodeId, axis: usize) {
        let transform = self.transform;
        let mut children =
            std::mem::replace(&mut self.node_mut(id).children, Children::Nodes(Vec::new()));
        match &mut children {
            Children::Items(items) => items.sort_by(|a, b| {
                let ka = item_rect_with(transform, a).min[axis];
                let kb = item_rect_with(transform, b).min[axis];
                ka.total_cmp(&kb)
            }),
            Children::Nodes(ids) => {
                let nodes = &self.nodes;
                ids.sort_by(|a, b| {
                    nodes[a.idx()].bbox.min[axis].total_cmp(&nodes[b.idx()].bbox.min[axis])
                });
            }
        }
        self.node_mut(id).children = children;
    }

    /// Split position over sorted children: least overlap between the two
    /// halves, then least combined area, then the lowest index.
    fn choose_split_index(&self, id: NodeId, m: usize, total: usize) -> usize {
        let mut min_overlap = f64::INFINITY;
        let mut min_area = f64::INFINITY;
        let mut index = 0;
        for i in m..=total - m {
            let left = self.dist_bbox(id, 0, i);
            let right = self.dist_bbox(id, i, total);
            let overlap = left.intersection_area(&right);
            let area = left.area() + right.area();
            if overlap < min_overlap {
                min_overlap = overlap;
                index = i;
                if area < min_area {
                    min_area = area;
                }
            } else if overlap == min_overlap && area < min_area {
                min_area = area;
                index = i;
            }
        }
        index
    }

    fn find_item(&self, id: NodeId, item: &Item) -> Option<usize> {
        match &self.node(id).children {
            Children::Items(items) => items.iter().position(|other| other == item),
            Children::Nodes(_) => None,
        }
    }

    /// Walk the recorded path deepest-first, unlinking empty nodes and
    /// refreshing bounding boxes.
    fn condense(&mut self) {
        for idx in (0..self.path.len()).rev() {
            let id = self.path[idx];
            if self.node(id).len() == 0 {
                if idx > 0 {
                    let parent = self.path[idx - 1];
                    if let Children::Nodes(ids) = &mut self.node_mut(parent).children
                        && let Some(pos) = ids.iter().position(|&c| c == id)
                    {
                        ids.remove(pos);
                    }
                    self.release(id);
                } else {
                    // the whole tree emptied: back to a fresh leaf root
                    self.nodes[id.idx()] = Node::empty_leaf();
                }
            } else {
                self.calc_bbox(id);
            }
        }
        self.path.clear();
    }

    fn count_node(&self, id: NodeId) -> usize {
        match &self.node(id).children {
            Children::Items(items) => items.len(),
            Children::Nodes(ids) => ids.iter().map(|&c| self.count_node(c)).sum(),
        }
    }

    fn search_node(&self, id: NodeId, query: &Rect<D>, cb: &mut impl FnMut(&Item) -> bool) -> bool {
        match &self.node(id).children {
            Children::Items(items) => {
                for item in items {
                    if query.intersects(&self.item_rect(item)) && !cb(item) {
                        return false;
                    }
                }
            }
            Children::Nodes(ids) => {
                for &child in ids {
                    if query.intersects(&self.node(child).bbox)
                        && !self.search_node(child, query, cb)
                    {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn scan_node(&self, id: NodeId, cb: &mut impl FnMut(&Item) -> bool) -> bool {
        match &self.node(id).children {
            Children::Items(items) => {
                for item in items {
                    if !cb(item) {
                        return false;
                    }
                }
            }
            Children::Nodes(ids) => {
                for &child in ids {
                    if !self.scan_node(child, cb) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn traverse_node(
        &self,
        id: NodeId,
        cb: &mut impl FnMut(&Rect<D>, usize, Option<&Item>) -> bool,
    ) -> bool {
        let node = self.node(id);
        if !cb(&node.bbox, node.height, None) {
            return false;
        }
        match &node.children {
            Children::Items(items) => {
                for item in items {
                    let rect = self.item_rect(item);
                    if !cb(&rect, 0, Some(item)) {
                        return false;
                    }
                }
            }
            Children::Nodes(ids) => {
                for &child in ids {
                    if !self.traverse_node(child, cb) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl<const D: usize> Default for RTree<D> {
    fn default() -> Self {
        Self::new()
    }
}

fn item_rect_with<const D: usize>(transform: Option<Transform<D>>, item: &Item) -> Rect<D> {
    let rect = item.geom().rect::<D>();
    match transform {
        Some(t) => {
            let (min, max) = t(rect.min, rect.max);
            Rect::new(min, max)
        }
        None => rect,
    }
}
