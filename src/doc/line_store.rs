//! Balanced multi-way tree of document lines.
//!
//! Leaves hold runs of up to 50 lines; branches hold up to 10 children.
//! Every node caches the number of lines and the total height below it, so
//! line-number and height lookups descend the tree in `O(depth + leaf size)`.
//! Lines and nodes live in arenas and refer to each other by id; a line knows
//! its leaf and every node knows its parent.
//!
//! Indices taken and returned by the store are zero-based. Documents add their
//! first-line offset on top.

use std::ops::ControlFlow;

use crate::arena::Arena;
use crate::doc::line::{Line, LineId};

crate::arena::arena_id!(NodeId);

/// Leaves are split once they exceed this many lines.
const LEAF_MAX: usize = 50;
/// Size of the chunks a split leaf is cut into.
const LEAF_CHUNK: usize = 25;
/// Branches spill once they exceed this many children.
const BRANCH_MAX: usize = 10;
/// Number of trailing children moved to a new sibling on spill.
const BRANCH_SPILL: usize = 5;
/// Branches smaller than this are collapsed into a single leaf.
const COLLAPSE_BELOW: usize = 25;

#[derive(Debug)]
enum NodeKind {
    Leaf(Vec<LineId>),
    Branch(Vec<NodeId>),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    size: usize,
    height: f64,
    parent: Option<NodeId>,
}

impl Node {
    fn leaf(lines: Vec<LineId>, height: f64, parent: Option<NodeId>) -> Self {
        Self {
            size: lines.len(),
            kind: NodeKind::Leaf(lines),
            height,
            parent,
        }
    }

    fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Branch(children) => children,
            NodeKind::Leaf(_) => &[],
        }
    }

    fn children_mut(&mut self) -> &mut Vec<NodeId> {
        match &mut self.kind {
            NodeKind::Branch(children) => children,
            NodeKind::Leaf(_) => unreachable!("leaf node used as a branch"),
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }
}

/// The line container of a document.
#[derive(Debug)]
pub struct LineStore {
    lines: Arena<LineId, Line>,
    nodes: Arena<NodeId, Node>,
    root: NodeId,
}

impl LineStore {
    /// Build a store holding `lines` in order.
    #[must_use]
    pub fn new(lines: Vec<Line>) -> Self {
        let mut nodes = Arena::new();
        let root = nodes.insert(Node {
            kind: NodeKind::Branch(Vec::new()),
            size: 0,
            height: 0.0,
            parent: None,
        });
        let leaf = nodes.insert(Node::leaf(Vec::new(), 0.0, Some(root)));
        nodes[root].children_mut().push(leaf);
        let mut store = Self {
            lines: Arena::new(),
            nodes,
            root,
        };
        store.insert(0, lines);
        store
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes[self.root].size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all line heights.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.nodes[self.root].height
    }

    #[must_use]
    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id)
    }

    pub(crate) fn line_mut(&mut self, id: LineId) -> Option<&mut Line> {
        self.lines.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: LineId) -> bool {
        self.lines.contains(id)
    }

    /// Insert `lines` so that the first one ends up at index `at`.
    pub fn insert(&mut self, at: usize, lines: Vec<Line>) -> Vec<LineId> {
        if lines.is_empty() {
            return Vec::new();
        }
        let height: f64 = lines.iter().map(|line| line.height).sum();
        let ids: Vec<LineId> = lines.into_iter().map(|line| self.lines.insert(line)).collect();
        self.insert_inner(self.root, at.min(self.len()), &ids, height);
        ids
    }

    fn insert_inner(&mut self, node: NodeId, at: usize, ids: &[LineId], height: f64) {
        let entry = &mut self.nodes[node];
        entry.size += ids.len();
        entry.height += height;
        match &mut entry.kind {
            NodeKind::Leaf(lines) => {
                lines.splice(at..at, ids.iter().copied());
                for &id in ids {
                    self.lines[id].parent = Some(node);
                }
            }
            NodeKind::Branch(children) => {
                let children = children.clone();
                let mut at = at;
                for (index, &child) in children.iter().enumerate() {
                    let size = self.nodes[child].size;
                    if at <= size {
                        self.insert_inner(child, at, ids, height);
                        if self.split_leaf(node, index, child) {
                            self.maybe_spill(node);
                        }
                        return;
                    }
                    at -= size;
                }
            }
        }
    }

    /// Cut an oversized leaf into `LEAF_CHUNK`-line siblings. Returns whether
    /// a split happened.
    fn split_leaf(&mut self, parent: NodeId, index: usize, leaf: NodeId) -> bool {
        let lines = match &mut self.nodes[leaf].kind {
            NodeKind::Leaf(lines) if lines.len() > LEAF_MAX => std::mem::take(lines),
            _ => return false,
        };
        let remaining = lines.len() % LEAF_CHUNK + LEAF_CHUNK;
        let mut new_leaves = Vec::new();
        for chunk in lines[remaining..].chunks(LEAF_CHUNK) {
            let height: f64 = chunk.iter().map(|&id| self.lines[id].height).sum();
            let sibling = self
                .nodes
                .insert(Node::leaf(chunk.to_vec(), height, Some(parent)));
            for &id in chunk {
                self.lines[id].parent = Some(sibling);
            }
            let entry = &mut self.nodes[leaf];
            entry.height -= height;
            entry.size -= chunk.len();
            new_leaves.push(sibling);
        }
        self.nodes[leaf].kind = NodeKind::Leaf(lines[..remaining].to_vec());
        let children = self.nodes[parent].children_mut();
        children.splice(index + 1..index + 1, new_leaves);
        true
    }

    fn maybe_spill(&mut self, node: NodeId) {
        if self.nodes[node].children().len() <= BRANCH_MAX {
            return;
        }
        let mut me = node;
        loop {
            let children = self.nodes[me].children_mut();
            let spilled = children.split_off(children.len() - BRANCH_SPILL);
            let sibling = self.branch_of(spilled);
            match self.nodes[me].parent {
                None => {
                    // The root keeps its identity; its remaining children move
                    // into a fresh copy.
                    let rest = std::mem::take(self.nodes[me].children_mut());
                    let copy = self.branch_of(rest);
                    self.nodes[copy].parent = Some(me);
                    self.nodes[sibling].parent = Some(me);
                    *self.nodes[me].children_mut() = vec![copy, sibling];
                    me = copy;
                }
                Some(parent) => {
                    let (size, height) = (self.nodes[sibling].size, self.nodes[sibling].height);
                    let entry = &mut self.nodes[me];
                    entry.size -= size;
                    entry.height -= height;
                    let siblings = self.nodes[parent].children_mut();
                    let index = siblings.iter().position(|&c| c == me).unwrap_or(0);
                    siblings.insert(index + 1, sibling);
                    self.nodes[sibling].parent = Some(parent);
                }
            }
            if self.nodes[me].children().len() <= BRANCH_MAX {
                break;
            }
        }
        if let Some(parent) = self.nodes[me].parent {
            self.maybe_spill(parent);
        }
    }

    fn branch_of(&mut self, children: Vec<NodeId>) -> NodeId {
        let size = children.iter().map(|&c| self.nodes[c].size).sum();
        let height = children.iter().map(|&c| self.nodes[c].height).sum();
        let branch = self.nodes.insert(Node {
            kind: NodeKind::Branch(Vec::new()),
            size,
            height,
            parent: None,
        });
        for &child in &children {
            self.nodes[child].parent = Some(branch);
        }
        *self.nodes[branch].children_mut() = children;
        branch
    }

    /// Remove `count` lines starting at index `at`, returning them in order.
    pub fn remove(&mut self, at: usize, count: usize) -> Vec<Line> {
        let len = self.len();
        let at = at.min(len);
        let count = count.min(len - at);
        if count == 0 {
            return Vec::new();
        }
        let mut removed = Vec::with_capacity(count);
        self.remove_inner(self.root, at, count, &mut removed);
        removed
            .into_iter()
            .filter_map(|id| self.lines.remove(id))
            .map(|mut line| {
                line.parent = None;
                line
            })
            .collect()
    }

    fn remove_inner(&mut self, node: NodeId, at: usize, count: usize, out: &mut Vec<LineId>) {
        if let NodeKind::Leaf(lines) = &mut self.nodes[node].kind {
            let ids: Vec<LineId> = lines.drain(at..at + count).collect();
            let height: f64 = ids.iter().map(|&id| self.lines[id].height).sum();
            let entry = &mut self.nodes[node];
            entry.size -= count;
            entry.height -= height;
            out.extend(ids);
            return;
        }

        self.nodes[node].size -= count;
        let mut at = at;
        let mut count = count;
        let mut index = 0;
        while index < self.nodes[node].children().len() {
            let child = self.nodes[node].children()[index];
            let size = self.nodes[child].size;
            if at < size {
                let removing = count.min(size - at);
                let old_height = self.nodes[child].height;
                self.remove_inner(child, at, removing, out);
                let new_height = self.nodes[child].height;
                self.nodes[node].height -= old_height - new_height;
                if size == removing {
                    self.nodes[node].children_mut().remove(index);
                    self.free_subtree(child);
                } else {
                    index += 1;
                }
                count -= removing;
                if count == 0 {
                    break;
                }
                at = 0;
            } else {
                at -= size;
                index += 1;
            }
        }

        let children = self.nodes[node].children();
        let single_leaf = children.len() == 1 && self.nodes[children[0]].is_leaf();
        if self.nodes[node].size < COLLAPSE_BELOW && !single_leaf {
            let mut lines = Vec::new();
            for child in self.nodes[node].children().to_vec() {
                self.collapse_into(child, &mut lines);
            }
            let height = lines.iter().map(|&id| self.lines[id].height).sum();
            let leaf = self.nodes.insert(Node::leaf(lines.clone(), height, Some(node)));
            for id in lines {
                self.lines[id].parent = Some(leaf);
            }
            *self.nodes[node].children_mut() = vec![leaf];
        }
    }

    /// Move every line under `node` into `out` and free the subtree.
    fn collapse_into(&mut self, node: NodeId, out: &mut Vec<LineId>) {
        if let Some(entry) = self.nodes.remove(node) {
            match entry.kind {
                NodeKind::Leaf(lines) => out.extend(lines),
                NodeKind::Branch(children) => {
                    for child in children {
                        self.collapse_into(child, out);
                    }
                }
            }
        }
    }

    fn free_subtree(&mut self, node: NodeId) {
        if let Some(entry) = self.nodes.remove(node) {
            if let NodeKind::Branch(children) = entry.kind {
                for child in children {
                    self.free_subtree(child);
                }
            }
        }
    }

    /// Id of the line at index `n`.
    #[must_use]
    pub fn id_at(&self, n: usize) -> Option<LineId> {
        if n >= self.len() {
            return None;
        }
        let mut node = self.root;
        let mut n = n;
        loop {
            match &self.nodes[node].kind {
                NodeKind::Leaf(lines) => return lines.get(n).copied(),
                NodeKind::Branch(children) => {
                    let mut next = None;
                    for &child in children {
                        let size = self.nodes[child].size;
                        if n < size {
                            next = Some(child);
                            break;
                        }
                        n -= size;
                    }
                    node = next?;
                }
            }
        }
    }

    /// Index of line `id`, found by climbing from its leaf to the root.
    #[must_use]
    pub fn index_of(&self, id: LineId) -> Option<usize> {
        let mut cur = self.lines.get(id)?.parent?;
        let NodeKind::Leaf(lines) = &self.nodes[cur].kind else {
            return None;
        };
        let mut index = lines.iter().position(|&line| line == id)?;
        while let Some(parent) = self.nodes[cur].parent {
            for &child in self.nodes[parent].children() {
                if child == cur {
                    break;
                }
                index += self.nodes[child].size;
            }
            cur = parent;
        }
        Some(index)
    }

    /// Index of the line covering vertical offset `h`. Offsets past the end
    /// return `len()`.
    #[must_use]
    pub fn index_at_height(&self, h: f64) -> usize {
        let mut node = self.root;
        let mut h = h;
        let mut n = 0;
        'outer: loop {
            match &self.nodes[node].kind {
                NodeKind::Branch(children) => {
                    for &child in children {
                        let child_height = self.nodes[child].height;
                        if h < child_height {
                            node = child;
                            continue 'outer;
                        }
                        h -= child_height;
                        n += self.nodes[child].size;
                    }
                    return n;
                }
                NodeKind::Leaf(lines) => {
                    for &id in lines {
                        let line_height = self.lines[id].height;
                        if h < line_height {
                            return n;
                        }
                        h -= line_height;
                        n += 1;
                    }
                    return n;
                }
            }
        }
    }

    /// Vertical offset of the top of line `id`.
    #[must_use]
    pub fn height_before(&self, id: LineId) -> f64 {
        let Some(mut cur) = self.lines.get(id).and_then(|line| line.parent) else {
            return 0.0;
        };
        let mut h = 0.0;
        if let NodeKind::Leaf(lines) = &self.nodes[cur].kind {
            for &line in lines {
                if line == id {
                    break;
                }
                h += self.lines[line].height;
            }
        }
        while let Some(parent) = self.nodes[cur].parent {
            for &child in self.nodes[parent].children() {
                if child == cur {
                    break;
                }
                h += self.nodes[child].height;
            }
            cur = parent;
        }
        h
    }

    /// Set the height of line `id`, propagating the difference to the root.
    pub fn set_height(&mut self, id: LineId, height: f64) {
        let Some(line) = self.lines.get_mut(id) else {
            return;
        };
        let diff = height - line.height;
        line.height = height;
        if diff == 0.0 {
            return;
        }
        let mut node = line.parent;
        while let Some(cur) = node {
            let entry = &mut self.nodes[cur];
            entry.height += diff;
            node = entry.parent;
        }
    }

    /// Ids of lines `[from, to)`, clamped to the store.
    #[must_use]
    pub fn ids(&self, from: usize, to: usize) -> Vec<LineId> {
        let to = to.min(self.len());
        let mut out = Vec::with_capacity(to.saturating_sub(from));
        if from < to {
            self.collect(self.root, from, to - from, &mut out);
        }
        out
    }

    fn collect(&self, node: NodeId, at: usize, count: usize, out: &mut Vec<LineId>) {
        match &self.nodes[node].kind {
            NodeKind::Leaf(lines) => out.extend_from_slice(&lines[at..at + count]),
            NodeKind::Branch(children) => {
                let mut at = at;
                let mut count = count;
                for &child in children {
                    let size = self.nodes[child].size;
                    if at < size {
                        let used = count.min(size - at);
                        self.collect(child, at, used, out);
                        count -= used;
                        if count == 0 {
                            return;
                        }
                        at = 0;
                    } else {
                        at -= size;
                    }
                }
            }
        }
    }

    /// Visit lines `[from, to)` in order until `f` breaks.
    pub fn iterate<F>(&self, from: usize, to: usize, mut f: F)
    where
        F: FnMut(usize, LineId, &Line) -> ControlFlow<()>,
    {
        for (offset, id) in self.ids(from, to).into_iter().enumerate() {
            if f(from + offset, id, &self.lines[id]).is_break() {
                return;
            }
        }
    }

    /// Check the cached sizes, heights and parent links of every node.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.nodes[self.root].parent.is_none() && self.node_consistent(self.root)
    }

    fn node_consistent(&self, node: NodeId) -> bool {
        let entry = &self.nodes[node];
        let (size, height) = match &entry.kind {
            NodeKind::Leaf(lines) => {
                if lines
                    .iter()
                    .any(|&id| self.lines.get(id).and_then(|l| l.parent) != Some(node))
                {
                    return false;
                }
                let height: f64 = lines.iter().map(|&id| self.lines[id].height).sum();
                (lines.len(), height)
            }
            NodeKind::Branch(children) => {
                if children.len() > BRANCH_MAX
                    || children
                        .iter()
                        .any(|&c| self.nodes.get(c).and_then(|n| n.parent) != Some(node))
                    || !children.iter().all(|&c| self.node_consistent(c))
                {
                    return false;
                }
                let size = children.iter().map(|&c| self.nodes[c].size).sum();
                let height: f64 = children.iter().map(|&c| self.nodes[c].height).sum();
                (size, height)
            }
        };
        size == entry.size && (height - entry.height).abs() < 1e-6
    }

    /// Depth of the tree, counting the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut node = self.root;
        while let Some(&child) = self.nodes[node].children().first() {
            depth += 1;
            node = child;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<Line> {
        (0..n).map(|i| Line::new(format!("line {i}"), 1.0)).collect()
    }

    fn texts(store: &LineStore) -> Vec<String> {
        store
            .ids(0, store.len())
            .into_iter()
            .map(|id| store.line(id).map(|l| l.text.clone()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn small_store_is_one_leaf() {
        let store = LineStore::new(lines(10));
        assert_eq!(store.len(), 10);
        assert_eq!(store.depth(), 2);
        assert!(store.is_consistent());
        assert_eq!(store.height(), 10.0);
    }

    #[test]
    fn large_insert_splits_and_spills() {
        let store = LineStore::new(lines(2000));
        assert_eq!(store.len(), 2000);
        assert!(store.depth() > 2);
        assert!(store.is_consistent());
        assert_eq!(store.index_of(store.id_at(1234).unwrap()), Some(1234));
    }

    #[test]
    fn insert_in_middle_keeps_order() {
        let mut store = LineStore::new(lines(3));
        store.insert(1, vec![Line::new("new".to_string(), 1.0)]);
        assert_eq!(texts(&store), vec!["line 0", "new", "line 1", "line 2"]);
    }

    #[test]
    fn remove_returns_lines_and_collapses() {
        let mut store = LineStore::new(lines(300));
        let removed = store.remove(10, 280);
        assert_eq!(removed.len(), 280);
        assert_eq!(removed[0].text, "line 10");
        assert_eq!(store.len(), 20);
        assert_eq!(store.depth(), 2);
        assert!(store.is_consistent());
        assert_eq!(texts(&store)[10], "line 290");
    }

    #[test]
    fn heights_map_both_ways() {
        let mut store = LineStore::new(lines(120));
        let id = store.id_at(60).unwrap();
        store.set_height(id, 3.0);
        assert_eq!(store.height(), 122.0);
        assert_eq!(store.height_before(id), 60.0);
        assert_eq!(store.index_at_height(60.0), 60);
        assert_eq!(store.index_at_height(62.5), 60);
        assert_eq!(store.index_at_height(63.0), 61);
        assert_eq!(store.index_at_height(1e9), 120);
        assert!(store.is_consistent());
    }

    #[test]
    fn iterate_stops_on_break() {
        let store = LineStore::new(lines(100));
        let mut seen = Vec::new();
        store.iterate(40, 100, |n, _, _| {
            seen.push(n);
            if n == 44 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(seen, vec![40, 41, 42, 43, 44]);
    }

    #[test]
    fn out_of_range_lookups() {
        let store = LineStore::new(lines(5));
        assert_eq!(store.id_at(5), None);
        assert!(store.ids(3, 99).len() == 2);
    }
}
