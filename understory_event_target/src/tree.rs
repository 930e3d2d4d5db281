// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small generational node arena that can serve as the dispatch tree.
//!
//! Hosts with their own widget or document tree implement
//! [`ParentLookup`] for it directly. [`Tree`] is for everyone else: it only
//! tracks structure (parent and ordered children), and stale [`NodeId`]s are
//! detected through per-slot generations, so a handle to a removed node is
//! rejected by dispatch instead of silently reaching a recycled slot.
//!
//! ## Example
//!
//! ```
//! use understory_event_target::dispatcher::EventDispatcher;
//! use understory_event_target::event::EventFlags;
//! use understory_event_target::tree::{NodeId, Tree};
//! use understory_event_target::types::ListenerOptions;
//!
//! let mut dispatcher: EventDispatcher<NodeId, (), Tree> = EventDispatcher::new();
//! let root = dispatcher.tree_mut().insert(None);
//! let button = dispatcher.tree_mut().insert(Some(root));
//! dispatcher.add_event_listener(button, "click", ListenerOptions::empty(), |_| Ok(()));
//!
//! let removed = dispatcher.remove_subtree(button);
//! assert_eq!(removed, [button]);
//! assert_eq!(dispatcher.listener_count(), 0);
//! assert!(dispatcher.dispatch(button, "click", None, EventFlags::BUBBLES).is_err());
//! ```

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::dispatcher::EventDispatcher;
use crate::types::ParentLookup;

/// Identifier for a node in a [`Tree`] (slot index plus generation).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(u32, u32);

impl NodeId {
    const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Parent/children arena with generational ids.
#[derive(Clone, Default)]
pub struct Tree {
    /// slots
    nodes: Vec<Option<Slot>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("nodes_total", &self.nodes.len())
            .field("nodes_alive", &self.len())
            .field("free_list", &self.free_list.len())
            .finish()
    }
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node as the last child of `parent`, or as a root if `None`.
    ///
    /// A stale `parent` is ignored and the node becomes a root.
    pub fn insert(&mut self, parent: Option<NodeId>) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].wrapping_add(1);
            self.generations[idx] = generation;
            (idx, generation)
        } else {
            self.nodes.push(None);
            self.generations.push(1);
            (self.nodes.len() - 1, 1)
        };
        self.nodes[idx] = Some(Slot {
            generation,
            parent: None,
            children: Vec::new(),
        });
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeId uses 32-bit indices by design."
        )]
        let id = NodeId::new(idx as u32, generation);
        if let Some(p) = parent.filter(|p| self.is_alive(*p)) {
            self.link(id, p);
        }
        id
    }

    /// Remove `id` and its whole subtree.
    ///
    /// Returns the removed ids, `id` first; empty if `id` was stale.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.is_alive(id) {
            return Vec::new();
        }
        self.unlink(id);
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(slot) = self.nodes[cur.idx()].take() {
                stack.extend(slot.children.iter().rev().copied());
                self.free_list.push(cur.idx());
                removed.push(cur);
            }
        }
        removed
    }

    /// Move `id` under `new_parent` (or make it a root).
    ///
    /// Returns `false`, leaving the tree unchanged, if either id is stale or
    /// if `new_parent` lies inside the subtree of `id`.
    pub fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        if let Some(p) = new_parent
            && (!self.is_alive(p) || self.is_ancestor_or_self(id, p))
        {
            return false;
        }
        self.unlink(id);
        if let Some(p) = new_parent {
            self.link(id, p);
        }
        true
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    /// Returns the parent of a node if live, or `None` for roots or stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).and_then(|s| s.parent)
    }

    /// Get the children of a node, or empty slice if node is stale.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        match self.slot(id) {
            Some(s) => &s.children,
            None => &[],
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Whether the tree has no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.nodes
            .get(id.idx())?
            .as_ref()
            .filter(|s| s.generation == id.1)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        self.nodes
            .get_mut(id.idx())?
            .as_mut()
            .filter(|s| s.generation == id.1)
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parent_of(node) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    fn link(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.slot_mut(parent) {
            p.children.push(id);
        }
        if let Some(n) = self.slot_mut(id) {
            n.parent = Some(parent);
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(parent) = self.slot_mut(id).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.slot_mut(parent) {
            p.children.retain(|c| *c != id);
        }
    }
}

impl ParentLookup<NodeId> for Tree {
    fn parent_of(&self, node: &NodeId) -> Option<NodeId> {
        Self::parent_of(self, *node)
    }

    fn contains(&self, node: &NodeId) -> bool {
        self.is_alive(*node)
    }
}

impl<D> EventDispatcher<NodeId, D, Tree> {
    /// Remove `id` and its subtree from the tree and drop every listener
    /// attached to the removed nodes.
    ///
    /// Returns the removed ids; empty if `id` was stale.
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        let removed = self.tree_mut().remove(id);
        let listeners = self.purge_nodes(removed.iter().copied());
        tracing::debug!(node = ?id, nodes = removed.len(), listeners, "removed subtree");
        removed
    }
}
