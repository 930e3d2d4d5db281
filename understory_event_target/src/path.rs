// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Propagation paths: the root→target chain a dispatch walks.
//!
//! The path is computed once per dispatch, before any listener runs, by
//! following [`ParentLookup::parent_of`] from the target up to a root. The
//! walk refuses ancestries that revisit a node or that exceed a depth bound,
//! so a faulty tree can never send the dispatcher into an endless loop.

use core::fmt::Debug;
use core::hash::Hash;

use hashbrown::HashSet;
use smallvec::SmallVec;

use crate::error::DispatchError;
use crate::types::ParentLookup;

/// Inline capacity for paths; deeper trees spill to the heap.
const INLINE_DEPTH: usize = 16;

/// Root→target node chain for one dispatch (both endpoints included).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropagationPath<K> {
    nodes: SmallVec<[K; INLINE_DEPTH]>,
    target: K,
}

impl<K: Copy + Eq + Hash + Debug> PropagationPath<K> {
    /// Walk from `target` to its root through `tree`.
    ///
    /// Fails with [`DispatchError::UnknownTarget`] if `tree` does not contain
    /// the target, [`DispatchError::Cycle`] if a node is its own ancestor, and
    /// [`DispatchError::Unterminated`] if more than `max_depth` nodes are
    /// visited.
    pub fn build(
        target: K,
        tree: &impl ParentLookup<K>,
        max_depth: usize,
    ) -> Result<Self, DispatchError<K>> {
        if !tree.contains(&target) {
            return Err(DispatchError::UnknownTarget { target });
        }
        let mut nodes: SmallVec<[K; INLINE_DEPTH]> = SmallVec::new();
        let mut seen: HashSet<K> = HashSet::new();
        let mut cur = target;
        loop {
            if !seen.insert(cur) {
                return Err(DispatchError::Cycle { target, node: cur });
            }
            if nodes.len() == max_depth {
                return Err(DispatchError::Unterminated { target, max_depth });
            }
            nodes.push(cur);
            match tree.parent_of(&cur) {
                Some(p) => cur = p,
                None => break,
            }
        }
        nodes.reverse();
        Ok(Self { nodes, target })
    }
}

impl<K: Copy> PropagationPath<K> {
    /// The dispatch target (last node of the path).
    pub fn target(&self) -> K {
        self.target
    }

    /// Strict ancestors of the target, root first.
    pub fn ancestors(&self) -> &[K] {
        &self.nodes[..self.nodes.len() - 1]
    }

    /// The whole path, root first, target last.
    pub fn as_slice(&self) -> &[K] {
        &self.nodes
    }

    /// Number of nodes on the path; at least one.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a path holds at least its target.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
