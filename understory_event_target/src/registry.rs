// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listener registry: per node, per event type, ordered listener storage.
//!
//! ## Ordering
//!
//! Every registration draws a sequence number from a monotonically increasing
//! counter. Listeners for one `(node, type)` are kept in ascending sequence
//! order, which is the order they are invoked in.
//!
//! ## Identity
//!
//! A registration is identified by `(node, type, phase, HandlerId)`. The
//! handler id is an explicit token: either supplied by the caller
//! ([`HandlerId::explicit`]) or allocated by the registry
//! ([`ListenerRegistry::allocate_id`]). Registering an identity that is
//! already present changes nothing and returns the same handle.
//!
//! ## Snapshots
//!
//! Lookups return a [`Snapshot`]: a copy of the matching entries at the time
//! of the call. Mutating the registry afterwards (including from inside a
//! listener that is being invoked from that snapshot) does not change it.
//!
//! The registry is generic over the stored handler `H`, so it can be used and
//! tested without a dispatcher.
//!
//! ```
//! use understory_event_target::registry::{HandlerId, ListenerRegistry};
//! use understory_event_target::types::{ListenerOptions, ListenerPhase};
//!
//! let mut reg: ListenerRegistry<u32, &str> = ListenerRegistry::new();
//! let id = HandlerId::explicit(1);
//! reg.register(7, "click", ListenerPhase::Bubble, id, "a", ListenerOptions::empty());
//! reg.register(7, "click", ListenerPhase::Bubble, id, "b", ListenerOptions::empty());
//!
//! let snap = reg.listeners_for(&7, "click", ListenerPhase::Bubble);
//! assert_eq!(snap.len(), 1);
//! assert_eq!(*snap[0].handler(), "a");
//! ```

use alloc::rc::Rc;
use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::event::EventType;
use crate::types::{ListenerOptions, ListenerPhase};

/// Ordered copy of registry entries, as returned by lookups.
pub type Snapshot<H> = SmallVec<[Rc<ListenerEntry<H>>; 4]>;

type Bucket<H> = SmallVec<[Rc<ListenerEntry<H>>; 4]>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum Token {
    Explicit(u64),
    Allocated(u64),
}

/// Caller-visible identity of a handler, used to deduplicate and remove
/// registrations without comparing closures.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(Token);

impl HandlerId {
    /// A token chosen by the caller.
    ///
    /// Explicit ids never collide with ids from
    /// [`ListenerRegistry::allocate_id`].
    pub const fn explicit(id: u64) -> Self {
        Self(Token::Explicit(id))
    }
}

/// Handle naming one registration; pass it back to remove the listener.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle<K> {
    node: K,
    ty: EventType,
    phase: ListenerPhase,
    id: HandlerId,
}

impl<K: Copy> ListenerHandle<K> {
    /// Node the listener is attached to.
    pub fn node(&self) -> K {
        self.node
    }

    /// Event type the listener handles.
    pub fn ty(&self) -> &EventType {
        &self.ty
    }

    /// Phase the listener is registered for.
    pub fn phase(&self) -> ListenerPhase {
        self.phase
    }

    /// Handler identity.
    pub fn id(&self) -> HandlerId {
        self.id
    }
}

/// One registered listener.
pub struct ListenerEntry<H> {
    ty: EventType,
    phase: ListenerPhase,
    id: HandlerId,
    handler: H,
    options: ListenerOptions,
    sequence: u64,
}

impl<H> ListenerEntry<H> {
    /// Event type.
    pub fn ty(&self) -> &EventType {
        &self.ty
    }

    /// Registered phase.
    pub fn phase(&self) -> ListenerPhase {
        self.phase
    }

    /// Handler identity.
    pub fn handler_id(&self) -> HandlerId {
        self.id
    }

    /// The stored handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Registration options; `CAPTURE` always agrees with [`phase`](Self::phase).
    pub fn options(&self) -> ListenerOptions {
        self.options
    }

    /// Removed right before its first invocation.
    pub fn is_once(&self) -> bool {
        self.options.contains(ListenerOptions::ONCE)
    }

    /// `prevent_default` is ignored while this listener runs.
    pub fn is_passive(&self) -> bool {
        self.options.contains(ListenerOptions::PASSIVE)
    }

    /// Registration sequence number; lower runs first.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl<H> fmt::Debug for ListenerEntry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("ty", &self.ty)
            .field("phase", &self.phase)
            .field("id", &self.id)
            .field("options", &self.options)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Store of listeners keyed by node and event type.
pub struct ListenerRegistry<K, H> {
    nodes: HashMap<K, HashMap<EventType, Bucket<H>>>,
    next_sequence: u64,
    next_id: u64,
}

impl<K, H> fmt::Debug for ListenerRegistry<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners: usize = self
            .nodes
            .values()
            .flat_map(|types| types.values())
            .map(|bucket| bucket.len())
            .sum();
        f.debug_struct("ListenerRegistry")
            .field("nodes", &self.nodes.len())
            .field("listeners", &listeners)
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}

impl<K: Copy + Eq + Hash, H> Default for ListenerRegistry<K, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + Hash, H> ListenerRegistry<K, H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_sequence: 0,
            next_id: 0,
        }
    }

    /// Allocate a fresh handler id, distinct from every previous allocation
    /// and from all [`HandlerId::explicit`] ids.
    pub fn allocate_id(&mut self) -> HandlerId {
        let id = HandlerId(Token::Allocated(self.next_id));
        self.next_id += 1;
        id
    }

    /// Register `handler` for `(node, ty, phase, id)`.
    ///
    /// Re-registering an identity that is already present is a no-op: the
    /// original handler, options and sequence are kept. `phase` wins over the
    /// `CAPTURE` bit in `options`.
    pub fn register(
        &mut self,
        node: K,
        ty: impl Into<EventType>,
        phase: ListenerPhase,
        id: HandlerId,
        handler: H,
        options: ListenerOptions,
    ) -> ListenerHandle<K> {
        let ty = ty.into();
        let handle = ListenerHandle {
            node,
            ty: ty.clone(),
            phase,
            id,
        };
        let bucket = self
            .nodes
            .entry(node)
            .or_default()
            .entry(ty.clone())
            .or_default();
        if bucket.iter().any(|e| e.phase == phase && e.id == id) {
            return handle;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        bucket.push(Rc::new(ListenerEntry {
            ty,
            phase,
            id,
            handler,
            options: options.with_phase(phase),
            sequence,
        }));
        handle
    }

    /// Remove the registration named by `handle`.
    ///
    /// Returns `false` (and does nothing) if it is not present, for example
    /// after a `once` listener fired or its node was purged.
    pub fn unregister(&mut self, handle: &ListenerHandle<K>) -> bool {
        self.remove_where(&handle.node, handle.ty.as_str(), |e| {
            e.phase == handle.phase && e.id == handle.id
        })
    }

    /// Remove the exact entry `entry` registered on `node`.
    ///
    /// Returns `false` if it was already removed.
    pub fn remove_entry(&mut self, node: &K, entry: &ListenerEntry<H>) -> bool {
        let sequence = entry.sequence;
        self.remove_where(node, entry.ty.as_str(), |e| e.sequence == sequence)
    }

    fn remove_where(
        &mut self,
        node: &K,
        ty: &str,
        pred: impl Fn(&ListenerEntry<H>) -> bool,
    ) -> bool {
        let Some(types) = self.nodes.get_mut(node) else {
            return false;
        };
        let Some(bucket) = types.get_mut(ty) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|e| pred(&**e)) else {
            return false;
        };
        bucket.remove(pos);
        if bucket.is_empty() {
            types.remove(ty);
        }
        if types.is_empty() {
            self.nodes.remove(node);
        }
        true
    }

    /// Snapshot of listeners on `node` for `ty` registered for `phase`, in
    /// sequence order.
    pub fn listeners_for(&self, node: &K, ty: &str, phase: ListenerPhase) -> Snapshot<H> {
        self.bucket(node, ty)
            .map(|bucket| bucket.iter().filter(|e| e.phase == phase).cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every listener on `node` for `ty`, capture and bubble
    /// merged in sequence order. Used for the at-target step.
    pub fn listeners_at_target(&self, node: &K, ty: &str) -> Snapshot<H> {
        self.bucket(node, ty)
            .map(|bucket| bucket.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn bucket(&self, node: &K, ty: &str) -> Option<&Bucket<H>> {
        self.nodes.get(node).and_then(|types| types.get(ty))
    }

    /// Whether `node` has any listener for `ty`.
    pub fn has_listeners(&self, node: &K, ty: &str) -> bool {
        self.bucket(node, ty).is_some()
    }

    /// Remove every listener attached to `node`; returns how many were removed.
    pub fn purge_node(&mut self, node: &K) -> usize {
        self.nodes
            .remove(node)
            .map(|types| types.values().map(|b| b.len()).sum::<usize>())
            .unwrap_or(0)
    }

    /// Total number of registered listeners.
    pub fn len(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|types| types.values())
            .map(|bucket| bucket.len())
            .sum()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every listener. Sequence and id counters keep counting.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
