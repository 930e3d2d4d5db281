// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared types: dispatch phases, listener options, and the tree seam.

/// Phase of a dispatch step, as observed by a listener.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Walking root → target, visiting strict ancestors of the target.
    Capture,
    /// Visiting the target itself.
    Target,
    /// Walking target → root, visiting strict ancestors of the target.
    Bubble,
}

/// Phase a listener is registered for.
///
/// Capture and bubble registrations are independent entries, even when they
/// share a [`HandlerId`](crate::registry::HandlerId). At the target node both
/// kinds run in a single pass ordered by registration sequence.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ListenerPhase {
    /// Runs while the event travels down toward the target.
    Capture,
    /// Runs while the event travels back up from the target.
    #[default]
    Bubble,
}

bitflags::bitflags! {
    /// Options supplied when registering a listener.
    ///
    /// The empty set is a bubble-phase, persistent, non-passive listener.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ListenerOptions: u8 {
        /// Register for the capture phase instead of the bubble phase.
        const CAPTURE = 0b0000_0001;
        /// Remove the listener right before its first invocation.
        const ONCE    = 0b0000_0010;
        /// The listener promises not to cancel; `prevent_default` is ignored.
        const PASSIVE = 0b0000_0100;
    }
}

impl ListenerOptions {
    /// Phase selected by the [`CAPTURE`](Self::CAPTURE) flag.
    pub fn phase(self) -> ListenerPhase {
        if self.contains(Self::CAPTURE) {
            ListenerPhase::Capture
        } else {
            ListenerPhase::Bubble
        }
    }

    /// Options equivalent to `self` registered for `phase`.
    pub fn with_phase(self, phase: ListenerPhase) -> Self {
        match phase {
            ListenerPhase::Capture => self | Self::CAPTURE,
            ListenerPhase::Bubble => self - Self::CAPTURE,
        }
    }
}

/// Parent lookup provider used to build root→target propagation paths.
///
/// This is the only thing the engine needs from the tree that owns the
/// nodes: stable identities (`K`) and a way to walk upward. A structural
/// fault in the reported ancestry (a cycle, or a chain that never ends) is
/// detected at dispatch time and surfaced as a
/// [`DispatchError`](crate::error::DispatchError).
pub trait ParentLookup<K> {
    /// Return the parent of `node`, or `None` at a root.
    fn parent_of(&self, node: &K) -> Option<K>;

    /// Whether `node` is currently part of the tree.
    ///
    /// Dispatching at a node that is not contained fails with
    /// [`DispatchError::UnknownTarget`](crate::error::DispatchError::UnknownTarget).
    /// The default accepts every node.
    fn contains(&self, node: &K) -> bool {
        let _ = node;
        true
    }
}

/// Parent lookup for flat hierarchies: every node is its own root.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoParent;

impl<K> ParentLookup<K> for NoParent {
    fn parent_of(&self, _: &K) -> Option<K> {
        None
    }
}
