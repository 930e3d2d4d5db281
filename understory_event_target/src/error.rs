// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors surfaced by dispatch, and the sink for listener failures.
//!
//! Only precondition failures escape [`dispatch`](crate::dispatcher::EventDispatcher::dispatch):
//! an unknown target or a malformed ancestor chain, both reported before any
//! listener runs. A listener that fails returns `Err` from its callback; the
//! dispatcher hands that error to an [`ErrorSink`] and moves on to the next
//! listener.

use alloc::boxed::Box;

use crate::event::EventType;

/// Type-erased error returned by a failing listener.
pub type BoxError = Box<dyn core::error::Error + 'static>;

/// Return type of listener callbacks.
pub type ListenerResult = Result<(), BoxError>;

/// A dispatch that was rejected before any listener ran.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError<K> {
    /// The tree does not contain the target (for example a stale handle).
    #[error("dispatch target {target:?} is not part of the tree")]
    UnknownTarget {
        /// The rejected target.
        target: K,
    },
    /// The ancestor chain of the target loops back onto itself.
    #[error("ancestor chain of {target:?} revisits {node:?}")]
    Cycle {
        /// The dispatch target.
        target: K,
        /// The first node seen twice.
        node: K,
    },
    /// The ancestor chain of the target is longer than the configured bound.
    #[error("ancestor chain of {target:?} exceeds {max_depth} nodes")]
    Unterminated {
        /// The dispatch target.
        target: K,
        /// Bound from [`DispatchConfig`](crate::dispatcher::DispatchConfig).
        max_depth: usize,
    },
}

impl<K> DispatchError<K> {
    /// Whether the tree reported a malformed ancestry.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Cycle { .. } | Self::Unterminated { .. })
    }
}

/// Receiver for listener failures caught during dispatch.
pub trait ErrorSink<K> {
    /// Called once per failed listener invocation, on the dispatching thread,
    /// after the listener returned.
    fn report_listener_error(&self, node: &K, ty: &EventType, error: BoxError);
}

impl<K, F> ErrorSink<K> for F
where
    F: Fn(&K, &EventType, BoxError),
{
    fn report_listener_error(&self, node: &K, ty: &EventType, error: BoxError) {
        self(node, ty, error);
    }
}
