// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The view of an in-flight event handed to each listener.
//!
//! An [`EventContext`] borrows the immutable [`Event`] and the propagation
//! state of exactly one dispatch call. Propagation control
//! ([`stop_propagation`](EventContext::stop_propagation),
//! [`stop_immediate_propagation`](EventContext::stop_immediate_propagation),
//! [`prevent_default`](EventContext::prevent_default)) only ever affects that
//! call. A listener that dispatches another event through
//! [`dispatcher`](EventContext::dispatcher) gets a separate context with its
//! own state.

use core::fmt;

use crate::dispatcher::EventDispatcher;
use crate::event::{Event, EventType, PropagationState};
use crate::types::Phase;

/// Listener-facing view of one step of a dispatch.
pub struct EventContext<'a, K, D, P> {
    pub(crate) dispatcher: &'a EventDispatcher<K, D, P>,
    pub(crate) event: &'a Event<K, D>,
    pub(crate) state: &'a mut PropagationState<K>,
    pub(crate) path: &'a [K],
    pub(crate) passive: bool,
}

impl<K: Copy + fmt::Debug, D, P> fmt::Debug for EventContext<'_, K, D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("ty", self.event.ty())
            .field("current_target", &self.state.current_target)
            .field("phase", &self.state.phase)
            .field("passive", &self.passive)
            .finish_non_exhaustive()
    }
}

impl<'a, K: Copy, D, P> EventContext<'a, K, D, P> {
    /// The event name.
    pub fn ty(&self) -> &'a EventType {
        self.event.ty()
    }

    /// The node the event was dispatched at.
    pub fn target(&self) -> K {
        self.event.target()
    }

    /// The node whose listener is running.
    ///
    /// Equal to [`target`](Self::target) only during [`Phase::Target`].
    pub fn current_target(&self) -> K {
        self.state.current_target
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// The detail payload; the same value for every listener of the dispatch.
    pub fn detail(&self) -> Option<&'a D> {
        self.event.detail()
    }

    /// The dispatched event record.
    pub fn event(&self) -> &'a Event<K, D> {
        self.event
    }

    /// Root→target path of this dispatch.
    pub fn composed_path(&self) -> &'a [K] {
        self.path
    }

    /// Whether the running listener was registered as passive.
    pub fn is_passive(&self) -> bool {
        self.passive
    }

    /// The dispatcher running this event.
    ///
    /// Use it to register or remove listeners, or to dispatch another event
    /// synchronously from inside a listener.
    pub fn dispatcher(&self) -> &'a EventDispatcher<K, D, P> {
        self.dispatcher
    }

    /// Finish the listeners on the current node, then stop.
    pub fn stop_propagation(&mut self) {
        self.state.propagation_stopped = true;
    }

    /// Stop right after the running listener; no other listener runs.
    pub fn stop_immediate_propagation(&mut self) {
        self.state.propagation_stopped = true;
        self.state.immediate_propagation_stopped = true;
    }

    /// Whether propagation has been stopped.
    pub fn is_propagation_stopped(&self) -> bool {
        self.state.propagation_stopped
    }

    /// Whether the default action has been prevented.
    pub fn default_prevented(&self) -> bool {
        self.state.default_prevented
    }
}

impl<K: Copy + fmt::Debug, D, P> EventContext<'_, K, D, P> {
    /// Cancel the default action.
    ///
    /// Ignored for events that are not cancelable, and from passive
    /// listeners. Returns whether the call had an effect.
    pub fn prevent_default(&mut self) -> bool {
        if self.passive {
            tracing::warn!(
                ty = %self.event.ty(),
                current_target = ?self.state.current_target,
                "prevent_default ignored inside a passive listener"
            );
            return false;
        }
        if !self.event.cancelable() {
            tracing::debug!(
                ty = %self.event.ty(),
                "prevent_default ignored for a non-cancelable event"
            );
            return false;
        }
        self.state.default_prevented = true;
        true
    }
}
