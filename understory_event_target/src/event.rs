// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event records: what happened, where, and the per-dispatch propagation state.
//!
//! An [`Event`] is immutable once built. Everything that changes while an
//! event travels through the tree (current target, phase, stop and cancel
//! flags) lives in a fresh state value owned by a single
//! [`EventDispatcher::dispatch_event`](crate::dispatcher::EventDispatcher::dispatch_event)
//! call, so the same record can be dispatched again, or from inside one of its
//! own listeners, without any state leaking between calls.
//!
//! Custom events are ordinary events with a `detail` payload:
//!
//! ```
//! use understory_event_target::event::{Event, EventFlags, EventType};
//!
//! #[derive(Debug, PartialEq)]
//! struct Saved { id: u32 }
//!
//! let ev = Event::new("saved", 7_u32)
//!     .with_detail(Saved { id: 3 })
//!     .with_flags(EventFlags::BUBBLES);
//! assert_eq!(ev.ty(), &EventType::from("saved"));
//! assert_eq!(ev.detail(), Some(&Saved { id: 3 }));
//! assert!(ev.bubbles() && !ev.cancelable());
//! ```

use alloc::borrow::Cow;
use alloc::string::String;
use core::borrow::Borrow;
use core::fmt;

use crate::types::Phase;

/// Name of an event, such as `"click"` or an application-defined name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(Cow<'static, str>);

impl EventType {
    /// Primary button click.
    pub const CLICK: Self = Self::from_static("click");
    /// Double click.
    pub const DBLCLICK: Self = Self::from_static("dblclick");
    /// Pointer entered a node.
    pub const MOUSEOVER: Self = Self::from_static("mouseover");
    /// Pointer left a node.
    pub const MOUSEOUT: Self = Self::from_static("mouseout");
    /// Button pressed.
    pub const MOUSEDOWN: Self = Self::from_static("mousedown");
    /// Button released.
    pub const MOUSEUP: Self = Self::from_static("mouseup");
    /// Pointer moved.
    pub const MOUSEMOVE: Self = Self::from_static("mousemove");
    /// Context menu requested.
    pub const CONTEXTMENU: Self = Self::from_static("contextmenu");
    /// Key pressed.
    pub const KEYDOWN: Self = Self::from_static("keydown");
    /// Key released.
    pub const KEYUP: Self = Self::from_static("keyup");
    /// Value edited.
    pub const INPUT: Self = Self::from_static("input");
    /// Value committed.
    pub const CHANGE: Self = Self::from_static("change");
    /// Form submitted.
    pub const SUBMIT: Self = Self::from_static("submit");
    /// Node gained focus.
    pub const FOCUS: Self = Self::from_static("focus");
    /// Node lost focus.
    pub const BLUR: Self = Self::from_static("blur");
    /// Content finished loading.
    pub const LOAD: Self = Self::from_static("load");
    /// Viewport scrolled.
    pub const SCROLL: Self = Self::from_static("scroll");
    /// Viewport resized.
    pub const RESIZE: Self = Self::from_static("resize");

    /// Build an event type from a static name without allocating.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// The event name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for EventType {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&EventType> for EventType {
    fn from(ty: &EventType) -> Self {
        ty.clone()
    }
}

impl Borrow<str> for EventType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags::bitflags! {
    /// Behavior flags fixed when an event is created.
    ///
    /// The empty set is a non-bubbling, non-cancelable event.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EventFlags: u8 {
        /// Run the bubble phase after the target.
        const BUBBLES    = 0b0000_0001;
        /// Allow listeners to prevent the default action.
        const CANCELABLE = 0b0000_0010;
    }
}

/// One occurrence of an event, aimed at a target node.
///
/// `D` is the `detail` payload type; every listener on the path receives a
/// reference to the same payload value.
#[derive(Clone, Debug)]
pub struct Event<K, D = ()> {
    ty: EventType,
    target: K,
    detail: Option<D>,
    flags: EventFlags,
}

impl<K: Copy, D> Event<K, D> {
    /// Create a non-bubbling, non-cancelable event without detail.
    pub fn new(ty: impl Into<EventType>, target: K) -> Self {
        Self {
            ty: ty.into(),
            target,
            detail: None,
            flags: EventFlags::empty(),
        }
    }

    /// Attach a detail payload.
    pub fn with_detail(mut self, detail: D) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Replace the behavior flags.
    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The event name.
    pub fn ty(&self) -> &EventType {
        &self.ty
    }

    /// The node the event is aimed at.
    pub fn target(&self) -> K {
        self.target
    }

    /// The detail payload, if any.
    pub fn detail(&self) -> Option<&D> {
        self.detail.as_ref()
    }

    /// Behavior flags.
    pub fn flags(&self) -> EventFlags {
        self.flags
    }

    /// Whether the bubble phase runs.
    pub fn bubbles(&self) -> bool {
        self.flags.contains(EventFlags::BUBBLES)
    }

    /// Whether `prevent_default` has any effect.
    pub fn cancelable(&self) -> bool {
        self.flags.contains(EventFlags::CANCELABLE)
    }
}

/// Summary of one finished dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// A listener canceled the default action of a cancelable event.
    pub default_prevented: bool,
    /// A listener stopped propagation before the traversal finished.
    pub propagation_stopped: bool,
    /// Number of listener invocations.
    pub invoked: usize,
    /// Number of invocations that returned an error.
    pub failed: usize,
}

/// Transient fields scoped to one dispatch call.
#[derive(Clone, Debug)]
pub(crate) struct PropagationState<K> {
    pub(crate) current_target: K,
    pub(crate) phase: Phase,
    pub(crate) propagation_stopped: bool,
    pub(crate) immediate_propagation_stopped: bool,
    pub(crate) default_prevented: bool,
    pub(crate) invoked: usize,
    pub(crate) failed: usize,
}

impl<K: Copy> PropagationState<K> {
    pub(crate) fn new(target: K) -> Self {
        Self {
            current_target: target,
            phase: Phase::Capture,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
            default_prevented: false,
            invoked: 0,
            failed: 0,
        }
    }

    pub(crate) fn outcome(&self) -> DispatchOutcome {
        DispatchOutcome {
            default_prevented: self.default_prevented,
            propagation_stopped: self.propagation_stopped,
            invoked: self.invoked,
            failed: self.failed,
        }
    }
}
