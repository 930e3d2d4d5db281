// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Event Target: deterministic, `no_std` event listeners and dispatch for UI trees.
//!
//! ## Overview
//!
//! This crate owns the listener side of event handling.
//! Nodes of any tree get listeners per event type, and [`EventDispatcher`] runs them over the classic capture → target → bubble walk.
//! It does not own the tree: implement [`ParentLookup`] for your node store, or use the bundled generational [`Tree`](tree::Tree).
//!
//! ## Listeners
//!
//! Register with [`EventDispatcher::add_event_listener`] and a set of [`ListenerOptions`]:
//!
//! - `CAPTURE`: run while the event travels down, instead of while it bubbles up.
//! - `ONCE`: remove the listener right before its first invocation.
//! - `PASSIVE`: the listener may not cancel the default action.
//!
//! Listeners are identified by `(node, type, phase, handler id)`.
//! Registering the same identity twice is a no-op; use
//! [`add_event_listener_with_id`](EventDispatcher::add_event_listener_with_id) to supply the id yourself.
//! Each registration returns a [`ListenerHandle`] for [`remove_event_listener`](EventDispatcher::remove_event_listener).
//!
//! ## Dispatch
//!
//! [`EventDispatcher::dispatch`] computes the root→target path once, before any listener runs.
//! A target the tree does not know, or an ancestor chain that loops or never ends, is rejected with a [`DispatchError`].
//! Then:
//!
//! 1) Capture: strict ancestors, root first, capture listeners only.
//! 2) Target: every listener on the target, in registration order, whatever phase it was registered for.
//! 3) Bubble: strict ancestors, parent first, bubble listeners only, and only if the event bubbles.
//!
//! Listeners steer the walk through their [`EventContext`]:
//! `stop_propagation` finishes the current node and stops,
//! `stop_immediate_propagation` stops after the running listener,
//! and `prevent_default` cancels the default action of cancelable events.
//! The result is a [`DispatchOutcome`].
//!
//! A listener that returns `Err` is reported to the installed [`ErrorSink`] (or logged through `tracing`) and the walk continues.
//!
//! ## Reentrancy
//!
//! Every dispatcher method takes `&self`, so listeners can add and remove listeners, or dispatch new events, while a dispatch is running.
//! Each node's listeners are snapshotted when the walk reaches that node; changes made by a listener show up from the next node or dispatch on.
//! Nested dispatches have their own propagation state.
//!
//! ## Delegation
//!
//! [`EventDispatcher::delegate`] puts one bubble listener on an ancestor and forwards events to the nearest descendant accepted by a predicate.
//! See the [`delegate`] module.
//!
//! ## Example
//!
//! ```
//! use core::cell::Cell;
//! use std::rc::Rc;
//!
//! use understory_event_target::{EventDispatcher, EventFlags, EventType, ListenerOptions};
//! use understory_event_target::tree::{NodeId, Tree};
//!
//! #[derive(Debug)]
//! struct Message(&'static str);
//!
//! let mut d: EventDispatcher<NodeId, Message, Tree> = EventDispatcher::new();
//! let form = d.tree_mut().insert(None);
//! let button = d.tree_mut().insert(Some(form));
//!
//! let received = Rc::new(Cell::new(false));
//! let flag = received.clone();
//! d.add_event_listener(form, "customAction", ListenerOptions::empty(), move |ctx| {
//!     flag.set(ctx.detail().is_some_and(|m| m.0 == "hello"));
//!     Ok(())
//! });
//! d.add_event_listener(button, EventType::CLICK, ListenerOptions::ONCE, |ctx| {
//!     let target = ctx.target();
//!     ctx.dispatcher()
//!         .dispatch(target, "customAction", Some(Message("hello")), EventFlags::BUBBLES)?;
//!     Ok(())
//! });
//!
//! let outcome = d.dispatch(button, EventType::CLICK, None, EventFlags::BUBBLES).unwrap();
//! assert_eq!(outcome.invoked, 1);
//! assert!(received.get());
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod context;
pub mod delegate;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod path;
pub mod registry;
pub mod tree;
pub mod types;

pub use context::EventContext;
pub use dispatcher::{DispatchConfig, EventDispatcher, Handler};
pub use error::{BoxError, DispatchError, ErrorSink, ListenerResult};
pub use event::{DispatchOutcome, Event, EventFlags, EventType};
pub use registry::{HandlerId, ListenerHandle};
pub use types::{ListenerOptions, ListenerPhase, ParentLookup, Phase};
