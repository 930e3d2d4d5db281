// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dispatcher: run registered listeners over a capture → target → bubble walk.
//!
//! ## Semantics
//!
//! For a dispatch at `target` with root→target path `[root, …, parent, target]`:
//!
//! - Capture: for each strict ancestor, root first, run its capture listeners.
//! - Target: run every listener on `target` (capture and bubble registrations
//!   merged) in registration order.
//! - Bubble: only for events with [`EventFlags::BUBBLES`]; for each strict
//!   ancestor, parent first, run its bubble listeners.
//!
//! Listeners for one node are read from the registry as a snapshot just
//! before that node is visited. A `once` listener is removed from the
//! registry right before it runs.
//!
//! - [`EventContext::stop_propagation`] lets the remaining listeners on the
//!   current node run, then ends the dispatch.
//! - [`EventContext::stop_immediate_propagation`] ends the dispatch right
//!   after the running listener.
//! - A listener returning `Err` is reported to the [`ErrorSink`] (or logged)
//!   and the walk continues with the next listener.
//!
//! ## Reentrancy
//!
//! All methods take `&self`. Listeners can register and remove listeners, and
//! dispatch further events, through [`EventContext::dispatcher`]. Each
//! dispatch call owns its path and propagation state; a nested dispatch never
//! sees or changes the flags of the dispatch that triggered it.
//!
//! ## Example
//!
//! ```
//! use core::cell::RefCell;
//! use std::rc::Rc;
//!
//! use understory_event_target::dispatcher::EventDispatcher;
//! use understory_event_target::event::{EventFlags, EventType};
//! use understory_event_target::types::{ListenerOptions, ParentLookup};
//!
//! #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
//! struct Node(u32);
//!
//! // 3 → 2 → 1 (root)
//! #[derive(Default)]
//! struct Parents;
//! impl ParentLookup<Node> for Parents {
//!     fn parent_of(&self, node: &Node) -> Option<Node> {
//!         (node.0 > 1).then(|| Node(node.0 - 1))
//!     }
//! }
//!
//! let dispatcher: EventDispatcher<Node, (), Parents> = EventDispatcher::new();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let log = seen.clone();
//! dispatcher.add_event_listener(Node(1), EventType::CLICK, ListenerOptions::CAPTURE, move |ctx| {
//!     log.borrow_mut().push(("capture", ctx.current_target().0));
//!     Ok(())
//! });
//! let log = seen.clone();
//! dispatcher.add_event_listener(Node(3), EventType::CLICK, ListenerOptions::empty(), move |ctx| {
//!     log.borrow_mut().push(("target", ctx.current_target().0));
//!     ctx.prevent_default();
//!     Ok(())
//! });
//! let log = seen.clone();
//! dispatcher.add_event_listener(Node(2), EventType::CLICK, ListenerOptions::empty(), move |ctx| {
//!     log.borrow_mut().push(("bubble", ctx.current_target().0));
//!     Ok(())
//! });
//!
//! let outcome = dispatcher
//!     .dispatch(Node(3), EventType::CLICK, None, EventFlags::BUBBLES | EventFlags::CANCELABLE)
//!     .unwrap();
//! assert!(outcome.default_prevented);
//! assert_eq!(*seen.borrow(), [("capture", 1), ("target", 3), ("bubble", 2)]);
//! ```

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt::{self, Debug};
use core::hash::Hash;

use crate::context::EventContext;
use crate::error::{BoxError, DispatchError, ErrorSink, ListenerResult};
use crate::event::{DispatchOutcome, Event, EventFlags, EventType, PropagationState};
use crate::path::PropagationPath;
use crate::registry::{HandlerId, ListenerHandle, ListenerRegistry, Snapshot};
use crate::types::{ListenerOptions, ListenerPhase, NoParent, ParentLookup, Phase};

/// Listener callback as stored by the dispatcher.
pub type Handler<K, D, P> = Rc<dyn Fn(&mut EventContext<'_, K, D, P>) -> ListenerResult>;

/// Dispatcher settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Longest accepted root→target path, target included. Longer ancestor
    /// chains are rejected with [`DispatchError::Unterminated`].
    pub max_path_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_path_depth: 4096,
        }
    }
}

/// Listener registry plus the dispatch algorithm, bound to one tree.
///
/// - `K`: node key; small, copyable, hashable.
/// - `D`: detail payload type of dispatched events.
/// - `P`: the tree, seen through [`ParentLookup`].
pub struct EventDispatcher<K, D = (), P = NoParent> {
    tree: P,
    registry: RefCell<ListenerRegistry<K, Handler<K, D, P>>>,
    sink: Option<Box<dyn ErrorSink<K>>>,
    config: DispatchConfig,
    nesting: Cell<usize>,
}

impl<K: Copy + Eq + Hash, D, P> Debug for EventDispatcher<K, D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.registry.borrow().len())
            .field("has_sink", &self.sink.is_some())
            .field("config", &self.config)
            .field("nesting", &self.nesting.get())
            .finish_non_exhaustive()
    }
}

impl<K, D, P> Default for EventDispatcher<K, D, P>
where
    K: Copy + Eq + Hash + Debug,
    P: ParentLookup<K> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, D, P> EventDispatcher<K, D, P>
where
    K: Copy + Eq + Hash + Debug,
    P: ParentLookup<K> + Default,
{
    /// Create a dispatcher over a default-constructed tree.
    pub fn new() -> Self {
        Self::with_tree(P::default())
    }
}

impl<K, D, P> EventDispatcher<K, D, P>
where
    K: Copy + Eq + Hash + Debug,
    P: ParentLookup<K>,
{
    /// Create a dispatcher over `tree` with default settings.
    pub fn with_tree(tree: P) -> Self {
        Self::with_config(tree, DispatchConfig::default())
    }

    /// Create a dispatcher over `tree` with explicit settings.
    pub fn with_config(tree: P, config: DispatchConfig) -> Self {
        Self {
            tree,
            registry: RefCell::new(ListenerRegistry::new()),
            sink: None,
            config,
            nesting: Cell::new(0),
        }
    }

    /// Route listener failures to `sink` instead of the log.
    pub fn set_error_sink(&mut self, sink: impl ErrorSink<K> + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// Go back to logging listener failures.
    pub fn clear_error_sink(&mut self) {
        self.sink = None;
    }

    /// The tree.
    pub fn tree(&self) -> &P {
        &self.tree
    }

    /// Mutable access to the tree, outside of any dispatch.
    pub fn tree_mut(&mut self) -> &mut P {
        &mut self.tree
    }

    /// Current settings.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Number of dispatch calls currently running on this dispatcher.
    ///
    /// Zero outside of dispatch, one inside a listener, more inside nested
    /// dispatches.
    pub fn nesting_depth(&self) -> usize {
        self.nesting.get()
    }

    /// Register `handler` on `node` for `ty`.
    ///
    /// Each call gets a fresh [`HandlerId`], so registering the same closure
    /// twice yields two listeners. Use
    /// [`add_event_listener_with_id`](Self::add_event_listener_with_id) to
    /// deduplicate.
    pub fn add_event_listener<F>(
        &self,
        node: K,
        ty: impl Into<EventType>,
        options: ListenerOptions,
        handler: F,
    ) -> ListenerHandle<K>
    where
        F: Fn(&mut EventContext<'_, K, D, P>) -> ListenerResult + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.allocate_id();
        registry.register(node, ty, options.phase(), id, Rc::new(handler), options)
    }

    /// Register `handler` under a caller-chosen identity.
    ///
    /// If `(node, ty, phase, id)` is already registered, nothing changes and
    /// the existing registration's handle is returned.
    pub fn add_event_listener_with_id<F>(
        &self,
        node: K,
        ty: impl Into<EventType>,
        id: HandlerId,
        options: ListenerOptions,
        handler: F,
    ) -> ListenerHandle<K>
    where
        F: Fn(&mut EventContext<'_, K, D, P>) -> ListenerResult + 'static,
    {
        self.registry
            .borrow_mut()
            .register(node, ty, options.phase(), id, Rc::new(handler), options)
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn remove_event_listener(&self, handle: &ListenerHandle<K>) -> bool {
        self.registry.borrow_mut().unregister(handle)
    }

    /// Drop every listener attached to `node`, for example when the node is
    /// torn down. Returns how many were removed.
    pub fn purge_node(&self, node: &K) -> usize {
        let removed = self.registry.borrow_mut().purge_node(node);
        if removed > 0 {
            tracing::debug!(node = ?node, removed, "purged listeners");
        }
        removed
    }

    /// [`purge_node`](Self::purge_node) for several nodes.
    pub fn purge_nodes(&self, nodes: impl IntoIterator<Item = K>) -> usize {
        nodes.into_iter().map(|n| self.purge_node(&n)).sum()
    }

    /// Whether `node` has any listener for `ty`.
    pub fn has_listeners(&self, node: &K, ty: &str) -> bool {
        self.registry.borrow().has_listeners(node, ty)
    }

    /// Total number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Build an event and dispatch it at `target`.
    pub fn dispatch(
        &self,
        target: K,
        ty: impl Into<EventType>,
        detail: Option<D>,
        flags: EventFlags,
    ) -> Result<DispatchOutcome, DispatchError<K>> {
        let mut event = Event::new(ty, target).with_flags(flags);
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        self.dispatch_event(&event)
    }

    /// Dispatch `event` at its target.
    ///
    /// Fails without running any listener if the target is not in the tree
    /// or its ancestry is malformed. Listener failures never fail the
    /// dispatch; they are counted in [`DispatchOutcome::failed`].
    pub fn dispatch_event(&self, event: &Event<K, D>) -> Result<DispatchOutcome, DispatchError<K>> {
        let path =
            PropagationPath::build(event.target(), &self.tree, self.config.max_path_depth)
                .inspect_err(|err| tracing::debug!(error = %err, "dispatch rejected"))?;

        let _span = tracing::trace_span!(
            "dispatch",
            ty = %event.ty(),
            target = ?event.target(),
            depth = self.nesting.get()
        )
        .entered();
        let _nesting = Nesting::enter(&self.nesting);

        let mut state = PropagationState::new(event.target());
        self.propagate(event, &path, &mut state);
        let outcome = state.outcome();
        tracing::debug!(
            ty = %event.ty(),
            target = ?event.target(),
            invoked = outcome.invoked,
            failed = outcome.failed,
            default_prevented = outcome.default_prevented,
            propagation_stopped = outcome.propagation_stopped,
            "dispatch finished"
        );
        Ok(outcome)
    }

    fn propagate(
        &self,
        event: &Event<K, D>,
        path: &PropagationPath<K>,
        state: &mut PropagationState<K>,
    ) {
        let ty = event.ty().as_str();

        state.phase = Phase::Capture;
        for &node in path.ancestors() {
            let listeners = self
                .registry
                .borrow()
                .listeners_for(&node, ty, ListenerPhase::Capture);
            self.invoke(node, &listeners, event, path, state);
            if state.propagation_stopped {
                return;
            }
        }

        state.phase = Phase::Target;
        let target = path.target();
        let listeners = self.registry.borrow().listeners_at_target(&target, ty);
        self.invoke(target, &listeners, event, path, state);
        if state.propagation_stopped || !event.bubbles() {
            return;
        }

        state.phase = Phase::Bubble;
        for &node in path.ancestors().iter().rev() {
            let listeners = self
                .registry
                .borrow()
                .listeners_for(&node, ty, ListenerPhase::Bubble);
            self.invoke(node, &listeners, event, path, state);
            if state.propagation_stopped {
                return;
            }
        }
    }

    fn invoke(
        &self,
        node: K,
        listeners: &Snapshot<Handler<K, D, P>>,
        event: &Event<K, D>,
        path: &PropagationPath<K>,
        state: &mut PropagationState<K>,
    ) {
        state.current_target = node;
        for entry in listeners {
            // A once listener may already have fired from a nested dispatch
            // that read a newer snapshot.
            if entry.is_once() && !self.registry.borrow_mut().remove_entry(&node, entry) {
                continue;
            }
            tracing::trace!(
                current_target = ?node,
                phase = ?state.phase,
                sequence = entry.sequence(),
                "invoking listener"
            );
            state.invoked += 1;
            let result = {
                let mut ctx = EventContext {
                    dispatcher: self,
                    event,
                    state: &mut *state,
                    path: path.as_slice(),
                    passive: entry.is_passive(),
                };
                (**entry.handler())(&mut ctx)
            };
            if let Err(error) = result {
                state.failed += 1;
                self.report(node, event.ty(), error);
            }
            if state.immediate_propagation_stopped {
                break;
            }
        }
    }

    fn report(&self, node: K, ty: &EventType, error: BoxError) {
        match &self.sink {
            Some(sink) => sink.report_listener_error(&node, ty, error),
            None => tracing::warn!(%ty, node = ?node, %error, "listener failed"),
        }
    }
}

/// Counts in-flight dispatches; restores the count when dropped.
struct Nesting<'a>(&'a Cell<usize>);

impl<'a> Nesting<'a> {
    fn enter(count: &'a Cell<usize>) -> Self {
        count.set(count.get() + 1);
        Self(count)
    }
}

impl Drop for Nesting<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::{String, ToString};
    use alloc::vec;
    use alloc::vec::Vec;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    struct Node(u32);

    const ROOT: Node = Node(1);
    const A: Node = Node(2);
    const B: Node = Node(3);
    const C: Node = Node(4);

    // C → B → A → ROOT
    #[derive(Default)]
    struct Chain;
    impl ParentLookup<Node> for Chain {
        fn parent_of(&self, node: &Node) -> Option<Node> {
            (node.0 > 1).then(|| Node(node.0 - 1))
        }
        fn contains(&self, node: &Node) -> bool {
            (1..=4).contains(&node.0)
        }
    }

    type Dispatcher<D = ()> = EventDispatcher<Node, D, Chain>;
    type Log = Rc<RefCell<Vec<&'static str>>>;

    const BUBBLING: EventFlags = EventFlags::BUBBLES;
    const ALL: EventFlags = EventFlags::BUBBLES.union(EventFlags::CANCELABLE);

    fn recorder<D: 'static>(
        log: &Log,
        name: &'static str,
    ) -> impl Fn(&mut EventContext<'_, Node, D, Chain>) -> ListenerResult + 'static {
        let log = log.clone();
        move |_| {
            log.borrow_mut().push(name);
            Ok(())
        }
    }

    fn listen(d: &Dispatcher, node: Node, opts: ListenerOptions, log: &Log, name: &'static str) {
        d.add_event_listener(node, "click", opts, recorder(log, name));
    }

    #[test]
    fn capture_target_bubble_scenario() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        listen(&d, ROOT, ListenerOptions::CAPTURE, &log, "capR");
        listen(&d, C, ListenerOptions::empty(), &log, "tgt");
        listen(&d, A, ListenerOptions::empty(), &log, "bubA");

        let out = d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["capR", "tgt", "bubA"]);
        assert_eq!(out.invoked, 3);
        assert!(!out.propagation_stopped);
    }

    #[test]
    fn phases_are_strictly_ordered() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        // Register in a scrambled order; phase decides, then sequence.
        listen(&d, A, ListenerOptions::empty(), &log, "bubA");
        listen(&d, C, ListenerOptions::empty(), &log, "tgt1");
        listen(&d, B, ListenerOptions::CAPTURE, &log, "capB");
        listen(&d, ROOT, ListenerOptions::empty(), &log, "bubR");
        listen(&d, ROOT, ListenerOptions::CAPTURE, &log, "capR1");
        listen(&d, C, ListenerOptions::CAPTURE, &log, "tgt2");
        listen(&d, B, ListenerOptions::empty(), &log, "bubB");
        listen(&d, ROOT, ListenerOptions::CAPTURE, &log, "capR2");

        d.dispatch(C, "click", None, ALL).unwrap();
        assert_eq!(
            *log.borrow(),
            ["capR1", "capR2", "capB", "tgt1", "tgt2", "bubB", "bubA", "bubR"]
        );
    }

    #[test]
    fn non_bubbling_event_skips_bubble_phase() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        listen(&d, ROOT, ListenerOptions::CAPTURE, &log, "capR");
        listen(&d, C, ListenerOptions::empty(), &log, "tgt");
        listen(&d, A, ListenerOptions::empty(), &log, "bubA");

        d.dispatch(C, "click", None, EventFlags::empty()).unwrap();
        assert_eq!(*log.borrow(), ["capR", "tgt"]);
    }

    #[test]
    fn context_reports_current_target_and_phase() {
        let d: Dispatcher = EventDispatcher::new();
        let seen: Rc<RefCell<Vec<(Phase, Node, Node)>>> = Rc::default();
        for (node, opts) in [
            (ROOT, ListenerOptions::CAPTURE),
            (C, ListenerOptions::CAPTURE),
            (B, ListenerOptions::empty()),
        ] {
            let seen = seen.clone();
            d.add_event_listener(node, "click", opts, move |ctx| {
                seen.borrow_mut()
                    .push((ctx.phase(), ctx.current_target(), ctx.target()));
                assert_eq!(ctx.composed_path(), &[ROOT, A, B, C]);
                Ok(())
            });
        }
        d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(
            *seen.borrow(),
            [
                (Phase::Capture, ROOT, C),
                (Phase::Target, C, C),
                (Phase::Bubble, B, C),
            ]
        );
    }

    #[test]
    fn duplicate_registration_invokes_once() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        let id = HandlerId::explicit(7);
        let h1 = d.add_event_listener_with_id(B, "click", id, ListenerOptions::empty(), recorder(&log, "x"));
        let h2 = d.add_event_listener_with_id(B, "click", id, ListenerOptions::empty(), recorder(&log, "y"));
        assert_eq!(h1, h2);
        assert_eq!(d.listener_count(), 1);

        d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["x"]);
    }

    #[test]
    fn once_listener_fires_exactly_once() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        listen(&d, B, ListenerOptions::ONCE, &log, "once");
        // Runs after the once listener within the same dispatch.
        let still_registered: Rc<Cell<Option<bool>>> = Rc::default();
        let probe = still_registered.clone();
        d.add_event_listener(A, "click", ListenerOptions::empty(), move |ctx| {
            probe.set(Some(ctx.dispatcher().has_listeners(&B, "click")));
            Ok(())
        });

        for _ in 0..3 {
            d.dispatch(C, "click", None, BUBBLING).unwrap();
        }
        assert_eq!(*log.borrow(), ["once"]);
        assert_eq!(still_registered.get(), Some(false));
    }

    #[test]
    fn once_listener_is_gone_inside_its_own_call() {
        let d: Dispatcher = EventDispatcher::new();
        let inside: Rc<Cell<Option<bool>>> = Rc::default();
        let probe = inside.clone();
        d.add_event_listener(C, "click", ListenerOptions::ONCE, move |ctx| {
            probe.set(Some(ctx.dispatcher().has_listeners(&C, "click")));
            Ok(())
        });
        d.dispatch(C, "click", None, EventFlags::empty()).unwrap();
        assert_eq!(inside.get(), Some(false));
        assert_eq!(d.listener_count(), 0);
    }

    #[test]
    fn stop_propagation_finishes_current_node() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        listen(&d, ROOT, ListenerOptions::CAPTURE, &log, "capR");
        let l = log.clone();
        d.add_event_listener(B, "click", ListenerOptions::empty(), move |ctx| {
            l.borrow_mut().push("stopB");
            ctx.stop_propagation();
            Ok(())
        });
        listen(&d, B, ListenerOptions::empty(), &log, "afterB");
        listen(&d, A, ListenerOptions::empty(), &log, "bubA");
        listen(&d, ROOT, ListenerOptions::empty(), &log, "bubR");

        let out = d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["capR", "stopB", "afterB"]);
        assert!(out.propagation_stopped);
    }

    #[test]
    fn stop_propagation_in_capture_skips_target_and_bubble() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        let l = log.clone();
        d.add_event_listener(A, "click", ListenerOptions::CAPTURE, move |ctx| {
            l.borrow_mut().push("capA");
            ctx.stop_propagation();
            Ok(())
        });
        listen(&d, B, ListenerOptions::CAPTURE, &log, "capB");
        listen(&d, C, ListenerOptions::empty(), &log, "tgt");
        listen(&d, ROOT, ListenerOptions::empty(), &log, "bubR");

        d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["capA"]);
    }

    #[test]
    fn stop_immediate_propagation_halts_siblings() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        listen(&d, C, ListenerOptions::empty(), &log, "first");
        let l = log.clone();
        d.add_event_listener(C, "click", ListenerOptions::empty(), move |ctx| {
            l.borrow_mut().push("halt");
            ctx.stop_immediate_propagation();
            Ok(())
        });
        listen(&d, C, ListenerOptions::empty(), &log, "sibling");
        listen(&d, A, ListenerOptions::empty(), &log, "bubA");

        let out = d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["first", "halt"]);
        assert!(out.propagation_stopped);
    }

    #[test]
    fn prevent_default_respects_cancelable_and_passive() {
        let d: Dispatcher = EventDispatcher::new();
        let effects: Rc<RefCell<Vec<bool>>> = Rc::default();
        let e = effects.clone();
        d.add_event_listener(C, "submit", ListenerOptions::PASSIVE, move |ctx| {
            e.borrow_mut().push(ctx.prevent_default());
            assert!(ctx.is_passive());
            Ok(())
        });
        let e = effects.clone();
        d.add_event_listener(B, "submit", ListenerOptions::empty(), move |ctx| {
            e.borrow_mut().push(ctx.prevent_default());
            Ok(())
        });

        let out = d.dispatch(C, "submit", None, BUBBLING).unwrap();
        assert!(!out.default_prevented);
        assert_eq!(*effects.borrow(), [false, false]);

        effects.borrow_mut().clear();
        let out = d.dispatch(C, "submit", None, ALL).unwrap();
        assert!(out.default_prevented);
        assert_eq!(*effects.borrow(), [false, true]);
    }

    #[test]
    fn failing_listener_is_reported_and_walk_continues() {
        let mut d: Dispatcher = EventDispatcher::new();
        let reports: Rc<RefCell<Vec<(Node, String, String)>>> = Rc::default();
        let r = reports.clone();
        d.set_error_sink(move |node: &Node, ty: &EventType, err: BoxError| {
            r.borrow_mut().push((*node, ty.to_string(), err.to_string()));
        });
        let log = Log::default();
        d.add_event_listener(A, "click", ListenerOptions::empty(), |_| Err("boom".into()));
        listen(&d, A, ListenerOptions::empty(), &log, "afterA");
        listen(&d, ROOT, ListenerOptions::empty(), &log, "bubR");

        let out = d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["afterA", "bubR"]);
        assert_eq!(out.failed, 1);
        assert_eq!(out.invoked, 3);
        assert_eq!(
            *reports.borrow(),
            vec![(A, "click".to_string(), "boom".to_string())]
        );
    }

    #[test]
    fn failures_without_sink_are_logged_and_skipped() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        d.add_event_listener(C, "click", ListenerOptions::empty(), |_| Err("boom".into()));
        listen(&d, C, ListenerOptions::empty(), &log, "next");
        let out = d.dispatch(C, "click", None, EventFlags::empty()).unwrap();
        assert_eq!(out.failed, 1);
        assert_eq!(*log.borrow(), ["next"]);
    }

    #[test]
    fn self_removal_does_not_disturb_snapshot() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        let handle: Rc<RefCell<Option<ListenerHandle<Node>>>> = Rc::default();
        let h = handle.clone();
        let l = log.clone();
        let registered = d.add_event_listener(B, "click", ListenerOptions::empty(), move |ctx| {
            l.borrow_mut().push("self");
            if let Some(h) = h.borrow().as_ref() {
                assert!(ctx.dispatcher().remove_event_listener(h));
            }
            Ok(())
        });
        *handle.borrow_mut() = Some(registered);
        listen(&d, B, ListenerOptions::empty(), &log, "sibling");
        listen(&d, A, ListenerOptions::empty(), &log, "bubA");

        d.dispatch(C, "click", None, BUBBLING).unwrap();
        d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(
            *log.borrow(),
            ["self", "sibling", "bubA", "sibling", "bubA"]
        );
    }

    #[test]
    fn listeners_added_during_dispatch_wait_for_next_dispatch() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        let l = log.clone();
        d.add_event_listener(B, "click", ListenerOptions::ONCE, move |ctx| {
            l.borrow_mut().push("adder");
            let inner = l.clone();
            ctx.dispatcher()
                .add_event_listener(B, "click", ListenerOptions::empty(), move |_| {
                    inner.borrow_mut().push("added");
                    Ok(())
                });
            Ok(())
        });

        d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["adder"]);
        d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["adder", "added"]);
    }

    #[test]
    fn detail_is_shared_by_every_listener() {
        #[derive(Debug, PartialEq)]
        struct Payload {
            message: &'static str,
        }
        let d: Dispatcher<Payload> = EventDispatcher::new();
        let seen: Rc<RefCell<Vec<usize>>> = Rc::default();
        for (node, opts) in [
            (ROOT, ListenerOptions::CAPTURE),
            (C, ListenerOptions::empty()),
            (A, ListenerOptions::empty()),
        ] {
            let seen = seen.clone();
            d.add_event_listener(node, "customAction", opts, move |ctx| {
                let detail = ctx.detail().ok_or("missing detail")?;
                assert_eq!(detail.message, "Hello from CustomEvent!");
                seen.borrow_mut().push(core::ptr::from_ref(detail) as usize);
                Ok(())
            });
        }
        let event = Event::new("customAction", C)
            .with_detail(Payload {
                message: "Hello from CustomEvent!",
            })
            .with_flags(BUBBLING);
        let out = d.dispatch_event(&event).unwrap();
        assert_eq!(out.failed, 0);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        let addr = core::ptr::from_ref(event.detail().unwrap()) as usize;
        assert!(seen.iter().all(|&a| a == addr));
    }

    #[test]
    fn nested_dispatch_has_independent_state() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        let depths: Rc<RefCell<Vec<usize>>> = Rc::default();

        let l = log.clone();
        d.add_event_listener(C, "click", ListenerOptions::empty(), move |ctx| {
            l.borrow_mut().push("click@C");
            let inner = ctx
                .dispatcher()
                .dispatch(C, "customAction", None, ALL)
                .unwrap();
            assert!(inner.default_prevented);
            assert!(inner.propagation_stopped);
            // The nested dispatch's flags did not leak into this one.
            assert!(!ctx.is_propagation_stopped());
            assert!(!ctx.default_prevented());
            assert_eq!(ctx.phase(), Phase::Target);
            assert_eq!(ctx.current_target(), C);
            Ok(())
        });
        let l = log.clone();
        let dep = depths.clone();
        d.add_event_listener(B, "customAction", ListenerOptions::empty(), move |ctx| {
            l.borrow_mut().push("custom@B");
            dep.borrow_mut().push(ctx.dispatcher().nesting_depth());
            ctx.prevent_default();
            ctx.stop_propagation();
            Ok(())
        });
        listen(&d, A, ListenerOptions::empty(), &log, "click@A");

        let out = d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["click@C", "custom@B", "click@A"]);
        assert_eq!(*depths.borrow(), [2]);
        assert!(!out.default_prevented);
        assert!(!out.propagation_stopped);
        assert_eq!(d.nesting_depth(), 0);
    }

    #[test]
    fn once_listener_consumed_by_nested_dispatch_is_skipped_by_outer() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        let l = log.clone();
        d.add_event_listener(ROOT, "click", ListenerOptions::CAPTURE, move |ctx| {
            l.borrow_mut().push("outer");
            if ctx.dispatcher().nesting_depth() == 1 {
                ctx.dispatcher()
                    .dispatch(ROOT, "click", None, EventFlags::empty())
                    .unwrap();
            }
            Ok(())
        });
        listen(&d, ROOT, ListenerOptions::CAPTURE | ListenerOptions::ONCE, &log, "once");

        d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["outer", "outer", "once"]);
    }

    #[test]
    fn structural_faults_abort_before_any_listener() {
        #[derive(Default)]
        struct Cyclic;
        impl ParentLookup<Node> for Cyclic {
            fn parent_of(&self, node: &Node) -> Option<Node> {
                Some(match node.0 {
                    1 => Node(3),
                    n => Node(n - 1),
                })
            }
        }
        let d: EventDispatcher<Node, (), Cyclic> = EventDispatcher::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        d.add_event_listener(Node(3), "click", ListenerOptions::empty(), move |_| {
            h.set(h.get() + 1);
            Ok(())
        });
        let err = d
            .dispatch(Node(3), "click", None, BUBBLING)
            .unwrap_err();
        assert!(err.is_structural());
        assert_eq!(hits.get(), 0);
        assert_eq!(d.nesting_depth(), 0);
    }

    #[test]
    fn depth_bound_is_configurable() {
        let d: Dispatcher =
            EventDispatcher::with_config(Chain, DispatchConfig { max_path_depth: 2 });
        assert!(d.dispatch(A, "click", None, BUBBLING).is_ok());
        assert_eq!(
            d.dispatch(C, "click", None, BUBBLING),
            Err(DispatchError::Unterminated {
                target: C,
                max_depth: 2
            })
        );
    }

    #[test]
    fn unknown_target_is_rejected() {
        let d: Dispatcher = EventDispatcher::new();
        assert_eq!(
            d.dispatch(Node(99), "click", None, BUBBLING),
            Err(DispatchError::UnknownTarget { target: Node(99) })
        );
    }

    #[test]
    fn purge_removes_node_listeners() {
        let d: Dispatcher = EventDispatcher::new();
        let log = Log::default();
        listen(&d, B, ListenerOptions::empty(), &log, "b1");
        listen(&d, B, ListenerOptions::CAPTURE, &log, "b2");
        listen(&d, A, ListenerOptions::empty(), &log, "a");
        let handle = d.add_event_listener(B, "keydown", ListenerOptions::empty(), recorder(&log, "k"));

        assert_eq!(d.purge_nodes([B, Node(42)]), 3);
        assert!(!d.remove_event_listener(&handle));
        d.dispatch(C, "click", None, BUBBLING).unwrap();
        assert_eq!(*log.borrow(), ["a"]);
    }
}
