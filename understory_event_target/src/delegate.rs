// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Delegation: one listener on an ancestor instead of one per descendant.
//!
//! [`EventDispatcher::delegate`] registers a single bubble listener on the
//! ancestor. When it runs, it looks from the event target upward, stopping at
//! the ancestor, for the nearest node accepted by the caller's predicate, and
//! hands that node to the delegated handler. Nodes added under the ancestor
//! later are covered without further registration.
//!
//! Delegation is plain composition over the public dispatcher API: the
//! delegated handler sees the regular [`EventContext`], so propagation control
//! and `prevent_default` behave exactly as in any other bubble listener.

use core::fmt::Debug;
use core::hash::Hash;

use crate::context::EventContext;
use crate::dispatcher::EventDispatcher;
use crate::error::ListenerResult;
use crate::event::EventType;
use crate::registry::ListenerHandle;
use crate::types::{ListenerOptions, ParentLookup};

/// Nearest node on `path` (target end first) accepted by `predicate`, not
/// looking past `ancestor`.
///
/// `path` is root first, as returned by [`EventContext::composed_path`].
pub fn closest_match<K: Copy + PartialEq>(
    path: &[K],
    ancestor: K,
    predicate: impl Fn(&K) -> bool,
) -> Option<K> {
    for &node in path.iter().rev() {
        if predicate(&node) {
            return Some(node);
        }
        if node == ancestor {
            break;
        }
    }
    None
}

impl<K, D, P> EventDispatcher<K, D, P>
where
    K: Copy + Eq + Hash + Debug,
    P: ParentLookup<K>,
{
    /// Handle `ty` events for every node under `ancestor` that `predicate`
    /// accepts.
    ///
    /// `handler` receives the context and the matched node, which stands in
    /// for the event target. Events whose path holds no matching node at or
    /// below `ancestor` are ignored. Remove the delegation with
    /// [`remove_event_listener`](Self::remove_event_listener).
    ///
    /// ```
    /// use core::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// use understory_event_target::dispatcher::EventDispatcher;
    /// use understory_event_target::event::{EventFlags, EventType};
    /// use understory_event_target::tree::{NodeId, Tree};
    ///
    /// let mut d: EventDispatcher<NodeId, (), Tree> = EventDispatcher::new();
    /// let list = d.tree_mut().insert(None);
    /// let item = d.tree_mut().insert(Some(list));
    /// let label = d.tree_mut().insert(Some(item));
    ///
    /// let items = Rc::new(RefCell::new(vec![item]));
    /// let hits = Rc::new(RefCell::new(Vec::new()));
    /// let (is_item, log) = (items.clone(), hits.clone());
    /// d.delegate(
    ///     list,
    ///     EventType::CLICK,
    ///     move |n| is_item.borrow().contains(n),
    ///     move |_, item| {
    ///         log.borrow_mut().push(item);
    ///         Ok(())
    ///     },
    /// );
    ///
    /// d.dispatch(label, EventType::CLICK, None, EventFlags::BUBBLES).unwrap();
    /// d.dispatch(list, EventType::CLICK, None, EventFlags::BUBBLES).unwrap();
    /// assert_eq!(*hits.borrow(), [item]);
    /// ```
    pub fn delegate<F, H>(
        &self,
        ancestor: K,
        ty: impl Into<EventType>,
        predicate: F,
        handler: H,
    ) -> ListenerHandle<K>
    where
        K: 'static,
        F: Fn(&K) -> bool + 'static,
        H: Fn(&mut EventContext<'_, K, D, P>, K) -> ListenerResult + 'static,
    {
        self.add_event_listener(ancestor, ty, ListenerOptions::empty(), move |ctx| {
            match closest_match(ctx.composed_path(), ancestor, &predicate) {
                Some(node) => handler(ctx, node),
                None => Ok(()),
            }
        })
    }
}
