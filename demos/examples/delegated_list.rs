// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Delegated clicks on a list that grows after the handler is installed.
//!
//! One delegated listener on the list handles clicks for every item, including
//! items added later. Each item has a delete button whose own listener stops
//! propagation, so the list never sees those clicks.
//!
//! Run:
//! - `cargo run -p understory_demos --example delegated_list`
//! - `RUST_LOG=understory_event_target=trace cargo run -p understory_demos --example delegated_list`

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use understory_event_target::tree::{NodeId, Tree};
use understory_event_target::{EventDispatcher, EventFlags, EventType, ListenerOptions};

type Labels = Rc<RefCell<HashMap<NodeId, String>>>;

struct TodoList {
    d: EventDispatcher<NodeId, (), Tree>,
    list: NodeId,
    labels: Labels,
}

impl TodoList {
    fn new() -> Self {
        let mut d: EventDispatcher<NodeId, (), Tree> = EventDispatcher::new();
        let page = d.tree_mut().insert(None);
        let list = d.tree_mut().insert(Some(page));
        let labels = Labels::default();

        let is_item = labels.clone();
        let names = labels.clone();
        d.delegate(
            list,
            EventType::CLICK,
            move |n| is_item.borrow().contains_key(n),
            move |ctx, item| {
                let name = names.borrow().get(&item).cloned().unwrap_or_default();
                tracing::info!(item = ?item, clicked = ?ctx.target(), "selected {name}");
                println!("selected {name}");
                Ok(())
            },
        );
        d.add_event_listener(page, EventType::CLICK, ListenerOptions::empty(), |ctx| {
            println!("page saw a click from {:?}", ctx.target());
            Ok(())
        });

        Self { d, list, labels }
    }

    /// Append an item with a label and a delete button; returns both.
    fn push(&mut self, name: &str) -> (NodeId, NodeId, NodeId) {
        let item = self.d.tree_mut().insert(Some(self.list));
        let label = self.d.tree_mut().insert(Some(item));
        let delete = self.d.tree_mut().insert(Some(item));
        self.labels.borrow_mut().insert(item, name.to_owned());

        let names = self.labels.clone();
        self.d
            .add_event_listener(delete, EventType::CLICK, ListenerOptions::empty(), move |ctx| {
                ctx.stop_propagation();
                let removed = names.borrow_mut().remove(&item);
                println!("delete pressed for {}", removed.unwrap_or_default());
                Ok(())
            });
        (item, label, delete)
    }

    fn click(&self, node: NodeId) {
        match self
            .d
            .dispatch(node, EventType::CLICK, None, EventFlags::BUBBLES)
        {
            Ok(outcome) => tracing::debug!(?outcome, "click dispatched"),
            Err(err) => println!("click rejected: {err}"),
        }
    }
}

fn main() {
    understory_demos::init_tracing();

    let mut todo = TodoList::new();
    let (_, milk_label, _) = todo.push("buy milk");
    todo.click(milk_label);

    // Added after the delegate was installed; still handled.
    let (bread, _, bread_delete) = todo.push("bake bread");
    todo.click(bread);

    // Stops at the button: neither the list nor the page hear about it.
    todo.click(bread_delete);

    // The item is no longer an item as far as the predicate is concerned.
    todo.click(bread);

    // Tear the item down; its listeners go with it.
    let removed = todo.d.remove_subtree(bread);
    println!(
        "removed {} nodes, {} listeners left",
        removed.len(),
        todo.d.listener_count()
    );
    todo.click(bread_delete);
}
