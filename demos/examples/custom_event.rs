// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A click that raises a custom event carrying a payload.
//!
//! The button's click listener dispatches `customAction` with a detail value
//! from inside its own invocation. The nested dispatch runs to completion with
//! its own propagation state before the click continues bubbling. Also shows a
//! `once` listener and a passive listener whose `prevent_default` is ignored.
//!
//! Run:
//! - `cargo run -p understory_demos --example custom_event`

use std::fmt;

use understory_event_target::tree::{NodeId, Tree};
use understory_event_target::{
    BoxError, EventDispatcher, EventFlags, EventType, ListenerOptions,
};

#[derive(Debug)]
struct Action {
    message: String,
    count: u32,
}

#[derive(Debug)]
struct Rejected(u32);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "count {} is over the limit", self.0)
    }
}

impl std::error::Error for Rejected {}

fn main() {
    understory_demos::init_tracing();

    let mut d: EventDispatcher<NodeId, Action, Tree> = EventDispatcher::new();
    d.set_error_sink(|node: &NodeId, ty: &EventType, err: BoxError| {
        println!("listener on {node:?} failed handling {ty}: {err}");
    });

    let app = d.tree_mut().insert(None);
    let panel = d.tree_mut().insert(Some(app));
    let button = d.tree_mut().insert(Some(panel));

    d.add_event_listener(app, "customAction", ListenerOptions::empty(), |ctx| {
        let Some(action) = ctx.detail() else {
            return Ok(());
        };
        println!(
            "app received {:?} from {:?} (count {})",
            action.message,
            ctx.target(),
            action.count
        );
        if action.count > 2 {
            return Err(Rejected(action.count).into());
        }
        ctx.prevent_default();
        Ok(())
    });

    d.add_event_listener(panel, EventType::CLICK, ListenerOptions::ONCE, |_| {
        println!("panel: first click only");
        Ok(())
    });

    d.add_event_listener(panel, EventType::CLICK, ListenerOptions::PASSIVE, |ctx| {
        // Ignored: passive listeners cannot cancel.
        let cancelled = ctx.prevent_default();
        println!("panel: passive prevent_default had effect: {cancelled}");
        Ok(())
    });

    let clicks = std::rc::Rc::new(std::cell::Cell::new(0_u32));
    let counter = clicks.clone();
    d.add_event_listener(button, EventType::CLICK, ListenerOptions::empty(), move |ctx| {
        counter.set(counter.get() + 1);
        let target = ctx.target();
        let outcome = ctx.dispatcher().dispatch(
            target,
            "customAction",
            Some(Action {
                message: "Hello from CustomEvent!".to_owned(),
                count: counter.get(),
            }),
            EventFlags::BUBBLES | EventFlags::CANCELABLE,
        )?;
        println!(
            "button: custom event handled, default prevented: {}",
            outcome.default_prevented
        );
        Ok(())
    });

    for _ in 0..3 {
        match d.dispatch(
            button,
            EventType::CLICK,
            None,
            EventFlags::BUBBLES | EventFlags::CANCELABLE,
        ) {
            Ok(outcome) => println!(
                "click done: invoked {} listeners, default prevented: {}",
                outcome.invoked, outcome.default_prevented
            ),
            Err(err) => println!("click rejected: {err}"),
        }
    }
    println!("{} clicks, {} listeners registered", clicks.get(), d.listener_count());
}
