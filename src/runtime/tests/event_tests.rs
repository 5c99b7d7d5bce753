//! Tests for broadcasts, broadcast-and-wait and broadcast functions

use super::helpers::*;
use crate::project::{Block, TargetDef};
use crate::value::Value;

fn broadcast_function(message: &str, result: &str) -> Block {
    Block::new("event_broadcast_function")
        .input("BROADCAST", message)
        .field("RESULT", result)
}

fn return_value(value: impl Into<Value>) -> Block {
    Block::new("event_return_from_broadcast").input("VALUE", value)
}

/* ===================== Fire and Forget ===================== */

#[test]
fn test_broadcast_starts_receivers_next_tick() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag("main", vec![broadcast("go"), set_var("sent", true)])]),
        TargetDef::sprite("Cat", vec![on_broadcast("hear", "go", vec![set_var("heard", true)])]),
    ]);

    h.green_flag();
    h.tick();
    assert_eq!(h.global("sent"), Value::Bool(true));
    assert_eq!(h.var("Cat", "heard"), Value::empty());

    h.tick();
    assert_eq!(h.var("Cat", "heard"), Value::Bool(true));
}

#[test]
fn test_broadcast_names_ignore_case() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag("main", vec![broadcast("GO Now")])]),
        TargetDef::sprite("Cat", vec![on_broadcast("hear", "go now", vec![set_var("heard", true)])]),
    ]);

    h.green_flag();
    h.ticks(2);
    assert_eq!(h.var("Cat", "heard"), Value::Bool(true));
}

#[test]
fn test_broadcast_restarts_running_receiver() {
    let mut h = harness(vec![TargetDef::sprite(
        "Cat",
        vec![on_broadcast("count", "go", vec![forever(vec![change_var("n", 1.0)])])],
    )
    .with_variable("n", 0.0)]);

    let first = h.runtime.broadcast("go", None, None);
    assert_eq!(first.len(), 1);
    h.ticks(3);
    assert_eq!(h.var("Cat", "n"), Value::Num(3.0));

    let second = h.runtime.broadcast("go", None, None);
    assert_eq!(second, first);
    assert_eq!(h.runtime.threads().len(), 1);

    h.ticks(2);
    assert_eq!(h.var("Cat", "n"), Value::Num(5.0));
}

#[test]
fn test_broadcast_without_listeners_is_still_received() {
    let is_received = Block::new("event_is_broadcast_received").input("BROADCAST", "Lonely");
    let mut h = harness(vec![TargetDef::stage(vec![flag(
        "main",
        vec![
            set_var_to("before", is_received.clone()),
            broadcast("lonely"),
            set_var_to("after", is_received),
        ],
    )])]);

    h.green_flag();
    h.tick();

    assert_eq!(h.global("before"), Value::Bool(false));
    assert_eq!(h.global("after"), Value::Bool(true));
    assert!(h.runtime.is_broadcast_received("LONELY"));
    assert_eq!(h.runtime.message("lonely").map(|m| m.name.as_str()), Some("lonely"));
}

#[test]
fn test_broadcast_with_data_reaches_receiver() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag(
            "main",
            vec![Block::new("event_broadcast_with_data")
                .input("BROADCAST", "go")
                .input("DATA", 7.0)],
        )]),
        TargetDef::sprite(
            "Cat",
            vec![on_broadcast(
                "hear",
                "go",
                vec![set_var_to("got", Block::new("event_received_data"))],
            )],
        )
        .with_variable("got", "unset"),
    ]);

    h.green_flag();
    h.ticks(2);
    assert_eq!(h.var("Cat", "got"), Value::Num(7.0));
}

#[test]
fn test_received_data_empty_for_plain_broadcast() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag("main", vec![broadcast("go")])]),
        TargetDef::sprite(
            "Cat",
            vec![on_broadcast(
                "hear",
                "go",
                vec![set_var_to("got", Block::new("event_received_data"))],
            )],
        )
        .with_variable("got", "unset"),
    ]);

    h.green_flag();
    h.ticks(2);
    assert_eq!(h.var("Cat", "got"), Value::empty());
}

#[test]
fn test_broadcast_to_sprite_only_reaches_that_sprite() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag(
            "main",
            vec![Block::new("event_broadcast_to_sprite")
                .input("BROADCAST", "go")
                .input("SPRITE", "Dog")],
        )]),
        TargetDef::sprite("Cat", vec![on_broadcast("hear", "go", vec![set_var("heard", true)])]),
        TargetDef::sprite("Dog", vec![on_broadcast("hear", "go", vec![set_var("heard", true)])]),
    ]);

    h.green_flag();
    h.ticks(2);

    assert_eq!(h.var("Dog", "heard"), Value::Bool(true));
    assert_eq!(h.var("Cat", "heard"), Value::empty());
}

#[test]
fn test_broadcast_to_unknown_sprite_marks_sent() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag(
            "main",
            vec![Block::new("event_broadcast_to_sprite")
                .input("BROADCAST", "go")
                .input("SPRITE", "Ghost")],
        )]),
        TargetDef::sprite("Cat", vec![on_broadcast("hear", "go", vec![set_var("heard", true)])]),
    ]);

    h.green_flag();
    h.ticks(2);

    assert!(h.runtime.is_broadcast_received("go"));
    assert_eq!(h.var("Cat", "heard"), Value::empty());
    assert!(h.runtime.threads().is_empty());
}

#[test]
fn test_broadcast_thread_count() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag(
            "main",
            vec![set_var_to(
                "count",
                Block::new("event_broadcast_thread_count").input("BROADCAST", "go"),
            )],
        )]),
        TargetDef::sprite("Cat", vec![on_broadcast("hear", "go", vec![])]),
        TargetDef::sprite("Dog", vec![on_broadcast("hear", "go", vec![])]),
    ]);

    h.green_flag();
    h.tick();
    assert_eq!(h.global("count"), Value::Num(2.0));
}

/* ===================== Broadcast and Wait ===================== */

#[test]
fn test_broadcast_and_wait_waits_for_slowest() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag(
            "main",
            vec![
                Block::new("event_broadcastandwait").input("BROADCAST", "go"),
                set_var("done", true),
            ],
        )]),
        TargetDef::sprite("Cat", vec![on_broadcast("fast", "go", vec![set_var("fast", 1.0)])]),
        TargetDef::sprite(
            "Dog",
            vec![on_broadcast("slow", "go", vec![wait_tick(), wait_tick(), wait_tick()])],
        ),
    ]);

    h.green_flag();
    h.ticks(3);
    assert_eq!(h.var("Cat", "fast"), Value::Num(1.0));
    assert_eq!(h.global("done"), Value::empty());

    h.ticks(2);
    assert_eq!(h.global("done"), Value::empty());

    h.tick();
    assert_eq!(h.global("done"), Value::Bool(true));
    assert!(h.runtime.cohorts.is_empty());
}

#[test]
fn test_broadcast_and_wait_without_listeners_continues() {
    let mut h = harness(vec![TargetDef::stage(vec![flag(
        "main",
        vec![
            Block::new("event_broadcastandwait").input("BROADCAST", "nobody"),
            set_var("done", true),
        ],
    )])]);

    h.green_flag();
    h.tick();
    assert_eq!(h.global("done"), Value::Bool(true));
}

#[test]
fn test_broadcast_and_wait_to_own_script_restarts_it() {
    let mut h = harness(vec![TargetDef::stage(vec![on_broadcast(
        "again",
        "again",
        vec![
            change_var("n", 1.0),
            Block::new("event_broadcastandwait").input("BROADCAST", "again"),
            set_var("after", true),
        ],
    )])
    .with_variable("n", 0.0)]);

    h.runtime.broadcast("again", None, None);
    h.ticks(3);

    assert_eq!(h.global("n"), Value::Num(3.0));
    assert_eq!(h.global("after"), Value::empty());
    assert_eq!(h.runtime.threads().len(), 1);
    assert!(h.runtime.cohorts.is_empty());
}

/* ===================== Broadcast Functions ===================== */

#[test]
fn test_broadcast_function_returns_value() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag("main", vec![broadcast_function("double", "answer")])]),
        TargetDef::sprite(
            "Cat",
            vec![on_broadcast(
                "double",
                "double",
                vec![return_value(42.0), set_var("after", true)],
            )],
        ),
    ]);

    h.green_flag();
    h.ticks(2);
    assert_eq!(h.global("answer"), Value::empty());

    h.tick();
    assert_eq!(h.global("answer"), Value::Num(42.0));
    // returning does not end the listener
    assert_eq!(h.var("Cat", "after"), Value::Bool(true));
    assert!(h.runtime.cohorts.is_empty());
}

#[test]
fn test_broadcast_function_waits_for_listener_after_return() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag("main", vec![broadcast_function("ask", "answer")])]),
        TargetDef::sprite(
            "Cat",
            vec![on_broadcast(
                "ask",
                "ask",
                vec![return_value("early"), wait_tick(), return_value("late")],
            )],
        ),
    ]);

    h.green_flag();
    h.ticks(3);
    assert_eq!(h.global("answer"), Value::empty());

    h.ticks(2);
    assert_eq!(h.global("answer"), Value::from("late"));
}

#[test]
fn test_broadcast_and_wait_as_reporter_input_fails_thread() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag(
            "main",
            vec![
                set_var_to(
                    "x",
                    Block::new("event_broadcastandwait").input("BROADCAST", "go"),
                ),
                set_var("after", true),
            ],
        )]),
        TargetDef::sprite("Cat", vec![on_broadcast("hear", "go", vec![set_var("heard", true)])]),
    ]);

    h.green_flag();
    h.ticks(2);

    assert_eq!(h.global("after"), Value::empty());
    assert_eq!(h.var("Cat", "heard"), Value::empty());
    assert!(!h.runtime.is_broadcast_received("go"));
    assert!(h.runtime.cohorts.is_empty());

    let error = h.runtime.last_error().expect("error recorded");
    assert_eq!(
        error.message,
        "event_broadcastandwait: cannot wait inside a reporter input"
    );
}

#[test]
fn test_broadcast_function_args_pass_data() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag(
            "main",
            vec![Block::new("event_broadcast_function_args")
                .input("BROADCAST", "echo")
                .input("DATA", "hi")
                .field("RESULT", "answer")],
        )]),
        TargetDef::sprite(
            "Cat",
            vec![on_broadcast(
                "echo",
                "echo",
                vec![Block::new("event_return_from_broadcast")
                    .reporter("VALUE", Block::new("event_received_data"))],
            )],
        ),
    ]);

    h.green_flag();
    h.ticks(3);
    assert_eq!(h.global("answer"), Value::from("hi"));
}

#[test]
fn test_broadcast_function_last_writer_wins() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag("main", vec![broadcast_function("ask", "answer")])]),
        TargetDef::sprite("Cat", vec![on_broadcast("ask", "ask", vec![return_value("cat")])]),
        TargetDef::sprite("Dog", vec![on_broadcast("ask", "ask", vec![return_value("dog")])]),
    ]);

    h.green_flag();
    h.ticks(3);

    // Dog is in front, so it steps first and Cat overwrites it
    assert_eq!(h.global("answer"), Value::from("cat"));
}

#[test]
fn test_broadcast_function_without_return_gives_empty() {
    let mut h = harness(vec![
        TargetDef::stage(vec![flag("main", vec![broadcast_function("ask", "answer")])])
            .with_variable("answer", "stale"),
        TargetDef::sprite("Cat", vec![on_broadcast("ask", "ask", vec![set_var("x", 1.0)])]),
    ]);

    h.green_flag();
    h.ticks(3);

    assert_eq!(h.global("answer"), Value::empty());
    assert!(h.runtime.cohorts.is_empty());
}

#[test]
fn test_return_outside_broadcast_is_ignored() {
    let mut h = harness(vec![TargetDef::stage(vec![flag(
        "main",
        vec![return_value(1.0), set_var("after", true)],
    )])]);

    h.green_flag();
    h.tick();

    assert_eq!(h.global("after"), Value::Bool(true));
    assert!(h.runtime.threads().is_empty());
    assert!(h.runtime.last_error().is_none());
}
