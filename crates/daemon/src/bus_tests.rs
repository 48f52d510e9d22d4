// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use yare::parameterized;

#[tokio::test]
async fn ui_send_becomes_telegram_shaped_update() {
    let bus = MessageBus::new();
    bus.ui_send("hello");

    let updates = bus.get_updates(0, Duration::from_millis(10)).await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].chat_id, 1);
    assert_eq!(updates[0].user_id, 1);
    assert_eq!(updates[0].text, "hello");
}

#[tokio::test]
async fn update_ids_increase_past_offset() {
    let bus = MessageBus::new();
    bus.ui_send("a");
    let first = bus.get_updates(0, Duration::from_millis(10)).await;
    bus.ui_send("b");
    let second = bus.get_updates(first[0].update_id + 1, Duration::from_millis(10)).await;
    assert!(second[0].update_id > first[0].update_id);
}

#[tokio::test(start_paused = true)]
async fn get_updates_times_out_empty() {
    let bus = MessageBus::new();
    let updates = bus.get_updates(0, Duration::from_secs(1)).await;
    assert!(updates.is_empty());
}

#[tokio::test]
async fn send_strips_markdown_by_default() {
    let bus = MessageBus::new();
    bus.send(1, "**bold** and `code`", false);

    let msg = bus.ui_receive(Duration::from_millis(10)).await.unwrap();
    assert_eq!(msg, BusMessage::Text { content: "bold and code".to_string(), markdown: false });
}

#[tokio::test]
async fn markdown_optin_passes_through() {
    let bus = MessageBus::new();
    bus.send(1, "**bold**", true);

    let msg = bus.ui_receive(Duration::from_millis(10)).await.unwrap();
    assert_eq!(msg, BusMessage::Text { content: "**bold**".to_string(), markdown: true });
}

#[tokio::test]
async fn broadcast_mirrors_chat_and_logs() {
    let bus = MessageBus::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    bus.set_broadcast(Arc::new(move |_| {
        hits_clone.fetch_add(1, Ordering::SeqCst);
    }));

    bus.send(1, "hi", false);
    bus.push_log(&json!({"type": "log"}));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn actions_and_photos_flow_through_the_outbox() {
    let bus = MessageBus::new();
    bus.send_action(1, "typing");
    bus.send_photo(1, vec![0xff, 0xd8], "screenshot");

    let first = bus.ui_receive(Duration::from_millis(10)).await.unwrap();
    assert_eq!(first, BusMessage::Action { action: "typing".to_string() });
    let second = bus.ui_receive(Duration::from_millis(10)).await.unwrap();
    assert_eq!(
        second,
        BusMessage::Photo { bytes: vec![0xff, 0xd8], caption: "screenshot".to_string() }
    );
}

#[test]
fn log_queue_drops_oldest_when_full() {
    let bus = MessageBus::new();
    for i in 0..1100u32 {
        bus.push_log(&json!({"i": i}));
    }
    let mut drained = Vec::new();
    loop {
        let batch = bus.ui_poll_logs();
        if batch.is_empty() {
            break;
        }
        drained.extend(batch);
    }
    assert_eq!(drained.len(), 1000);
    assert_eq!(drained[0]["i"], 100);
}

#[test]
fn poll_logs_is_bounded_per_call() {
    let bus = MessageBus::new();
    for i in 0..80u32 {
        bus.push_log(&json!({"i": i}));
    }
    assert_eq!(bus.ui_poll_logs().len(), 50);
    assert_eq!(bus.ui_poll_logs().len(), 30);
}

#[parameterized(
    fenced_code = { "```rust\nlet x = 1;\n```", "let x = 1;\n" },
    inline_code = { "use `cargo build`", "use cargo build" },
    bold = { "**important**", "important" },
    italic_star = { "*italic*", "italic" },
    italic_underscore = { "_italic_", "italic" },
    bold_then_italic = { "**bold** and *subtle*", "bold and subtle" },
    snake_case_untouched = { "call foo_bar_baz here", "call foo_bar_baz here" },
    heading = { "## Title", "Title" },
    list = { "- item one\n- item two", "• item one\n• item two" },
    link = { "see [the docs](https://example.com)", "see the docs" },
    strikethrough = { "~~gone~~", "gone" },
)]
fn markdown_stripping(input: &str, expected: &str) {
    assert_eq!(strip_markdown(input), expected);
}

#[test]
fn split_message_prefers_line_boundaries() {
    let text = format!("{}\n{}", "a".repeat(3000), "b".repeat(2000));
    let chunks = split_message(&text, 4000);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], "a".repeat(3000));
    assert!(chunks[1].trim_start().chars().all(|c| c == 'b'));
}

#[test]
fn split_message_short_text_is_single_chunk() {
    assert_eq!(split_message("short", 4000), vec!["short".to_string()]);
}
