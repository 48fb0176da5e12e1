//! Plain-text rendering of the presentation sequence.

use std::fmt::Write as _;

use chrono::Local;
use reasonfeed_core::history::TranscriptMessage;
use reasonfeed_core::tree::{Stage, Task, Thought};
use reasonfeed_core::view::ViewItem;

/// Longest thought excerpt shown under an overlay.
const EXCERPT_CHARS: usize = 80;

pub fn render_view(items: &[ViewItem]) -> String {
    let mut out = String::new();
    for item in items {
        match item {
            ViewItem::Message(message) => render_message(&mut out, message),
            ViewItem::Overlay { task_id, task, .. } => {
                render_overlay(&mut out, task_id, task.as_ref());
            }
        }
    }
    out
}

fn render_message(out: &mut String, message: &TranscriptMessage) {
    let time = message.sent_at.map_or_else(
        || message.timestamp.clone(),
        |sent_at| sent_at.with_timezone(&Local).format("%H:%M:%S").to_string(),
    );
    let author = if message.author.is_empty() {
        if message.is_agent { "agent" } else { "user" }
    } else {
        message.author.as_str()
    };
    let _ = writeln!(out, "[{time}] {author}: {}", message.content);
}

fn render_overlay(out: &mut String, task_id: &str, task: Option<&Task>) {
    let Some(task) = task else {
        let _ = writeln!(out, "    > task {task_id} (waiting for reasoning)");
        return;
    };

    let status = if task.complete { "done" } else { "working" };
    match task.description.as_deref() {
        Some(description) => {
            let _ = writeln!(out, "    > task {task_id} [{status}] {description}");
        }
        None => {
            let _ = writeln!(out, "    > task {task_id} [{status}]");
        }
    }
    for thought in task.thoughts() {
        render_thought(out, thought);
    }
}

fn render_thought(out: &mut String, thought: &Thought) {
    let (done, total) = thought.progress();
    let bar: String = Stage::ALL
        .iter()
        .map(|stage| if thought.is_completed(*stage) { '#' } else { '.' })
        .collect();
    let current = thought.current_stage().map_or("pending", Stage::label);
    let _ = write!(out, "      {} [{bar}] {done}/{total} {current}", thought.id);

    if let Some(action) = thought
        .executed_action
        .as_deref()
        .or(thought.selected_action.as_deref())
    {
        let _ = write!(out, " action={action}");
    }
    if thought.conscience_passed == Some(false) {
        let _ = write!(out, " conscience=failed");
    }
    out.push('\n');

    if !thought.content.is_empty() {
        let _ = writeln!(out, "        {}", excerpt(&thought.content));
    }
}

fn excerpt(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= EXCERPT_CHARS && !text.contains('\n') {
        return line.to_string();
    }
    let mut short: String = line.chars().take(EXCERPT_CHARS).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_message_and_pending_overlay() {
        let items = vec![
            ViewItem::Message(TranscriptMessage::new("m1", "hello", "alice", false, "not a time")),
            ViewItem::Overlay {
                message_id: "m1".to_string(),
                task_id: "t1".to_string(),
                task: None,
            },
        ];

        let text = render_view(&items);

        assert!(text.contains("[not a time] alice: hello"));
        assert!(text.contains("task t1 (waiting for reasoning)"));
    }

    #[test]
    fn test_render_overlay_with_stage_progress() {
        use reasonfeed_core::payload::Payload;
        use reasonfeed_core::stream::decoder::{EventKind, ReasoningEvent};
        use reasonfeed_core::tree::ReasoningTree;

        let mut tree = ReasoningTree::new();
        for (kind, payload) in [
            (
                EventKind::ThoughtStart,
                r#"{"thought_content": "Greet back", "task_description": "Respond"}"#,
            ),
            (EventKind::DmaResults, "{}"),
            (EventKind::ActionResult, r#"{"action_executed": "task_complete"}"#),
        ] {
            tree.apply(&ReasoningEvent {
                task_id: "t1".to_string(),
                thought_id: "th1".to_string(),
                kind,
                payload: Payload::from(serde_json::from_str::<serde_json::Value>(payload).unwrap()),
            });
        }

        let text = render_view(&[ViewItem::Overlay {
            message_id: "m1".to_string(),
            task_id: "t1".to_string(),
            task: tree.task("t1").cloned(),
        }]);

        assert!(text.contains("task t1 [done] Respond"));
        assert!(text.contains("th1 [#.#..#] 3/6 result action=task_complete"));
        assert!(text.contains("Greet back"));
    }

    #[test]
    fn test_blank_author_falls_back_to_role() {
        let items = vec![ViewItem::Message(TranscriptMessage::new("a1", "hi", "", true, ""))];
        assert!(render_view(&items).contains("agent: hi"));
    }

    #[test]
    fn test_excerpt_truncates_long_text() {
        let long = "x".repeat(200);
        let short = excerpt(&long);
        assert_eq!(short.chars().count(), EXCERPT_CHARS + 3);
        assert!(short.ends_with("..."));
        assert_eq!(excerpt("short"), "short");
        assert_eq!(excerpt("first\nsecond"), "first...");
    }
}
