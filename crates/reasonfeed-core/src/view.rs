//! Presentation sequence: transcript messages interleaved with reasoning overlays.

use crate::correlator::Correlator;
use crate::history::{TranscriptMessage, sort_chronologically};
use crate::tree::{ReasoningTree, Task};

/// One entry of the presentation sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewItem {
    Message(TranscriptMessage),
    /// Reasoning for the task handling the preceding user message.
    Overlay {
        message_id: String,
        task_id: String,
        /// Current task state; `None` until the stream mentions the task
        task: Option<Task>,
    },
}

impl ViewItem {
    pub fn is_overlay(&self) -> bool {
        matches!(self, ViewItem::Overlay { .. })
    }
}

/// Builds the presentation sequence.
///
/// Messages appear in ascending timestamp order. A user message that was
/// correlated with a task is followed directly by that task's overlay.
pub fn build_view(
    transcript: &[TranscriptMessage],
    tree: &ReasoningTree,
    correlator: &Correlator,
) -> Vec<ViewItem> {
    let mut messages = transcript.to_vec();
    sort_chronologically(&mut messages);

    let mut items = Vec::with_capacity(messages.len());
    for message in messages {
        let overlay = if message.is_user() {
            correlator.lookup(&message.id).map(|task_id| ViewItem::Overlay {
                message_id: message.id.clone(),
                task: tree.task(&task_id).cloned(),
                task_id,
            })
        } else {
            None
        };
        items.push(ViewItem::Message(message));
        items.extend(overlay);
    }
    items
}

/// Holds the last published sequence and reports when it changes.
#[derive(Debug, Default)]
pub struct ViewMerger {
    current: Vec<ViewItem>,
}

impl ViewMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the sequence. Returns it only when it differs from the last one.
    pub fn refresh(
        &mut self,
        transcript: &[TranscriptMessage],
        tree: &ReasoningTree,
        correlator: &Correlator,
    ) -> Option<&[ViewItem]> {
        let next = build_view(transcript, tree, correlator);
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(&self.current)
    }

    pub fn current(&self) -> &[ViewItem] {
        &self.current
    }
}
