//! Reasoning tree: tasks, their thoughts, and each thought's pipeline stages.
//!
//! The tree is rebuilt incrementally from decoded stream events. Entities are
//! created on first reference and live until [`ReasoningTree::clear`]. Stage
//! arrival order is not validated: a stream replayed after a reconnect simply
//! overwrites each stage with the payload it carries, so applying the same
//! events again never changes the result.

use std::collections::BTreeMap;

use crate::payload::Payload;
use crate::stream::decoder::{EventKind, ReasoningEvent};

/// Substrings of an executed-action label that end a task.
const TERMINAL_ACTIONS: [&str; 2] = ["task_complete", "task_reject"];

/// The six fixed stages of one reasoning cycle, in nominal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Start,
    Context,
    DomainAnalysis,
    ActionSelection,
    ConscienceCheck,
    Result,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Start,
        Stage::Context,
        Stage::DomainAnalysis,
        Stage::ActionSelection,
        Stage::ConscienceCheck,
        Stage::Result,
    ];

    /// Stage completed by an event of this kind, if any.
    pub fn for_event(kind: &EventKind) -> Option<Stage> {
        match kind {
            EventKind::ThoughtStart => Some(Stage::Start),
            EventKind::SnapshotAndContext => Some(Stage::Context),
            EventKind::DmaResults => Some(Stage::DomainAnalysis),
            EventKind::AspdmaResult => Some(Stage::ActionSelection),
            EventKind::ConscienceResult => Some(Stage::ConscienceCheck),
            EventKind::ActionResult => Some(Stage::Result),
            EventKind::Other(_) => None,
        }
    }

    /// Short human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Context => "context",
            Stage::DomainAnalysis => "analysis",
            Stage::ActionSelection => "action selection",
            Stage::ConscienceCheck => "conscience",
            Stage::Result => "result",
        }
    }
}

/// State of one stage within a thought.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageState {
    pub stage: Stage,
    pub completed: bool,
    /// Event fields, verbatim from the last delivery of this stage
    pub payload: Payload,
}

/// One reasoning cycle within a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thought {
    pub id: String,
    pub task_id: String,
    pub content: String,
    pub selected_action: Option<String>,
    pub executed_action: Option<String>,
    /// `None` until the conscience stage reports
    pub conscience_passed: Option<bool>,
    stages: BTreeMap<Stage, StageState>,
    /// Arrival order within the tree
    seq: u64,
}

impl Thought {
    fn new(id: &str, task_id: &str, seq: u64) -> Self {
        Self {
            id: id.to_string(),
            task_id: task_id.to_string(),
            content: String::new(),
            selected_action: None,
            executed_action: None,
            conscience_passed: None,
            stages: BTreeMap::new(),
            seq,
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageState> {
        self.stages.get(&stage)
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.stages.get(&stage).is_some_and(|state| state.completed)
    }

    /// Stages seen so far, in nominal order.
    pub fn stages(&self) -> impl Iterator<Item = &StageState> {
        self.stages.values()
    }

    pub fn completed_stages(&self) -> Vec<Stage> {
        self.stages
            .values()
            .filter(|state| state.completed)
            .map(|state| state.stage)
            .collect()
    }

    /// Furthest completed stage in nominal order.
    pub fn current_stage(&self) -> Option<Stage> {
        self.completed_stages().last().copied()
    }

    /// Completed stage count out of [`Stage::ALL`].
    pub fn progress(&self) -> (usize, usize) {
        (self.completed_stages().len(), Stage::ALL.len())
    }

    /// Stores the stage with its latest payload. Returns whether it differed.
    fn complete_stage(&mut self, stage: Stage, payload: &Payload) -> bool {
        let next = StageState {
            stage,
            completed: true,
            payload: payload.clone(),
        };
        if self.stages.get(&stage) == Some(&next) {
            return false;
        }
        self.stages.insert(stage, next);
        true
    }
}

/// A unit of agent work spanning one or more thoughts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub description: Option<String>,
    pub complete: bool,
    thoughts: BTreeMap<String, Thought>,
}

impl Task {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            description: None,
            complete: false,
            thoughts: BTreeMap::new(),
        }
    }

    pub fn thought(&self, id: &str) -> Option<&Thought> {
        self.thoughts.get(id)
    }

    /// Thoughts in the order they were first seen.
    pub fn thoughts(&self) -> Vec<&Thought> {
        let mut thoughts: Vec<&Thought> = self.thoughts.values().collect();
        thoughts.sort_by_key(|thought| thought.seq);
        thoughts
    }

    pub fn latest_thought(&self) -> Option<&Thought> {
        self.thoughts.values().max_by_key(|thought| thought.seq)
    }

    pub fn thought_count(&self) -> usize {
        self.thoughts.len()
    }
}

/// All tasks seen on the stream, keyed by task id.
#[derive(Debug, Default)]
pub struct ReasoningTree {
    tasks: BTreeMap<String, Task>,
    next_seq: u64,
}

impl ReasoningTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the tree. Returns whether visible state changed.
    pub fn apply(&mut self, event: &ReasoningEvent) -> bool {
        let mut changed = false;

        let task = self
            .tasks
            .entry(event.task_id.clone())
            .or_insert_with(|| {
                changed = true;
                Task::new(&event.task_id)
            });

        let mut created_thought = false;
        let seq = self.next_seq;
        let thought = task
            .thoughts
            .entry(event.thought_id.clone())
            .or_insert_with(|| {
                created_thought = true;
                Thought::new(&event.thought_id, &event.task_id, seq)
            });
        if created_thought {
            self.next_seq += 1;
            changed = true;
        }

        let Some(stage) = Stage::for_event(&event.kind) else {
            return changed;
        };
        let payload = &event.payload;
        changed |= thought.complete_stage(stage, payload);

        match event.kind {
            EventKind::ThoughtStart => {
                if let Some(content) = payload.non_empty_str("thought_content") {
                    changed |= update(&mut thought.content, content.to_string());
                }
                if let Some(description) = payload.non_empty_str("task_description") {
                    changed |= update(&mut task.description, Some(description.to_string()));
                }
            }
            EventKind::AspdmaResult => {
                if let Some(action) = payload.non_empty_str("selected_action") {
                    changed |= update(&mut thought.selected_action, Some(action.to_string()));
                }
            }
            EventKind::ConscienceResult => {
                let passed = payload
                    .get("conscience_passed")
                    .and_then(Payload::as_bool)
                    .unwrap_or(true);
                changed |= update(&mut thought.conscience_passed, Some(passed));
            }
            EventKind::ActionResult => {
                if let Some(action) = payload.non_empty_str("action_executed") {
                    changed |= update(&mut thought.executed_action, Some(action.to_string()));
                    if is_terminal_action(action) {
                        changed |= update(&mut task.complete, true);
                    }
                }
            }
            EventKind::SnapshotAndContext | EventKind::DmaResults | EventKind::Other(_) => {}
        }

        changed
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drops every task. Returns whether anything was removed.
    pub fn clear(&mut self) -> bool {
        let had_tasks = !self.tasks.is_empty();
        self.tasks.clear();
        had_tasks
    }
}

/// Whether an executed-action label ends its task.
pub fn is_terminal_action(label: &str) -> bool {
    let label = label.to_ascii_lowercase();
    TERMINAL_ACTIONS
        .iter()
        .any(|terminal| label.contains(terminal))
}

fn update<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::stream::decoder::{SYSTEM_TASK_ID, UNKNOWN_THOUGHT_ID};

    fn event(task: &str, thought: &str, tag: &str, payload: Value) -> ReasoningEvent {
        ReasoningEvent {
            task_id: task.to_string(),
            thought_id: thought.to_string(),
            kind: EventKind::from_tag(tag),
            payload: Payload::from(payload),
        }
    }

    #[test]
    fn test_scenario_partial_pipeline_completes_task() {
        let mut tree = ReasoningTree::new();
        tree.apply(&event(
            "tk1",
            "th1",
            "thought_start",
            json!({"thought_content": "Reply to greeting"}),
        ));
        tree.apply(&event("tk1", "th1", "dma_results", json!({"csdma": {"score": 0.9}})));
        tree.apply(&event(
            "tk1",
            "th1",
            "action_result",
            json!({"action_executed": "task_complete"}),
        ));

        let task = tree.task("tk1").unwrap();
        assert!(task.complete);
        let thought = task.thought("th1").unwrap();
        assert_eq!(
            thought.completed_stages(),
            vec![Stage::Start, Stage::DomainAnalysis, Stage::Result]
        );
        assert!(!thought.is_completed(Stage::Context));
        assert!(!thought.is_completed(Stage::ConscienceCheck));
        assert_eq!(thought.content, "Reply to greeting");
        assert_eq!(thought.executed_action.as_deref(), Some("task_complete"));
        assert_eq!(thought.progress(), (3, 6));
        assert_eq!(thought.current_stage(), Some(Stage::Result));
    }

    #[test]
    fn test_latest_payload_wins_regardless_of_order() {
        let mut in_order = ReasoningTree::new();
        let mut reversed = ReasoningTree::new();
        let events = [
            event("t", "th", "snapshot_and_context", json!({"context": "a"})),
            event("t", "th", "dma_results", json!({"csdma": 1})),
            event("t", "th", "snapshot_and_context", json!({"context": "b"})),
        ];

        for e in &events {
            in_order.apply(e);
        }
        for e in [&events[1], &events[0], &events[2]] {
            reversed.apply(e);
        }

        for tree in [&in_order, &reversed] {
            let thought = tree.task("t").unwrap().thought("th").unwrap();
            assert_eq!(
                thought.stage(Stage::Context).unwrap().payload,
                Payload::from(json!({"context": "b"}))
            );
            assert!(thought.is_completed(Stage::DomainAnalysis));
        }
    }

    #[test]
    fn test_payload_is_replaced_not_merged() {
        let mut tree = ReasoningTree::new();
        tree.apply(&event("t", "th", "dma_results", json!({"csdma": 1, "dsdma": 2})));
        tree.apply(&event("t", "th", "dma_results", json!({"csdma": 3})));

        let stage = tree
            .task("t")
            .unwrap()
            .thought("th")
            .unwrap()
            .stage(Stage::DomainAnalysis)
            .unwrap();
        assert_eq!(stage.payload, Payload::from(json!({"csdma": 3})));
    }

    #[test]
    fn test_identical_event_changes_once() {
        let mut tree = ReasoningTree::new();
        let e = event("t", "th", "aspdma_result", json!({"selected_action": "speak"}));

        assert!(tree.apply(&e));
        assert!(!tree.apply(&e));
        assert_eq!(
            tree.task("t").unwrap().thought("th").unwrap().selected_action.as_deref(),
            Some("speak")
        );
    }

    #[test]
    fn test_replay_after_reconnect_keeps_single_thought() {
        let mut tree = ReasoningTree::new();
        let batch = [
            event("t", "th", "thought_start", json!({})),
            event("t", "th", "snapshot_and_context", json!({"context": "x"})),
        ];
        for e in &batch {
            tree.apply(e);
        }
        let replay_changed = batch.iter().fold(false, |acc, e| tree.apply(e) | acc);

        assert!(!replay_changed);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.task("t").unwrap().thought_count(), 1);
    }

    #[test]
    fn test_terminal_action_sets_complete_once() {
        let mut tree = ReasoningTree::new();
        let done = event(
            "t",
            "th",
            "action_result",
            json!({"action_executed": "HandlerActionType.TASK_REJECT"}),
        );

        assert!(tree.apply(&done));
        assert!(tree.task("t").unwrap().complete);
        assert!(!tree.apply(&done));
    }

    #[test]
    fn test_non_terminal_action_leaves_task_open() {
        let mut tree = ReasoningTree::new();
        tree.apply(&event("t", "th", "action_result", json!({"action_executed": "speak"})));
        assert!(!tree.task("t").unwrap().complete);
        assert!(is_terminal_action("task_complete"));
        assert!(!is_terminal_action("ponder"));
    }

    #[test]
    fn test_conscience_defaults_to_pass() {
        let mut tree = ReasoningTree::new();
        tree.apply(&event("t", "a", "conscience_result", json!({"final_action": "speak"})));
        tree.apply(&event("t", "b", "conscience_result", json!({"conscience_passed": false})));

        let task = tree.task("t").unwrap();
        assert_eq!(task.thought("a").unwrap().conscience_passed, Some(true));
        assert_eq!(task.thought("b").unwrap().conscience_passed, Some(false));
    }

    #[test]
    fn test_thought_start_sets_task_description() {
        let mut tree = ReasoningTree::new();
        tree.apply(&event(
            "t",
            "th",
            "thought_start",
            json!({"task_description": "Respond to user", "thought_content": ""}),
        ));

        let task = tree.task("t").unwrap();
        assert_eq!(task.description.as_deref(), Some("Respond to user"));
        assert_eq!(task.thought("th").unwrap().content, "");
    }

    #[test]
    fn test_placeholder_scopes_are_created() {
        let mut tree = ReasoningTree::new();
        assert!(tree.apply(&event(SYSTEM_TASK_ID, UNKNOWN_THOUGHT_ID, "dma_results", json!({}))));
        let task = tree.task(SYSTEM_TASK_ID).unwrap();
        assert!(task.thought(UNKNOWN_THOUGHT_ID).unwrap().is_completed(Stage::DomainAnalysis));
    }

    #[test]
    fn test_unknown_tag_only_creates_entities() {
        let mut tree = ReasoningTree::new();
        let e = event("t", "th", "round_complete", json!({"round": 4}));

        assert!(tree.apply(&e));
        assert!(!tree.apply(&e));
        let thought = tree.task("t").unwrap().thought("th").unwrap();
        assert_eq!(thought.stages().count(), 0);
    }

    #[test]
    fn test_thoughts_listed_in_arrival_order() {
        let mut tree = ReasoningTree::new();
        for id in ["zeta", "alpha", "mid"] {
            tree.apply(&event("t", id, "thought_start", json!({})));
        }
        let task = tree.task("t").unwrap();
        let ids: Vec<_> = task.thoughts().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["zeta", "alpha", "mid"]);
        assert_eq!(task.latest_thought().unwrap().id, "mid");
    }

    #[test]
    fn test_clear_resets_tree() {
        let mut tree = ReasoningTree::new();
        tree.apply(&event("t", "th", "thought_start", json!({})));
        assert!(tree.clear());
        assert!(tree.is_empty());
        assert!(!tree.clear());
        assert!(tree.apply(&event("t", "th", "thought_start", json!({}))));
    }
}
