// Timeline playback: ordered steps, per-step events, and the playback state machine
// idle -> exploring | guided <-> gated -> complete.
// At most one auto-advance timer is pending at any time; gated and idle never hold one.

use std::cell::Cell;
use std::collections::{BTreeSet, HashSet};
use std::rc::Rc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::deck::{Effect, SlideDeck, Trigger};
use crate::error::EngineError;
use crate::legacy::LegacyProject;
use crate::migration::{MigrationEngine, ProjectSource};
use crate::types::*;

/// Time source for auto-advance deadlines.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Clock moved by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.0.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.0.get())
    }
}

/// One effect placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEvent {
    pub interaction_id: String,
    /// Owning element. `None` only for events built by hand.
    pub element_id: Option<String>,
    pub step: u32,
    /// Position in the source list; ties within a step keep this order.
    pub order: usize,
    pub effect: Effect,
}

/// Steps and the events bound to them.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Vec<StepEvent>,
    steps: BTreeSet<u32>,
}

impl Timeline {
    pub fn new(mut events: Vec<StepEvent>) -> Self {
        events.sort_by_key(|e| e.order);
        let steps = events.iter().map(|e| e.step).collect();
        Timeline { events, steps }
    }

    /// Step-triggered interactions of every slide. Within a step, interactions keep their
    /// recorded sequence, then document order. Step 0 is not a step and is left out.
    pub fn from_deck(deck: &SlideDeck) -> Self {
        let mut keyed = Vec::new();
        for element in deck.elements() {
            for interaction in &element.interactions {
                let Trigger::OnStep { step, sequence } = interaction.trigger else {
                    continue;
                };
                if step == 0 {
                    debug!("Interaction '{}' is bound to step 0, ignoring", interaction.id);
                    continue;
                }
                keyed.push((
                    sequence,
                    StepEvent {
                        interaction_id: interaction.id.clone(),
                        element_id: Some(element.id.clone()),
                        step,
                        order: 0,
                        effect: interaction.effect.clone(),
                    },
                ));
            }
        }
        // Stable: equal sequences stay in document order.
        keyed.sort_by_key(|(sequence, _)| *sequence);
        let events = keyed
            .into_iter()
            .enumerate()
            .map(|(order, (_, event))| StepEvent { order, ..event })
            .collect();
        Timeline::new(events)
    }

    /// Legacy project played without persisting a deck. Runs the same conversion as
    /// migration, so dangling targets are dropped and effects are anchored the same way.
    pub fn from_legacy(
        project: &LegacyProject,
        engine: &MigrationEngine,
        options: &MigrationOptions,
    ) -> Result<Self, EngineError> {
        let result = engine.migrate_legacy(project, "playback", options)?;
        Ok(Timeline::from_deck(result.slide_deck()))
    }

    pub fn from_source(
        source: &ProjectSource,
        engine: &MigrationEngine,
        options: &MigrationOptions,
    ) -> Result<Self, EngineError> {
        match source {
            ProjectSource::Deck(deck) => Ok(Timeline::from_deck(deck)),
            ProjectSource::Legacy(project) => Timeline::from_legacy(project, engine, options),
        }
    }

    /// Add steps that have no events; they are still presented.
    pub fn with_empty_steps(mut self, steps: impl IntoIterator<Item = u32>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Distinct steps, ascending.
    pub fn steps_in_order(&self) -> Vec<u32> {
        self.steps.iter().copied().collect()
    }

    /// Events of `step` in source order. No priority by effect type.
    pub fn events_for_step(&self, step: u32) -> Vec<&StepEvent> {
        self.events.iter().filter(|e| e.step == step).collect()
    }

    /// Longest duration override among the step's events, else `default_ms`.
    pub fn step_duration_ms(&self, step: u32, default_ms: u64) -> u64 {
        self.events
            .iter()
            .filter(|e| e.step == step)
            .filter_map(|e| e.effect.duration_ms)
            .max()
            .unwrap_or(default_ms)
    }

    pub fn events(&self) -> &[StepEvent] {
        &self.events
    }
}

/// Playback state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    Idle,
    Exploring,
    Guided,
    Gated,
    Complete,
}

/// Sent to the observer on every transition, including step changes within a state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub from: PlaybackState,
    pub to: PlaybackState,
    pub previous_step: Option<u32>,
    pub step: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    NotStarted,
    /// An unanswered blocking quiz holds the current step.
    Gated,
    /// Guided tours only move forward one step at a time.
    GuidedOrder,
    UnknownStep,
    Complete,
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum NavOutcome {
    Moved { step: u32 },
    Completed,
    Rejected { reason: RejectReason },
}

impl NavOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, NavOutcome::Rejected { .. })
    }

    fn rejected(reason: RejectReason) -> Self {
        NavOutcome::Rejected { reason }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuizOutcome {
    Correct,
    Incorrect,
    Skipped,
    SkipNotAllowed,
    /// No quiz with that interaction id on the current step.
    NotActive,
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    deadline: Timestamp,
    step_index: usize,
}

pub type StateObserver = Box<dyn FnMut(&StateChange)>;

/// Drives playback over a [`Timeline`].
pub struct TimelineScheduler {
    timeline: Timeline,
    steps: Vec<u32>,
    config: PlaybackConfig,
    clock: Box<dyn Clock>,
    mode: PlaybackMode,
    state: PlaybackState,
    cursor: Option<usize>,
    satisfied: HashSet<String>,
    timer: Option<PendingTimer>,
    observer: Option<StateObserver>,
}

impl TimelineScheduler {
    pub fn new(timeline: Timeline, config: PlaybackConfig, clock: impl Clock + 'static) -> Self {
        TimelineScheduler {
            steps: timeline.steps_in_order(),
            timeline,
            config,
            clock: Box::new(clock),
            mode: PlaybackMode::Exploring,
            state: PlaybackState::Idle,
            cursor: None,
            satisfied: HashSet::new(),
            timer: None,
            observer: None,
        }
    }

    /// Single observer; replaces any previous one.
    pub fn on_state_change(&mut self, observer: impl FnMut(&StateChange) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn steps_in_order(&self) -> &[u32] {
        &self.steps
    }

    pub fn events_for_step(&self, step: u32) -> Vec<&StepEvent> {
        self.timeline.events_for_step(step)
    }

    pub fn current_step(&self) -> Option<u32> {
        self.cursor.map(|i| self.steps[i])
    }

    /// Deadline of the pending auto-advance, if any.
    pub fn pending_deadline(&self) -> Option<Timestamp> {
        self.timer.map(|t| t.deadline)
    }

    /// Events to render now. Empty while idle or complete.
    pub fn active_events(&self) -> Vec<&StepEvent> {
        match (self.state, self.current_step()) {
            (PlaybackState::Idle | PlaybackState::Complete, _) | (_, None) => Vec::new(),
            (_, Some(step)) => self.timeline.events_for_step(step),
        }
    }

    pub fn active_effects(&self) -> Vec<&Effect> {
        self.active_events().into_iter().map(|e| &e.effect).collect()
    }

    /// Begin playback at the first step. Restarts from scratch if already running.
    pub fn start(&mut self, mode: PlaybackMode) -> NavOutcome {
        self.cancel_timer();
        self.satisfied.clear();
        self.mode = mode;
        if self.steps.is_empty() {
            self.transition(PlaybackState::Complete, None);
            return NavOutcome::Completed;
        }
        self.enter_step(0)
    }

    /// Move to the next step, or complete after the last one.
    pub fn advance(&mut self) -> NavOutcome {
        match self.state {
            PlaybackState::Idle => self.reject("advance", RejectReason::NotStarted),
            PlaybackState::Complete => self.reject("advance", RejectReason::Complete),
            PlaybackState::Gated => self.reject("advance", RejectReason::Gated),
            PlaybackState::Exploring | PlaybackState::Guided => self.step_forward(),
        }
    }

    /// Go to `step`. Free while exploring; in guided playback backward is always allowed
    /// and forward only with `allow_seeking`, never past an unanswered blocking quiz.
    pub fn jump_to(&mut self, step: u32) -> NavOutcome {
        if self.state == PlaybackState::Idle {
            return self.reject("jump", RejectReason::NotStarted);
        }
        let Ok(target) = self.steps.binary_search(&step) else {
            return self.reject("jump", RejectReason::UnknownStep);
        };
        let current = self.cursor.unwrap_or(0);
        let forward = self.state != PlaybackState::Complete && target > current;
        if !forward || !self.mode.is_guided() {
            return self.enter_step(target);
        }

        if self.state == PlaybackState::Gated {
            return self.reject("jump", RejectReason::Gated);
        }
        if !self.config.allow_seeking {
            return self.reject("jump", RejectReason::GuidedOrder);
        }
        if (current..target).any(|index| self.is_gated_at(index)) {
            return self.reject("jump", RejectReason::Gated);
        }
        self.enter_step(target)
    }

    /// Answer the quiz `interaction_id` on the current step.
    pub fn answer_quiz(&mut self, interaction_id: &str, answer: usize) -> QuizOutcome {
        let Some(quiz) = self.active_quiz(interaction_id) else {
            return QuizOutcome::NotActive;
        };
        if !quiz.accepts(answer) {
            debug!("Quiz '{}' answered incorrectly ({})", interaction_id, answer);
            return QuizOutcome::Incorrect;
        }
        self.satisfy(interaction_id);
        QuizOutcome::Correct
    }

    /// Skip a quiz that allows it; counts as satisfied for gating.
    pub fn skip_quiz(&mut self, interaction_id: &str) -> QuizOutcome {
        let Some(quiz) = self.active_quiz(interaction_id) else {
            return QuizOutcome::NotActive;
        };
        if !quiz.allow_skip {
            return QuizOutcome::SkipNotAllowed;
        }
        self.satisfy(interaction_id);
        QuizOutcome::Skipped
    }

    /// Fire the auto-advance timer if its deadline has passed.
    pub fn tick(&mut self) -> Option<NavOutcome> {
        let timer = self.timer?;
        if self.clock.now() < timer.deadline {
            return None;
        }
        self.timer = None;
        if self.state != PlaybackState::Guided || self.cursor != Some(timer.step_index) {
            return None;
        }
        Some(self.step_forward())
    }

    /// Back to idle: timer, gate state and position cleared.
    pub fn reset(&mut self) {
        self.cancel_timer();
        self.satisfied.clear();
        self.transition(PlaybackState::Idle, None);
    }

    /// Teardown when the playback view closes. Nothing keeps running afterwards.
    pub fn close(&mut self) {
        self.reset();
    }

    fn reject(&self, action: &str, reason: RejectReason) -> NavOutcome {
        debug!("Rejected {} in {:?}: {:?}", action, self.state, reason);
        NavOutcome::rejected(reason)
    }

    fn step_forward(&mut self) -> NavOutcome {
        self.cancel_timer();
        let next = self.cursor.map_or(0, |i| i + 1);
        if next >= self.steps.len() {
            self.transition(PlaybackState::Complete, self.cursor);
            return NavOutcome::Completed;
        }
        self.enter_step(next)
    }

    fn enter_step(&mut self, index: usize) -> NavOutcome {
        self.cancel_timer();
        let state = if !self.mode.is_guided() {
            PlaybackState::Exploring
        } else if self.is_gated_at(index) {
            PlaybackState::Gated
        } else {
            PlaybackState::Guided
        };
        self.transition(state, Some(index));
        self.schedule_timer();
        NavOutcome::Moved {
            step: self.steps[index],
        }
    }

    /// Unsatisfied blocking quiz on the step at `index`, when completion is enforced.
    fn is_gated_at(&self, index: usize) -> bool {
        self.config.enforce_quiz_completion
            && self
                .timeline
                .events_for_step(self.steps[index])
                .iter()
                .any(|e| e.effect.blocks_advance() && !self.satisfied.contains(&e.interaction_id))
    }

    fn active_quiz(&self, interaction_id: &str) -> Option<crate::deck::QuizParameters> {
        self.active_events()
            .into_iter()
            .find(|e| e.interaction_id == interaction_id)
            .and_then(|e| e.effect.as_quiz().cloned())
    }

    fn satisfy(&mut self, interaction_id: &str) {
        self.satisfied.insert(interaction_id.to_string());
        if let (PlaybackState::Gated, Some(index)) = (self.state, self.cursor) {
            if !self.is_gated_at(index) {
                self.transition(PlaybackState::Guided, Some(index));
                self.schedule_timer();
            }
        }
    }

    /// Start the auto-advance timer for the current step, replacing any pending one.
    fn schedule_timer(&mut self) {
        self.cancel_timer();
        if self.mode != PlaybackMode::Timed || self.state != PlaybackState::Guided {
            return;
        }
        let Some(index) = self.cursor else {
            return;
        };
        let duration = self
            .timeline
            .step_duration_ms(self.steps[index], self.config.default_step_duration_ms);
        self.timer = Some(PendingTimer {
            deadline: self.clock.now().plus_millis(duration),
            step_index: index,
        });
    }

    fn cancel_timer(&mut self) {
        self.timer = None;
    }

    fn transition(&mut self, to: PlaybackState, cursor: Option<usize>) {
        let change = StateChange {
            from: self.state,
            to,
            previous_step: self.current_step(),
            step: cursor.map(|i| self.steps[i]),
        };
        self.state = to;
        self.cursor = cursor;
        if change.from == change.to && change.previous_step == change.step {
            return;
        }
        debug!(
            "Playback {:?} -> {:?} (step {:?} -> {:?})",
            change.from, change.to, change.previous_step, change.step
        );
        if let Some(observer) = self.observer.as_mut() {
            observer(&change);
        }
    }
}

// =============================================================================
// WASM Bindings
// =============================================================================

/// Wall clock of the host page.
struct JsClock;

impl Clock for JsClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(js_sys::Date::now().max(0.0) as u64)
    }
}

/// WASM-exposed scheduler. Accepts either project shape; outcomes come back as JSON.
///
/// # Example
/// ```json
/// { "outcome": "rejected", "reason": "gated" }
/// ```
#[wasm_bindgen]
pub struct WasmScheduler {
    inner: TimelineScheduler,
}

impl WasmScheduler {
    pub(crate) fn from_parts(
        project_json: &str,
        engine: &MigrationEngine,
        options: &MigrationOptions,
        config: PlaybackConfig,
    ) -> Result<WasmScheduler, JsValue> {
        let timeline = ProjectSource::from_json(project_json)
            .and_then(|source| Timeline::from_source(&source, engine, options))
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmScheduler {
            inner: TimelineScheduler::new(timeline, config, JsClock),
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
impl WasmScheduler {
    /// Create a scheduler from a project (legacy or slide deck) and a playback config.
    #[wasm_bindgen(constructor)]
    pub fn new(project_json: &str, config_json: &str) -> Result<WasmScheduler, JsValue> {
        let config: PlaybackConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid playback config: {}", e)))?;
        Self::from_parts(
            project_json,
            &MigrationEngine::default(),
            &MigrationOptions::default(),
            config,
        )
    }

    /// `mode` is `"exploring"`, `"selfPaced"` or `"timed"`.
    pub fn start(&mut self, mode: &str) -> Result<String, JsValue> {
        let mode: PlaybackMode = serde_json::from_value(serde_json::Value::String(mode.to_string()))
            .map_err(|e| JsValue::from_str(&format!("Invalid playback mode: {}", e)))?;
        to_json(&self.inner.start(mode))
    }

    pub fn advance(&mut self) -> Result<String, JsValue> {
        to_json(&self.inner.advance())
    }

    pub fn jump_to(&mut self, step: u32) -> Result<String, JsValue> {
        to_json(&self.inner.jump_to(step))
    }

    pub fn answer_quiz(&mut self, interaction_id: &str, answer: usize) -> Result<String, JsValue> {
        to_json(&self.inner.answer_quiz(interaction_id, answer))
    }

    pub fn skip_quiz(&mut self, interaction_id: &str) -> Result<String, JsValue> {
        to_json(&self.inner.skip_quiz(interaction_id))
    }

    /// Call from the host loop; returns the outcome when the timer fired.
    pub fn tick(&mut self) -> Result<Option<String>, JsValue> {
        self.inner.tick().map(|outcome| to_json(&outcome)).transpose()
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn close(&mut self) {
        self.inner.close();
    }

    pub fn state(&self) -> String {
        match self.inner.state() {
            PlaybackState::Idle => "idle",
            PlaybackState::Exploring => "exploring",
            PlaybackState::Guided => "guided",
            PlaybackState::Gated => "gated",
            PlaybackState::Complete => "complete",
        }
        .to_string()
    }

    pub fn current_step(&self) -> Option<u32> {
        self.inner.current_step()
    }

    pub fn steps_in_order(&self) -> Vec<u32> {
        self.inner.steps_in_order().to_vec()
    }

    /// Active step events (interaction id, element id, effect) as JSON.
    pub fn active_effects(&self) -> Result<String, JsValue> {
        to_json(&self.inner.active_events())
    }

    /// Milliseconds since epoch of the pending auto-advance.
    pub fn pending_deadline(&self) -> Option<f64> {
        self.inner.pending_deadline().map(|t| t.as_millis() as f64)
    }

    /// Register the single observer; it receives each transition as a JSON string.
    /// A throwing observer is logged and does not stop playback.
    pub fn on_state_change(&mut self, callback: js_sys::Function) {
        self.inner.on_state_change(move |change| {
            let json = match serde_json::to_string(change) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Could not serialize state change: {}", e);
                    return;
                }
            };
            if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                warn!("State change observer threw: {:?}", err);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::*;
    use std::cell::RefCell;

    fn text(id: &str, step: u32, order: usize) -> StepEvent {
        StepEvent {
            interaction_id: id.into(),
            element_id: None,
            step,
            order,
            effect: Effect {
                id: format!("{}-fx", id),
                duration_ms: None,
                parameters: EffectKind::Text.default_parameters(),
            },
        }
    }

    fn quiz(id: &str, step: u32, order: usize) -> StepEvent {
        StepEvent {
            effect: Effect {
                id: format!("{}-fx", id),
                duration_ms: None,
                parameters: EffectParameters::Quiz(QuizParameters {
                    question: "Which valve?".into(),
                    options: vec!["Left".into(), "Right".into()],
                    correct_answer: Some(1),
                    ..Default::default()
                }),
            },
            ..text(id, step, order)
        }
    }

    fn scheduler(events: Vec<StepEvent>, config: PlaybackConfig) -> (TimelineScheduler, ManualClock) {
        let clock = ManualClock::new();
        let scheduler = TimelineScheduler::new(Timeline::new(events), config, clock.clone());
        (scheduler, clock)
    }

    #[test]
    fn steps_are_sorted_and_distinct() {
        let timeline = Timeline::new(vec![text("a", 1, 0), text("b", 3, 1), text("c", 3, 2), text("d", 2, 3)]);
        assert_eq!(timeline.steps_in_order(), vec![1, 2, 3]);
    }

    #[test]
    fn empty_steps_are_kept() {
        let timeline = Timeline::new(vec![text("a", 1, 0)]).with_empty_steps([4, 2]);
        assert_eq!(timeline.steps_in_order(), vec![1, 2, 4]);
        assert!(timeline.events_for_step(2).is_empty());
    }

    #[test]
    fn events_for_step_keep_source_order() {
        let timeline = Timeline::new(vec![quiz("q", 1, 2), text("t", 1, 0), text("u", 2, 1)]);
        let ids: Vec<&str> = timeline.events_for_step(1).iter().map(|e| e.interaction_id.as_str()).collect();
        assert_eq!(ids, vec!["t", "q"]);
    }

    #[test]
    fn longest_duration_governs_step() {
        let mut long = text("a", 1, 0);
        long.effect.duration_ms = Some(5000);
        let mut short = text("b", 1, 1);
        short.effect.duration_ms = Some(1000);
        let timeline = Timeline::new(vec![long, short, text("c", 2, 2)]);
        assert_eq!(timeline.step_duration_ms(1, 3000), 5000);
        assert_eq!(timeline.step_duration_ms(2, 3000), 3000);
    }

    #[test]
    fn self_paced_walks_to_complete() {
        let (mut s, _) = scheduler(vec![text("a", 1, 0), text("b", 2, 1)], PlaybackConfig::default());
        assert_eq!(s.advance(), NavOutcome::rejected(RejectReason::NotStarted));
        assert_eq!(s.start(PlaybackMode::SelfPaced), NavOutcome::Moved { step: 1 });
        assert_eq!(s.state(), PlaybackState::Guided);
        assert!(s.pending_deadline().is_none());
        assert_eq!(s.advance(), NavOutcome::Moved { step: 2 });
        assert_eq!(s.advance(), NavOutcome::Completed);
        assert_eq!(s.state(), PlaybackState::Complete);
        assert!(s.active_effects().is_empty());
        assert_eq!(s.advance(), NavOutcome::rejected(RejectReason::Complete));
    }

    #[test]
    fn timed_mode_auto_advances() {
        let (mut s, clock) = scheduler(vec![text("a", 1, 0), text("b", 2, 1)], PlaybackConfig::default());
        s.start(PlaybackMode::Timed);
        assert_eq!(s.pending_deadline(), Some(Timestamp::from_millis(3000)));
        clock.advance(2999);
        assert_eq!(s.tick(), None);
        clock.advance(1);
        assert_eq!(s.tick(), Some(NavOutcome::Moved { step: 2 }));
        assert_eq!(s.pending_deadline(), Some(Timestamp::from_millis(6000)));
        clock.advance(3000);
        assert_eq!(s.tick(), Some(NavOutcome::Completed));
        assert!(s.pending_deadline().is_none());
    }

    #[test]
    fn manual_advance_cancels_pending_timer() {
        let (mut s, clock) = scheduler(
            vec![text("a", 1, 0), text("b", 2, 1), text("c", 3, 2)],
            PlaybackConfig::default(),
        );
        s.start(PlaybackMode::Timed);
        clock.advance(2000);
        assert_eq!(s.advance(), NavOutcome::Moved { step: 2 });
        assert_eq!(s.pending_deadline(), Some(Timestamp::from_millis(5000)));
        clock.advance(1500);
        // The step-1 deadline (3000) has passed but was replaced.
        assert_eq!(s.tick(), None);
        assert_eq!(s.current_step(), Some(2));
    }

    #[test]
    fn timed_quiz_gates_until_answered() {
        let (mut s, clock) = scheduler(vec![quiz("q", 1, 0), text("b", 2, 1)], PlaybackConfig::default());
        s.start(PlaybackMode::Timed);
        assert_eq!(s.state(), PlaybackState::Gated);
        assert!(s.pending_deadline().is_none());

        clock.advance(10_000);
        assert_eq!(s.tick(), None);
        assert_eq!(s.state(), PlaybackState::Gated);
        assert_eq!(s.advance(), NavOutcome::rejected(RejectReason::Gated));
        assert_eq!(s.jump_to(2), NavOutcome::rejected(RejectReason::Gated));

        assert_eq!(s.answer_quiz("q", 0), QuizOutcome::Incorrect);
        assert_eq!(s.state(), PlaybackState::Gated);
        assert_eq!(s.answer_quiz("q", 1), QuizOutcome::Correct);
        assert_eq!(s.state(), PlaybackState::Guided);
        assert_eq!(s.pending_deadline(), Some(Timestamp::from_millis(13_000)));

        clock.advance(3000);
        assert_eq!(s.tick(), Some(NavOutcome::Moved { step: 2 }));
    }

    #[test]
    fn answered_quiz_does_not_gate_on_review() {
        let (mut s, _) = scheduler(vec![quiz("q", 1, 0), text("b", 2, 1)], PlaybackConfig::default());
        s.start(PlaybackMode::SelfPaced);
        s.answer_quiz("q", 1);
        s.advance();
        assert_eq!(s.jump_to(1), NavOutcome::Moved { step: 1 });
        assert_eq!(s.state(), PlaybackState::Guided);
    }

    #[test]
    fn skip_requires_permission() {
        let mut skippable = quiz("s", 1, 0);
        if let EffectParameters::Quiz(q) = &mut skippable.effect.parameters {
            q.allow_skip = true;
        }
        let (mut s, _) = scheduler(vec![quiz("q", 1, 0), skippable, text("b", 2, 2)], PlaybackConfig::default());
        s.start(PlaybackMode::SelfPaced);
        assert_eq!(s.skip_quiz("q"), QuizOutcome::SkipNotAllowed);
        assert_eq!(s.skip_quiz("s"), QuizOutcome::Skipped);
        assert_eq!(s.state(), PlaybackState::Gated);
        assert_eq!(s.answer_quiz("q", 1), QuizOutcome::Correct);
        assert_eq!(s.state(), PlaybackState::Guided);
        assert_eq!(s.answer_quiz("b", 0), QuizOutcome::NotActive);
    }

    #[test]
    fn quiz_completion_can_be_disabled() {
        let config = PlaybackConfig {
            enforce_quiz_completion: false,
            ..Default::default()
        };
        let (mut s, _) = scheduler(vec![quiz("q", 1, 0), text("b", 2, 1)], config);
        s.start(PlaybackMode::SelfPaced);
        assert_eq!(s.state(), PlaybackState::Guided);
        assert_eq!(s.advance(), NavOutcome::Moved { step: 2 });
    }

    #[test]
    fn guided_jumps_only_backward() {
        let (mut s, _) = scheduler(
            vec![text("a", 1, 0), text("b", 2, 1), text("c", 3, 2)],
            PlaybackConfig::default(),
        );
        s.start(PlaybackMode::SelfPaced);
        assert_eq!(s.jump_to(3), NavOutcome::rejected(RejectReason::GuidedOrder));
        s.advance();
        s.advance();
        assert_eq!(s.jump_to(1), NavOutcome::Moved { step: 1 });
        assert_eq!(s.jump_to(9), NavOutcome::rejected(RejectReason::UnknownStep));
    }

    #[test]
    fn review_after_completion_is_allowed() {
        let (mut s, _) = scheduler(vec![text("a", 1, 0), text("b", 2, 1)], PlaybackConfig::default());
        s.start(PlaybackMode::SelfPaced);
        s.advance();
        s.advance();
        assert_eq!(s.state(), PlaybackState::Complete);
        assert_eq!(s.jump_to(2), NavOutcome::Moved { step: 2 });
        assert_eq!(s.state(), PlaybackState::Guided);
    }

    #[test]
    fn seeking_never_skips_blocking_quiz() {
        let config = PlaybackConfig {
            allow_seeking: true,
            ..Default::default()
        };
        let (mut s, _) = scheduler(
            vec![text("a", 1, 0), quiz("q", 2, 1), text("c", 3, 2), text("d", 4, 3)],
            config,
        );
        s.start(PlaybackMode::SelfPaced);
        assert_eq!(s.jump_to(2), NavOutcome::Moved { step: 2 });
        assert_eq!(s.state(), PlaybackState::Gated);
        s.jump_to(1);
        assert_eq!(s.jump_to(4), NavOutcome::rejected(RejectReason::Gated));
        s.jump_to(2);
        s.answer_quiz("q", 1);
        assert_eq!(s.jump_to(4), NavOutcome::Moved { step: 4 });
    }

    #[test]
    fn exploring_moves_freely_without_gates() {
        let (mut s, _) = scheduler(
            vec![quiz("q", 1, 0), text("b", 2, 1), text("c", 3, 2)],
            PlaybackConfig::default(),
        );
        s.start(PlaybackMode::Exploring);
        assert_eq!(s.state(), PlaybackState::Exploring);
        assert_eq!(s.jump_to(3), NavOutcome::Moved { step: 3 });
        assert_eq!(s.jump_to(1), NavOutcome::Moved { step: 1 });
        assert!(s.pending_deadline().is_none());
        assert_eq!(s.advance(), NavOutcome::Moved { step: 2 });
    }

    #[test]
    fn reset_and_close_return_to_idle() {
        let (mut s, clock) = scheduler(vec![text("a", 1, 0), text("b", 2, 1)], PlaybackConfig::default());
        s.start(PlaybackMode::Timed);
        s.close();
        assert_eq!(s.state(), PlaybackState::Idle);
        assert!(s.pending_deadline().is_none());
        assert_eq!(s.current_step(), None);
        clock.advance(10_000);
        assert_eq!(s.tick(), None);
        assert_eq!(s.jump_to(1), NavOutcome::rejected(RejectReason::NotStarted));
    }

    #[test]
    fn empty_timeline_completes_immediately() {
        let (mut s, _) = scheduler(Vec::new(), PlaybackConfig::default());
        assert_eq!(s.start(PlaybackMode::Timed), NavOutcome::Completed);
        assert_eq!(s.state(), PlaybackState::Complete);
    }

    #[test]
    fn observer_sees_every_transition() {
        let (mut s, _) = scheduler(vec![quiz("q", 1, 0), text("b", 2, 1)], PlaybackConfig::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        s.on_state_change(move |change| sink.borrow_mut().push(change.clone()));

        s.start(PlaybackMode::SelfPaced);
        s.advance(); // rejected, no transition
        s.answer_quiz("q", 1);
        s.advance();
        s.advance();
        s.reset();

        let states: Vec<(PlaybackState, Option<u32>)> = seen.borrow().iter().map(|c| (c.to, c.step)).collect();
        assert_eq!(
            states,
            vec![
                (PlaybackState::Gated, Some(1)),
                (PlaybackState::Guided, Some(1)),
                (PlaybackState::Guided, Some(2)),
                (PlaybackState::Complete, Some(2)),
                (PlaybackState::Idle, None),
            ]
        );
    }

    fn legacy_hotspot(id: &str, x: f64, y: f64) -> crate::legacy::LegacyHotspot {
        crate::legacy::LegacyHotspot {
            id: id.into(),
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    fn legacy_event(id: &str, step: u32, kind: &str, target: &str) -> crate::legacy::LegacyTimelineEvent {
        crate::legacy::LegacyTimelineEvent {
            id: id.into(),
            step: Some(step),
            event_type: kind.into(),
            target_id: Some(target.into()),
            ..Default::default()
        }
    }

    fn migrated_deck(project: &LegacyProject) -> SlideDeck {
        MigrationEngine::default()
            .migrate_legacy(project, "p", &MigrationOptions::default())
            .unwrap()
            .into_slide_deck()
    }

    #[test]
    fn legacy_and_deck_timelines_replay_the_same_events() {
        let project = LegacyProject {
            hotspots: vec![legacy_hotspot("h1", 30.0, 60.0), legacy_hotspot("h2", 80.0, 80.0)],
            timeline_events: vec![
                legacy_event("first", 1, "SHOW_TEXT", "h2"),
                legacy_event("second", 1, "SPOTLIGHT", "h1"),
                legacy_event("lost", 2, "SHOW_TEXT", "ghost"),
            ],
            ..Default::default()
        };
        let from_deck = Timeline::from_deck(&migrated_deck(&project));
        let from_legacy =
            Timeline::from_legacy(&project, &MigrationEngine::default(), &MigrationOptions::default()).unwrap();

        let ids: Vec<&str> = from_deck.events_for_step(1).iter().map(|e| e.interaction_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(from_deck.events()[0].element_id.as_deref(), Some("h2"));
        assert_eq!(from_legacy.steps_in_order(), vec![1]);
        assert_eq!(from_legacy.events(), from_deck.events());

        let EffectParameters::Spotlight(spotlight) = &from_legacy.events()[1].effect.parameters else {
            panic!("expected a spotlight");
        };
        assert_eq!(spotlight.center, Some(crate::types::PercentPoint::new(30.0, 60.0)));
    }

    #[test]
    fn step_zero_interactions_are_ignored() {
        let project = LegacyProject {
            hotspots: vec![legacy_hotspot("h1", 50.0, 50.0)],
            timeline_events: vec![
                legacy_event("kept", 1, "SHOW_TEXT", "h1"),
                legacy_event("zero", 2, "SHOW_TEXT", "h1"),
            ],
            ..Default::default()
        };
        let mut deck = migrated_deck(&project);
        let interactions = &mut deck.slides[0].elements[0].interactions;
        interactions[1].trigger = Trigger::OnStep { step: 0, sequence: 1 };

        let timeline = Timeline::from_deck(&deck);
        assert_eq!(timeline.steps_in_order(), vec![1]);
        assert_eq!(timeline.events().len(), 1);
        assert_eq!(timeline.events()[0].interaction_id, "kept");
    }

    #[test]
    fn wasm_scheduler_from_legacy_json() {
        let project = r#"{
            "hotspots": [{"id": "h1", "x": 50, "y": 50}],
            "timelineEvents": [
                {"id": "e1", "step": 1, "type": "SHOW_TEXT", "targetId": "h1"},
                {"id": "e2", "step": 3, "type": "SHOW_TEXT", "targetId": "h1"}
            ]
        }"#;
        let mut scheduler = WasmScheduler::new(project, "{}").expect("Should parse valid project");
        assert_eq!(scheduler.steps_in_order(), vec![1, 3]);
        assert_eq!(scheduler.state(), "idle");
        assert_eq!(scheduler.start("selfPaced").unwrap(), r#"{"outcome":"moved","step":1}"#);
        assert_eq!(scheduler.jump_to(3).unwrap(), r#"{"outcome":"rejected","reason":"guidedOrder"}"#);
        assert_eq!(scheduler.advance().unwrap(), r#"{"outcome":"moved","step":3}"#);
        assert_eq!(scheduler.current_step(), Some(3));
        assert!(scheduler.active_effects().unwrap().contains("\"interactionId\":\"e2\""));
        assert_eq!(scheduler.tick().unwrap(), None);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Action {
            Advance,
            Jump(u32),
            Answer(usize),
            Tick(u64),
        }

        fn action_strategy() -> impl Strategy<Value = Action> {
            prop_oneof![
                Just(Action::Advance),
                (1u32..8).prop_map(Action::Jump),
                (0usize..3).prop_map(Action::Answer),
                (0u64..5000).prop_map(Action::Tick),
            ]
        }

        proptest! {
            /// Property: steps come out strictly ascending for any raw step list.
            #[test]
            fn steps_strictly_ascending(raw in prop::collection::vec(1u32..50, 0..40)) {
                let events = raw.iter().enumerate().map(|(i, s)| text(&format!("e{}", i), *s, i)).collect();
                let steps = Timeline::new(events).steps_in_order();
                prop_assert!(steps.windows(2).all(|w| w[0] < w[1]));
                let distinct: BTreeSet<u32> = raw.iter().copied().collect();
                prop_assert_eq!(steps.len(), distinct.len());
            }

            /// Property: while the current step holds an unanswered blocking quiz, advance
            /// and forward jumps are rejected and the step never moves forward.
            #[test]
            fn gated_step_never_moves_forward(
                quiz_steps in prop::collection::btree_set(1u32..8, 1..4),
                timed in any::<bool>(),
                seeking in any::<bool>(),
                actions in prop::collection::vec(action_strategy(), 1..40),
            ) {
                let mut events: Vec<StepEvent> = (1u32..8).map(|s| text(&format!("t{}", s), s, s as usize * 2)).collect();
                events.extend(quiz_steps.iter().map(|s| quiz(&format!("q{}", s), *s, *s as usize * 2 + 1)));
                let config = PlaybackConfig { allow_seeking: seeking, ..Default::default() };
                let (mut s, clock) = scheduler(events, config);
                s.start(if timed { PlaybackMode::Timed } else { PlaybackMode::SelfPaced });

                for action in actions {
                    let gated_before = s.state() == PlaybackState::Gated;
                    let step_before = s.current_step();
                    let outcome = match action {
                        Action::Advance => Some(s.advance()),
                        Action::Jump(step) => Some(s.jump_to(step)),
                        Action::Answer(answer) => {
                            if let Some(step) = s.current_step() {
                                s.answer_quiz(&format!("q{}", step), answer);
                            }
                            None
                        }
                        Action::Tick(ms) => {
                            clock.advance(ms);
                            s.tick()
                        }
                    };
                    if gated_before {
                        prop_assert!(s.pending_deadline().is_none() || s.state() != PlaybackState::Gated);
                        if let (Some(before), Some(after), Some(outcome)) = (step_before, s.current_step(), outcome) {
                            prop_assert!(after <= before);
                            if let Action::Advance = action {
                                prop_assert!(outcome.is_rejected());
                            }
                        }
                    }
                    if s.state() == PlaybackState::Gated {
                        prop_assert!(s.pending_deadline().is_none());
                    }
                }
            }
        }
    }
}
