//! Action scheduling
//!
//! Two queues live on the session state:
//! - the sequential queue, where only the front entry's timer advances and a
//!   zero-duration entry hands over to the next one within the same update
//! - the parallel list, where every entry's timer advances independently
//!
//! Entries carry an optional action (none means a plain wait) that runs the
//! first time the entry reaches the front (sequential) or completes (parallel).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::actions::Action;
use super::state::State;
use super::timer::Timer;

/// Sequential entries processed in one update before the chain is declared runaway
pub const MAX_CHAIN_ITERATIONS: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AutomationError {
    #[error("automation chain exceeded {limit} iterations in one update")]
    ChainLimitExceeded { limit: usize },
}

/// Queue entry identifier, unique within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

#[derive(Debug, Clone)]
pub struct AutomatedAction {
    pub id: EntryId,
    pub timer: Timer,
    pub action: Option<Action>,
}

impl AutomatedAction {
    pub fn new(id: EntryId, action: Option<Action>, duration_ms: f32) -> Self {
        Self {
            id,
            timer: Timer::new(duration_ms),
            action,
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.timer.update(dt);
    }

    pub fn is_complete(&self) -> bool {
        self.timer.is_complete()
    }
}

/// Append to the sequential queue. `None` enqueues a plain wait.
pub fn enqueue_action(state: &mut State, action: Option<Action>, duration_ms: f32) -> EntryId {
    let id = state.next_entry_id();
    state
        .actions
        .push_back(AutomatedAction::new(id, action, duration_ms));
    id
}

/// Add to the parallel list; the action runs once `delay_ms` has elapsed
pub fn add_parallel_action(state: &mut State, action: Action, delay_ms: f32) -> EntryId {
    let id = state.next_entry_id();
    state
        .parallel_actions
        .push(AutomatedAction::new(id, Some(action), delay_ms));
    id
}

/// Longest remaining time among pending parallel entries (0 when empty)
pub fn longest_pending_parallel(state: &State) -> f32 {
    state
        .parallel_actions
        .iter()
        .map(|entry| entry.timer.remaining())
        .fold(0.0, f32::max)
}

/// Insert into the sequential queue behind `owner`, after the `insert_count`
/// entries already inserted there. An owner not in the queue (parallel, or
/// already popped) inserts from the front.
pub fn insert_action(
    state: &mut State,
    owner: EntryId,
    insert_count: &mut usize,
    action: Option<Action>,
    duration_ms: f32,
) {
    let start = state
        .actions
        .iter()
        .position(|entry| entry.id == owner)
        .map_or(0, |i| i + 1);
    let index = (start + *insert_count).min(state.actions.len());
    let id = state.next_entry_id();
    state
        .actions
        .insert(index, AutomatedAction::new(id, action, duration_ms));
    *insert_count += 1;
}

/// Advance both queues by `dt` (scaled milliseconds).
///
/// Fails when zero-duration entries chain past `MAX_CHAIN_ITERATIONS` in a
/// single call; the queue is left as it was at the failing entry.
pub fn update_automations(state: &mut State, dt: f32) -> Result<(), AutomationError> {
    update_sequential(state, dt)?;
    update_parallel(state, dt);
    Ok(())
}

fn update_sequential(state: &mut State, dt: f32) -> Result<(), AutomationError> {
    let mut iterations = 0;
    while let Some(front) = state.actions.front_mut() {
        iterations += 1;
        if iterations > MAX_CHAIN_ITERATIONS {
            log::error!("Automation chain exceeded {MAX_CHAIN_ITERATIONS} iterations");
            return Err(AutomationError::ChainLimitExceeded {
                limit: MAX_CHAIN_ITERATIONS,
            });
        }

        let id = front.id;
        if let Some(mut action) = front.action.take() {
            action.execute(state, id);
            if let Some(entry) = state.actions.iter_mut().find(|e| e.id == id) {
                entry.action = Some(action);
            }
        }

        let Some(index) = state.actions.iter().position(|e| e.id == id) else {
            continue;
        };
        let entry = &mut state.actions[index];
        entry.update(dt);
        if !entry.is_complete() {
            break;
        }
        let zero_duration = entry.timer.duration == 0.0;
        state.actions.remove(index);
        if !zero_duration {
            break;
        }
    }
    Ok(())
}

fn update_parallel(state: &mut State, dt: f32) {
    let mut due = Vec::new();
    for mut entry in std::mem::take(&mut state.parallel_actions) {
        entry.update(dt);
        if entry.is_complete() {
            due.push(entry);
        } else {
            state.parallel_actions.push(entry);
        }
    }

    // Entries added while executing wait for the next update
    for mut entry in due {
        if let Some(action) = entry.action.as_mut() {
            action.execute(state, entry.id);
        }
    }
}
