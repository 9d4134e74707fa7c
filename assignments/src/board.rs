//! Assignment board.
//!
//! New assignments are numbered from a counter that only ever grows, so ids
//! are never reused after a delete.

use crate::error::BoardError;
use brainstorm_core::{environment::Clock, reducer::Reducer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One card on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Board-local id
    pub id: u64,
    /// Title shown on the card
    pub title: String,
    /// When the card was created
    pub created_at: DateTime<Utc>,
}

/// Board state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    /// Cards in creation order
    pub assignments: Vec<Assignment>,
    /// Number given to the next card
    pub counter: u64,
    /// Selected card, if any
    pub selected: Option<u64>,
    /// Error from the last rejected action
    pub last_error: Option<BoardError>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self {
            assignments: Vec::new(),
            counter: 1,
            selected: None,
            last_error: None,
        }
    }
}

impl BoardState {
    /// Card by id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.id == id)
    }

    /// The selected card.
    #[must_use]
    pub fn selected(&self) -> Option<&Assignment> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Returns `true` when the board has no cards ("No assignments yet").
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Cards whose title contains `query`, ignoring case. An empty query matches all.
    #[must_use]
    pub fn filter(&self, query: &str) -> Vec<&Assignment> {
        let needle = query.trim().to_lowercase();
        self.assignments
            .iter()
            .filter(|a| needle.is_empty() || a.title.to_lowercase().contains(&needle))
            .collect()
    }
}

/// Board actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardAction {
    /// Add `New Assignment {n}`
    Create,
    /// Select a card
    Select {
        /// Card id
        id: u64,
    },
    /// Clear the selection
    ClearSelection,
    /// Change a card's title
    Rename {
        /// Card id
        id: u64,
        /// New title
        title: String,
    },
    /// Remove a card
    Delete {
        /// Card id
        id: u64,
    },
}

/// Dependencies of the board reducer.
#[derive(Clone)]
pub struct BoardEnvironment {
    /// Stamps new cards
    pub clock: Arc<dyn Clock>,
}

impl BoardEnvironment {
    /// Environment with the given clock.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

/// Reducer for [`BoardState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardReducer;

impl BoardReducer {
    fn apply(state: &mut BoardState, action: BoardAction, env: &BoardEnvironment) -> Result<(), BoardError> {
        match action {
            BoardAction::Create => {
                let id = state.counter;
                state.assignments.push(Assignment {
                    id,
                    title: format!("New Assignment {id}"),
                    created_at: env.clock.now(),
                });
                state.counter += 1;
                tracing::debug!(id, "Assignment created");
            },
            BoardAction::Select { id } => {
                if state.get(id).is_none() {
                    return Err(BoardError::AssignmentNotFound(id));
                }
                state.selected = Some(id);
            },
            BoardAction::ClearSelection => state.selected = None,
            BoardAction::Rename { id, title } => {
                let title = title.trim();
                if title.is_empty() {
                    return Err(BoardError::EmptyTitle);
                }
                let assignment = state
                    .assignments
                    .iter_mut()
                    .find(|a| a.id == id)
                    .ok_or(BoardError::AssignmentNotFound(id))?;
                assignment.title = title.to_string();
            },
            BoardAction::Delete { id } => {
                let before = state.assignments.len();
                state.assignments.retain(|a| a.id != id);
                if state.assignments.len() == before {
                    return Err(BoardError::AssignmentNotFound(id));
                }
                if state.selected == Some(id) {
                    state.selected = None;
                }
                tracing::debug!(id, "Assignment deleted");
            },
        }
        Ok(())
    }
}

impl Reducer for BoardReducer {
    type State = BoardState;
    type Action = BoardAction;
    type Environment = BoardEnvironment;

    fn reduce(&self, state: &mut Self::State, action: Self::Action, env: &Self::Environment) {
        state.last_error = Self::apply(state, action, env).err();
        if let Some(error) = &state.last_error {
            tracing::debug!(%error, "Board action rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainstorm_testing::{epoch, test_clock, ManualClock, ReducerTest};
    use chrono::Duration;

    fn env() -> BoardEnvironment {
        BoardEnvironment::new(Arc::new(test_clock()))
    }

    #[test]
    fn test_create_numbers_from_counter() {
        ReducerTest::new(BoardReducer)
            .with_env(env())
            .given_state(BoardState::default())
            .when_actions([BoardAction::Create, BoardAction::Create])
            .then_state(|state| {
                let titles: Vec<_> = state.assignments.iter().map(|a| a.title.as_str()).collect();
                assert_eq!(titles, vec!["New Assignment 1", "New Assignment 2"]);
                assert_eq!(state.counter, 3);
                assert!(!state.is_empty());
            })
            .run();
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        ReducerTest::new(BoardReducer)
            .with_env(env())
            .given_state(BoardState::default())
            .when_actions([
                BoardAction::Create,
                BoardAction::Delete { id: 1 },
                BoardAction::Create,
            ])
            .then_state(|state| {
                assert_eq!(state.assignments.len(), 1);
                assert_eq!(state.assignments[0].id, 2);
                assert_eq!(state.assignments[0].title, "New Assignment 2");
            })
            .run();
    }

    #[test]
    fn test_delete_clears_selection() {
        ReducerTest::new(BoardReducer)
            .with_env(env())
            .given_state(BoardState::default())
            .when_actions([
                BoardAction::Create,
                BoardAction::Select { id: 1 },
                BoardAction::Delete { id: 1 },
            ])
            .then_state(|state| {
                assert!(state.selected.is_none());
                assert!(state.is_empty());
                assert!(state.last_error.is_none());
            })
            .run();
    }

    #[test]
    fn test_rename_rejects_blank_title() {
        ReducerTest::new(BoardReducer)
            .with_env(env())
            .given_state(BoardState::default())
            .when_actions([
                BoardAction::Create,
                BoardAction::Rename {
                    id: 1,
                    title: "   ".into(),
                },
            ])
            .then_state(|state| {
                assert_eq!(state.last_error, Some(BoardError::EmptyTitle));
                assert_eq!(state.assignments[0].title, "New Assignment 1");
            })
            .run();
    }

    #[test]
    fn test_select_unknown_is_rejected() {
        ReducerTest::new(BoardReducer)
            .with_env(env())
            .given_state(BoardState::default())
            .when_action(BoardAction::Select { id: 9 })
            .then_state(|state| {
                assert_eq!(state.last_error, Some(BoardError::AssignmentNotFound(9)));
                assert!(state.selected.is_none());
            })
            .run();
    }

    #[test]
    fn test_cards_are_stamped_when_created() {
        let clock = ManualClock::new(epoch());
        let env = BoardEnvironment::new(Arc::new(clock.clone()));
        let mut state = BoardState::default();

        BoardReducer.reduce(&mut state, BoardAction::Create, &env);
        clock.advance(Duration::hours(1));
        BoardReducer.reduce(&mut state, BoardAction::Create, &env);
        clock.advance(Duration::hours(1));
        BoardReducer.reduce(
            &mut state,
            BoardAction::Rename {
                id: 1,
                title: "Essay".into(),
            },
            &env,
        );

        let stamps: Vec<_> = state.assignments.iter().map(|a| a.created_at - epoch()).collect();
        assert_eq!(stamps, vec![Duration::zero(), Duration::hours(1)]);
    }

    #[test]
    fn test_filter_ignores_case() {
        let mut state = BoardState::default();
        for _ in 0..3 {
            BoardReducer.reduce(&mut state, BoardAction::Create, &env());
        }
        BoardReducer.reduce(
            &mut state,
            BoardAction::Rename {
                id: 2,
                title: "Proposal draft".into(),
            },
            &env(),
        );

        assert_eq!(state.filter("PROPOSAL").len(), 1);
        assert_eq!(state.filter("new assignment").len(), 2);
        assert_eq!(state.filter("").len(), 3);
        assert!(state.filter("exam").is_empty());
    }
}
