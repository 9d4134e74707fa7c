//! # Brainstorm Assignments
//!
//! Local state for the task screens: the assignment board (create, select,
//! rename, delete, search) and the collaboration panel of one assignment.
//!
//! Neither is persisted; both live for as long as the screen that owns them.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod board;
pub mod collab;
pub mod error;

pub use board::{Assignment, BoardAction, BoardEnvironment, BoardReducer, BoardState};
pub use collab::{AssignmentDetails, CollabPanel, Collaborator, CollaboratorRole, SharePayload};
pub use error::BoardError;
