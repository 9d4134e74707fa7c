//! Error types for the assignment board and collaboration panel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Board and panel failures.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardError {
    /// No assignment with this id.
    #[error("Assignment {0} not found")]
    AssignmentNotFound(u64),

    /// Titles must contain something other than whitespace.
    #[error("Assignment title cannot be empty")]
    EmptyTitle,

    /// No collaborator with this id.
    #[error("Collaborator {0} not found")]
    CollaboratorNotFound(String),

    /// A collaborator with this id is already on the panel.
    #[error("Collaborator {0} already exists")]
    DuplicateCollaborator(String),

    /// The panel already has its owner.
    #[error("Assignment already has an owner")]
    OwnerAlreadyPresent,

    /// The owner cannot leave.
    #[error("The owner cannot be removed")]
    CannotRemoveOwner,
}
