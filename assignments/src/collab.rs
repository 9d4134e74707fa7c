//! Collaboration panel of a single assignment.

use crate::error::BoardError;
use serde::{Deserialize, Serialize};

/// Descriptive details shown at the top of the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDetails {
    /// Assignment title
    pub title: String,
    /// Course code, e.g. `CS 409-IT3251`
    pub course_code: String,
    /// Course name
    pub course_name: String,
    /// Academic term
    pub term: String,
    /// Instructor name
    pub instructor: String,
    /// Task label
    pub task: String,
    /// Review status
    pub status: String,
    /// Free-form description
    pub description: String,
    /// Author name
    pub author: String,
    /// Group members
    pub members: Vec<String>,
}

impl AssignmentDetails {
    /// Details with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// `code - name` course line.
    #[must_use]
    pub fn course_line(&self) -> String {
        format!("{} - {}", self.course_code, self.course_name)
    }

    /// Payload for the platform share sheet.
    #[must_use]
    pub fn share_payload(&self) -> SharePayload {
        SharePayload {
            title: self.title.clone(),
            message: format!("Check out our {}", self.title),
        }
    }
}

/// Content handed to the share sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    /// Share title
    pub title: String,
    /// Share message
    pub message: String,
}

/// Role of a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollaboratorRole {
    /// Created the assignment; exactly one per panel
    Owner,
    /// Can edit
    Editor,
    /// Read-only
    Viewer,
}

impl CollaboratorRole {
    /// Returns `true` if the role may edit the assignment.
    #[must_use]
    pub const fn can_edit(self) -> bool {
        matches!(self, Self::Owner | Self::Editor)
    }
}

impl std::fmt::Display for CollaboratorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Owner => "Owner",
            Self::Editor => "Editor",
            Self::Viewer => "Viewer",
        })
    }
}

/// Person working on the assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    /// Collaborator id
    pub id: String,
    /// Display name
    pub name: String,
    /// Role
    pub role: CollaboratorRole,
    /// Avatar URL
    pub photo_url: Option<String>,
}

/// Details plus collaborators of one assignment.
///
/// Holds exactly one owner, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollabPanel {
    details: AssignmentDetails,
    collaborators: Vec<Collaborator>,
}

impl CollabPanel {
    /// Panel owned by `owner`, whose role is forced to [`CollaboratorRole::Owner`].
    #[must_use]
    pub fn new(details: AssignmentDetails, mut owner: Collaborator) -> Self {
        owner.role = CollaboratorRole::Owner;
        Self {
            details,
            collaborators: vec![owner],
        }
    }

    /// Assignment details.
    #[must_use]
    pub const fn details(&self) -> &AssignmentDetails {
        &self.details
    }

    /// Collaborators, owner first.
    #[must_use]
    pub fn collaborators(&self) -> &[Collaborator] {
        &self.collaborators
    }

    /// The owner.
    #[must_use]
    pub fn owner(&self) -> Option<&Collaborator> {
        self.collaborators
            .iter()
            .find(|c| c.role == CollaboratorRole::Owner)
    }

    /// Add a collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::DuplicateCollaborator`] if the id is taken and
    /// [`BoardError::OwnerAlreadyPresent`] for a second owner.
    pub fn add(&mut self, collaborator: Collaborator) -> Result<(), BoardError> {
        if self.collaborators.iter().any(|c| c.id == collaborator.id) {
            return Err(BoardError::DuplicateCollaborator(collaborator.id));
        }
        if collaborator.role == CollaboratorRole::Owner {
            return Err(BoardError::OwnerAlreadyPresent);
        }
        tracing::debug!(id = %collaborator.id, role = %collaborator.role, "Collaborator added");
        self.collaborators.push(collaborator);
        Ok(())
    }

    /// Remove a collaborator and return it.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::CollaboratorNotFound`] for an unknown id and
    /// [`BoardError::CannotRemoveOwner`] for the owner.
    pub fn remove(&mut self, id: &str) -> Result<Collaborator, BoardError> {
        let index = self
            .collaborators
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| BoardError::CollaboratorNotFound(id.to_string()))?;
        if self.collaborators[index].role == CollaboratorRole::Owner {
            return Err(BoardError::CannotRemoveOwner);
        }
        Ok(self.collaborators.remove(index))
    }

    /// Share sheet payload for this assignment.
    #[must_use]
    pub fn share_payload(&self) -> SharePayload {
        self.details.share_payload()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn member(id: &str, role: CollaboratorRole) -> Collaborator {
        Collaborator {
            id: id.to_string(),
            name: id.to_uppercase(),
            role,
            photo_url: None,
        }
    }

    fn panel() -> CollabPanel {
        let details = AssignmentDetails {
            course_code: "CS 409-IT3251".into(),
            course_name: "Mobile Development".into(),
            ..AssignmentDetails::new("Final Project")
        };
        CollabPanel::new(details, member("ann", CollaboratorRole::Editor))
    }

    #[test]
    fn test_constructor_forces_owner_role() {
        let panel = panel();
        assert_eq!(panel.owner().map(|c| c.id.as_str()), Some("ann"));
        assert_eq!(panel.collaborators().len(), 1);
    }

    #[test]
    fn test_add_and_remove() {
        let mut panel = panel();
        panel.add(member("bob", CollaboratorRole::Viewer)).unwrap();

        let removed = panel.remove("bob").unwrap();

        assert_eq!(removed.role, CollaboratorRole::Viewer);
        assert_eq!(panel.collaborators().len(), 1);
    }

    #[test]
    fn test_owner_rules() {
        let mut panel = panel();

        assert_eq!(
            panel.add(member("cat", CollaboratorRole::Owner)),
            Err(BoardError::OwnerAlreadyPresent)
        );
        assert_eq!(panel.remove("ann"), Err(BoardError::CannotRemoveOwner));
        assert_eq!(
            panel.remove("nobody"),
            Err(BoardError::CollaboratorNotFound("nobody".into()))
        );
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut panel = panel();
        panel.add(member("bob", CollaboratorRole::Editor)).unwrap();

        let result = panel.add(member("bob", CollaboratorRole::Viewer));

        assert_eq!(result, Err(BoardError::DuplicateCollaborator("bob".into())));
        assert_eq!(panel.collaborators().len(), 2);
    }

    #[test]
    fn test_roles_and_share_payload() {
        assert!(CollaboratorRole::Owner.can_edit());
        assert!(CollaboratorRole::Editor.can_edit());
        assert!(!CollaboratorRole::Viewer.can_edit());

        let panel = panel();
        assert_eq!(panel.details().course_line(), "CS 409-IT3251 - Mobile Development");
        assert_eq!(
            panel.share_payload(),
            SharePayload {
                title: "Final Project".into(),
                message: "Check out our Final Project".into(),
            }
        );
    }
}
