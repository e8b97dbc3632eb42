//! Customer organization record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer organization that owns licenses.
///
/// Deleting an organization cascades to its licenses and their device
/// activations; the cascade is enforced by the entitlement store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Whether the organization is active.
    pub is_active: bool,

    /// Free-form notes.
    pub notes: Option<String>,
}

impl Organization {
    /// Create a new active organization.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_active: true,
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_organization_is_active() {
        let org = Organization::new("Acme Logistics");
        assert!(org.is_active);
        assert_eq!(org.name, "Acme Logistics");
    }
}
