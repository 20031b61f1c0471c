//! Acting users.

use crate::UserId;
use serde::{Deserialize, Serialize};

/// Who performed the audited unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditActor {
    /// An authenticated user.
    User {
        user_id: UserId,
        username: Option<String>,
    },
    /// A background task or daemon running without a user.
    System { component: String },
    /// No identity was available.
    Unknown,
}

impl AuditActor {
    /// Create a user actor.
    pub fn user(user_id: UserId) -> Self {
        Self::User {
            user_id,
            username: None,
        }
    }

    /// Create a user actor with a display name.
    pub fn named_user(user_id: UserId, username: impl Into<String>) -> Self {
        Self::User {
            user_id,
            username: Some(username.into()),
        }
    }

    /// Create a system actor.
    pub fn system(component: impl Into<String>) -> Self {
        Self::System {
            component: component.into(),
        }
    }

    /// Get a display identifier for this actor.
    pub fn identifier(&self) -> String {
        match self {
            Self::User { user_id, username } => {
                username.clone().unwrap_or_else(|| user_id.to_string())
            }
            Self::System { component } => format!("system:{}", component),
            Self::Unknown => "unknown".to_string(),
        }
    }
}

impl Default for AuditActor {
    fn default() -> Self {
        Self::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        let id = UserId::new();
        assert_eq!(AuditActor::user(id).identifier(), id.to_string());
        assert_eq!(AuditActor::named_user(id, "admin").identifier(), "admin");
        assert_eq!(AuditActor::system("scheduler").identifier(), "system:scheduler");
        assert_eq!(AuditActor::Unknown.identifier(), "unknown");
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(AuditActor::system("import")).unwrap();
        assert_eq!(json["type"], "system");
        assert_eq!(json["component"], "import");
    }
}
