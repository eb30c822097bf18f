use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of actor referenced by participants, senders and recipients
///
/// Serialized lowercase; parsing from JSON, tokens and columns is
/// case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum UserKind {
    Admin,
    Teacher,
    Student,
    Parent,
    /// Automated senders only; never a recipient or participant
    System,
}

impl UserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserKind::Admin => "admin",
            UserKind::Teacher => "teacher",
            UserKind::Student => "student",
            UserKind::Parent => "parent",
            UserKind::System => "system",
        }
    }

    /// Admin, teacher, student or parent
    pub fn is_role(&self) -> bool {
        !matches!(self, UserKind::System)
    }

    /// Parse a role that may own conversations and receive notifications
    pub fn parse_role(raw: &str) -> AppResult<Self> {
        match raw.parse::<UserKind>() {
            Ok(kind) if kind.is_role() => Ok(kind),
            _ => Err(AppError::validation(format!(
                "invalid user type '{raw}', expected one of admin, teacher, student, parent"
            ))),
        }
    }
}

impl fmt::Display for UserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserKind::Admin),
            "teacher" => Ok(UserKind::Teacher),
            "student" => Ok(UserKind::Student),
            "parent" => Ok(UserKind::Parent),
            "system" => Ok(UserKind::System),
            other => Err(format!("unknown user kind: {other}")),
        }
    }
}

impl TryFrom<String> for UserKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Typed reference to a user, e.g. a notification recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: Uuid,
    pub user_type: UserKind,
}

impl UserRef {
    pub fn new(user_id: Uuid, user_type: UserKind) -> Self {
        Self { user_id, user_type }
    }
}

/// Authenticated caller of every operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: UserKind,
    pub name: String,
    pub school_id: Uuid,
}

impl Principal {
    pub fn user_ref(&self) -> UserRef {
        UserRef::new(self.id, self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserKind::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin role required"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_rejects_system() {
        assert_eq!(UserKind::parse_role("Teacher").unwrap(), UserKind::Teacher);
        assert!(UserKind::parse_role("system").is_err());
        assert!(UserKind::parse_role("janitor").is_err());
    }

    #[test]
    fn test_json_and_from_str_agree_on_case() {
        let from_json: UserKind = serde_json::from_value(serde_json::json!("Teacher")).unwrap();
        assert_eq!(from_json, "Teacher".parse::<UserKind>().unwrap());
        assert_eq!(from_json, UserKind::Teacher);
        assert!(serde_json::from_value::<UserKind>(serde_json::json!("janitor")).is_err());
        assert_eq!(serde_json::to_value(UserKind::Teacher).unwrap(), "teacher");
    }

    #[test]
    fn test_user_ref_wire_format() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(UserRef::new(id, UserKind::Parent)).unwrap();
        assert_eq!(json["userId"], id.to_string());
        assert_eq!(json["userType"], "parent");
    }

    #[test]
    fn test_require_admin() {
        let mut principal = Principal {
            id: Uuid::new_v4(),
            role: UserKind::Teacher,
            name: "T. Ngata".to_string(),
            school_id: Uuid::new_v4(),
        };
        assert!(matches!(principal.require_admin(), Err(AppError::Forbidden(_))));
        principal.role = UserKind::Admin;
        assert!(principal.require_admin().is_ok());
    }
}
