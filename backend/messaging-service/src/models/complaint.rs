use super::identity::UserKind;
use super::notification::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintCategory {
    Academic,
    Behavioral,
    Attendance,
    Homework,
    Communication,
    Facilities,
    #[default]
    Other,
}

impl ComplaintCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintCategory::Academic => "academic",
            ComplaintCategory::Behavioral => "behavioral",
            ComplaintCategory::Attendance => "attendance",
            ComplaintCategory::Homework => "homework",
            ComplaintCategory::Communication => "communication",
            ComplaintCategory::Facilities => "facilities",
            ComplaintCategory::Other => "other",
        }
    }
}

impl FromStr for ComplaintCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "academic" => Ok(ComplaintCategory::Academic),
            "behavioral" => Ok(ComplaintCategory::Behavioral),
            "attendance" => Ok(ComplaintCategory::Attendance),
            "homework" => Ok(ComplaintCategory::Homework),
            "communication" => Ok(ComplaintCategory::Communication),
            "facilities" => Ok(ComplaintCategory::Facilities),
            "other" => Ok(ComplaintCategory::Other),
            other => Err(format!("unknown complaint category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
    Rejected,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Open => "open",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Closed => "closed",
            ComplaintStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ComplaintStatus::Open),
            "in_progress" => Ok(ComplaintStatus::InProgress),
            "resolved" => Ok(ComplaintStatus::Resolved),
            "closed" => Ok(ComplaintStatus::Closed),
            "rejected" => Ok(ComplaintStatus::Rejected),
            other => Err(format!("unknown complaint status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complainant {
    pub user_id: Uuid,
    pub user_type: UserKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: Uuid,
    pub complainant: Complainant,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: Priority,
    pub status: ComplaintStatus,
    pub conversation_id: Uuid,
    pub school_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub complainant: Complainant,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: Priority,
    pub conversation_id: Uuid,
    pub school_id: Uuid,
}

/// Which complaints a caller may list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintScope {
    /// Addressed to this teacher
    Teacher(Uuid),
    /// Filed by this student or parent
    Complainant(Uuid),
    /// Everything in the school
    School(Uuid),
}
