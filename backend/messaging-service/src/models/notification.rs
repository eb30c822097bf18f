use super::identity::{UserKind, UserRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default lifetime of a notification
pub const DEFAULT_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    GradeUpdate,
    AttendanceAlert,
    ExamSchedule,
    ComplaintUpdate,
    MessageReceived,
    FeeReminder,
    SystemUpdate,
    Announcement,
    ParentMeeting,
    #[default]
    General,
}

impl NotificationType {
    pub const ALL: [NotificationType; 10] = [
        NotificationType::GradeUpdate,
        NotificationType::AttendanceAlert,
        NotificationType::ExamSchedule,
        NotificationType::ComplaintUpdate,
        NotificationType::MessageReceived,
        NotificationType::FeeReminder,
        NotificationType::SystemUpdate,
        NotificationType::Announcement,
        NotificationType::ParentMeeting,
        NotificationType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::GradeUpdate => "grade_update",
            NotificationType::AttendanceAlert => "attendance_alert",
            NotificationType::ExamSchedule => "exam_schedule",
            NotificationType::ComplaintUpdate => "complaint_update",
            NotificationType::MessageReceived => "message_received",
            NotificationType::FeeReminder => "fee_reminder",
            NotificationType::SystemUpdate => "system_update",
            NotificationType::Announcement => "announcement",
            NotificationType::ParentMeeting => "parent_meeting",
            NotificationType::General => "general",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown notification type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Originator of a notification; `user_id` is absent for system senders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSender {
    pub user_id: Option<Uuid>,
    pub user_type: UserKind,
    pub name: Option<String>,
}

impl NotificationSender {
    pub fn system() -> Self {
        Self {
            user_id: None,
            user_type: UserKind::System,
            name: Some("System".to_string()),
        }
    }

    pub fn user(user_id: Uuid, user_type: UserKind, name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            user_type,
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient: UserRef,
    pub sender: NotificationSender,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_data: Option<serde_json::Value>,
    pub expires_at: DateTime<Utc>,
    pub school_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Visible to its recipient only while unexpired
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Fully resolved notification ready to persist
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient: UserRef,
    pub sender: NotificationSender,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub action_url: Option<String>,
    pub action_data: Option<serde_json::Value>,
    pub expires_at: DateTime<Utc>,
    pub school_id: Uuid,
}

/// Optional filters for listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub notification_type: Option<NotificationType>,
    pub priority: Option<Priority>,
    pub read: Option<bool>,
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        self.notification_type
            .map_or(true, |t| notification.notification_type == t)
            && self.priority.map_or(true, |p| notification.priority == p)
            && self.read.map_or(true, |r| notification.read == r)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStat {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub count: u64,
    pub read_count: u64,
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityStat {
    pub priority: Priority,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub type_stats: Vec<TypeStat>,
    pub priority_stats: Vec<PriorityStat>,
}
