use super::identity::{UserKind, UserRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    #[default]
    Direct,
    Group,
    Complaint,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Direct => "direct",
            ConversationType::Group => "group",
            ConversationType::Complaint => "complaint",
        }
    }

    /// Complaint threads are opened per complaint and never looked up by members
    pub fn is_reusable(&self) -> bool {
        !matches!(self, ConversationType::Complaint)
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ConversationType::Direct),
            "group" => Ok(ConversationType::Group),
            "complaint" => Ok(ConversationType::Complaint),
            other => Err(format!("unknown conversation type: {other}")),
        }
    }
}

/// Member of a conversation; also the shape of a message sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: Uuid,
    pub user_type: UserKind,
    pub name: String,
    /// Display role, e.g. "Class Teacher"
    pub role: String,
}

impl Participant {
    pub fn user_ref(&self) -> UserRef {
        UserRef::new(self.user_id, self.user_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub subject: Option<String>,
    pub participants: Vec<Participant>,
    pub last_message_id: Option<Uuid>,
    pub last_message_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    pub fn other_participants(&self, user_id: Uuid) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(move |p| p.user_id != user_id)
    }
}

/// Conversation list entry with the caller's unread count
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub unread_count: u64,
}

/// Data for a conversation that does not exist yet
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub conversation_type: ConversationType,
    pub subject: Option<String>,
    pub participants: Vec<Participant>,
}

impl NewConversation {
    /// Drops repeated user ids, keeping the first occurrence
    pub fn new(
        conversation_type: ConversationType,
        subject: Option<String>,
        participants: Vec<Participant>,
    ) -> Self {
        let mut unique: Vec<Participant> = Vec::with_capacity(participants.len());
        for participant in participants {
            if !unique.iter().any(|p| p.user_id == participant.user_id) {
                unique.push(participant);
            }
        }
        Self {
            conversation_type,
            subject: subject
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            participants: unique,
        }
    }

    pub fn participant_key(&self) -> String {
        participant_key(self.participants.iter().map(|p| p.user_id))
    }
}

/// Order-independent identity of a participant set
pub fn participant_key(ids: impl IntoIterator<Item = Uuid>) -> String {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
