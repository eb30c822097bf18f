use crate::error::{AppError, AppResult};
use crate::models::{
    Conversation, ConversationSummary, ConversationType, NewConversation, Page, PageRequest,
    Participant, Principal, UserKind,
};
use crate::repository::{ConversationRepository, MessageRepository};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Counterpart supplied when starting a conversation
#[derive(Debug, Clone)]
pub struct StartConversation {
    pub participant_id: Uuid,
    pub participant_type: UserKind,
    pub participant_name: String,
    /// Display role; defaults to the participant's user type
    pub participant_role: Option<String>,
    pub conversation_type: ConversationType,
    pub subject: Option<String>,
}

#[derive(Clone)]
pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
}

impl ConversationService {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
    ) -> Self {
        Self {
            conversations,
            messages,
        }
    }

    /// Idempotent per (type, participant set). Complaint threads are always new.
    pub async fn get_or_create(
        &self,
        principal: &Principal,
        request: StartConversation,
    ) -> AppResult<Conversation> {
        if request.participant_id == principal.id {
            return Err(AppError::validation("cannot start a conversation with yourself"));
        }
        if !request.participant_type.is_role() {
            return Err(AppError::validation(format!(
                "invalid participant type '{}'",
                request.participant_type
            )));
        }
        let participant_name = request.participant_name.trim();
        if participant_name.is_empty() {
            return Err(AppError::validation("participant name is required"));
        }

        let counterpart = Participant {
            user_id: request.participant_id,
            user_type: request.participant_type,
            name: participant_name.to_string(),
            role: request
                .participant_role
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| request.participant_type.as_str().to_string()),
        };
        let new = NewConversation::new(
            request.conversation_type,
            request.subject,
            vec![participant_from(principal), counterpart],
        );

        let conversation = if request.conversation_type.is_reusable() {
            self.conversations.find_or_create(new).await?
        } else {
            self.conversations.create(new).await?
        };
        debug!(
            conversation_id = %conversation.id,
            requester = %principal.id,
            conversation_type = conversation.conversation_type.as_str(),
            "conversation resolved"
        );
        Ok(conversation)
    }

    /// Active conversations with the caller's unread count per entry
    pub async fn list(
        &self,
        principal: &Principal,
        page: PageRequest,
    ) -> AppResult<Page<ConversationSummary>> {
        let conversations = self.conversations.list_active(principal.id, page).await?;
        let counts = try_join_all(
            conversations
                .items
                .iter()
                .map(|c| self.unread_in(c.id, principal.id)),
        )
        .await?;

        let mut counts = counts.into_iter();
        Ok(conversations.map(|conversation| ConversationSummary {
            conversation,
            unread_count: counts.next().unwrap_or_default(),
        }))
    }

    pub async fn unread_in(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<u64> {
        self.messages
            .count_unread(&[conversation_id], user_id)
            .await
    }

    /// The conversation if `user_id` participates; absence and lack of access
    /// are reported identically
    pub async fn require_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        self.conversations
            .find_for_participant(conversation_id, user_id)
            .await?
            .ok_or(AppError::NotFoundOrForbidden("Conversation"))
    }

    pub async fn participant_conversation_ids(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        self.conversations.ids_for_participant(user_id).await
    }

    pub async fn touch_last_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<()> {
        self.conversations
            .touch_last_message(conversation_id, message_id, at)
            .await
    }

    /// Fresh complaint thread between complainant and teacher
    pub async fn open_complaint_thread(
        &self,
        complainant: Participant,
        teacher: Participant,
        subject: &str,
    ) -> AppResult<Conversation> {
        let new = NewConversation::new(
            ConversationType::Complaint,
            Some(subject.to_string()),
            vec![complainant, teacher],
        );
        let conversation = self.conversations.create(new).await?;
        info!(conversation_id = %conversation.id, "complaint thread opened");
        Ok(conversation)
    }
}

/// The caller as a conversation participant
pub fn participant_from(principal: &Principal) -> Participant {
    Participant {
        user_id: principal.id,
        user_type: principal.role,
        name: principal.name.clone(),
        role: principal.role.as_str().to_string(),
    }
}
