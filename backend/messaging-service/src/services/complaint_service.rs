use super::conversation_service::{participant_from, ConversationService};
use super::notification_service::{NotificationDraft, NotificationService};
use crate::error::{AppError, AppResult};
use crate::models::{
    Complainant, Complaint, ComplaintCategory, ComplaintScope, NewComplaint, NotificationSender,
    NotificationType, Page, PageRequest, Participant, Principal, Priority, UserKind, UserRef,
};
use crate::repository::ComplaintRepository;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FileComplaint {
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub title: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: Priority,
}

#[derive(Clone)]
pub struct ComplaintService {
    repo: Arc<dyn ComplaintRepository>,
    conversations: ConversationService,
    notifications: NotificationService,
}

impl ComplaintService {
    pub fn new(
        repo: Arc<dyn ComplaintRepository>,
        conversations: ConversationService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            repo,
            conversations,
            notifications,
        }
    }

    /// Opens a complaint thread with the teacher, stores the complaint and
    /// notifies the teacher
    pub async fn file(&self, principal: &Principal, request: FileComplaint) -> AppResult<Complaint> {
        if !matches!(principal.role, UserKind::Student | UserKind::Parent) {
            return Err(AppError::forbidden(
                "Only students and parents can file complaints",
            ));
        }
        if request.teacher_id == principal.id {
            return Err(AppError::validation("teacherId must differ from the complainant"));
        }
        let title = non_empty("title", &request.title)?;
        let description = non_empty("description", &request.description)?;
        let teacher_name = non_empty("teacherName", &request.teacher_name)?;

        let teacher = Participant {
            user_id: request.teacher_id,
            user_type: UserKind::Teacher,
            name: teacher_name,
            role: UserKind::Teacher.as_str().to_string(),
        };
        let conversation = self
            .conversations
            .open_complaint_thread(participant_from(principal), teacher, &title)
            .await?;

        let complaint = self
            .repo
            .insert(NewComplaint {
                complainant: Complainant {
                    user_id: principal.id,
                    user_type: principal.role,
                    name: principal.name.clone(),
                },
                student_id: request.student_id,
                teacher_id: request.teacher_id,
                title,
                description,
                category: request.category,
                priority: request.priority,
                conversation_id: conversation.id,
                school_id: principal.school_id,
            })
            .await?;
        info!(
            complaint_id = %complaint.id,
            teacher_id = %complaint.teacher_id,
            category = complaint.category.as_str(),
            "complaint filed"
        );

        let priority = if complaint.priority == Priority::Urgent {
            Priority::Urgent
        } else {
            Priority::Medium
        };
        let draft = NotificationDraft {
            recipient: UserRef::new(complaint.teacher_id, UserKind::Teacher),
            sender: NotificationSender::user(principal.id, principal.role, &principal.name),
            title: "New Complaint Filed".to_string(),
            message: format!("{} has filed a complaint: {}", principal.name, complaint.title),
            notification_type: NotificationType::ComplaintUpdate,
            priority: Some(priority),
            action_url: Some(format!("/complaints/{}", complaint.id)),
            action_data: Some(json!({ "complaintId": complaint.id })),
            expires_at: None,
            school_id: principal.school_id,
        };
        if let Err(e) = self.notifications.create(draft).await {
            warn!(complaint_id = %complaint.id, error = %e, "complaint notification failed");
        }

        Ok(complaint)
    }

    /// Teachers see complaints addressed to them, students and parents their
    /// own, admins the whole school
    pub async fn list(&self, principal: &Principal, page: PageRequest) -> AppResult<Page<Complaint>> {
        let scope = match principal.role {
            UserKind::Teacher => ComplaintScope::Teacher(principal.id),
            UserKind::Student | UserKind::Parent => ComplaintScope::Complainant(principal.id),
            UserKind::Admin => ComplaintScope::School(principal.school_id),
            UserKind::System => return Err(AppError::forbidden("System users cannot list complaints")),
        };
        self.repo.list(scope, page).await
    }
}

fn non_empty(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation {
            message: "Validation failed".to_string(),
            errors: vec![format!("{field}: must not be empty")],
        });
    }
    Ok(trimmed.to_string())
}
