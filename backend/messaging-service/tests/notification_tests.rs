mod common;

use chrono::{Duration, Utc};
use common::{cast, test_state};
use messaging_service::error::AppError;
use messaging_service::models::{
    ComplaintCategory, NotificationFilter, NotificationSender, NotificationType, PageRequest,
    Principal, Priority, UserKind, UserRef,
};
use messaging_service::services::{
    BroadcastRequest, FileComplaint, NotificationDraft, RecipientSpec,
};
use messaging_service::state::AppState;
use uuid::Uuid;

fn page() -> PageRequest {
    PageRequest::new(Some(1), Some(20), 20)
}

fn draft_for(recipient: &Principal, title: &str) -> NotificationDraft {
    NotificationDraft {
        recipient: recipient.user_ref(),
        sender: NotificationSender::system(),
        title: title.to_string(),
        message: format!("{title} details"),
        notification_type: NotificationType::General,
        priority: None,
        action_url: None,
        action_data: None,
        expires_at: None,
        school_id: recipient.school_id,
    }
}

fn broadcast_to(recipients: Vec<RecipientSpec>) -> BroadcastRequest {
    BroadcastRequest {
        recipients,
        title: "Snow day".to_string(),
        message: "School is closed tomorrow".to_string(),
        notification_type: NotificationType::Announcement,
        priority: Some(Priority::High),
        action_url: None,
        action_data: None,
    }
}

fn recipient(user_id: impl ToString, user_type: &str) -> RecipientSpec {
    RecipientSpec {
        user_id: user_id.to_string(),
        user_type: user_type.to_string(),
    }
}

async fn seed(state: &AppState, recipient: &Principal, titles: &[&str]) {
    for title in titles {
        state
            .notifications
            .create(draft_for(recipient, title))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_create_applies_defaults() {
    let state = test_state();
    let c = cast();

    let before = Utc::now();
    let notification = state
        .notifications
        .create(draft_for(&c.parent, "Fees due"))
        .await
        .unwrap();

    assert_eq!(notification.priority, Priority::Medium);
    assert!(!notification.read);
    assert!(notification.read_at.is_none());
    assert!(notification.expires_at >= before + Duration::days(30));
    assert!(notification.expires_at <= Utc::now() + Duration::days(30));
}

#[tokio::test]
async fn test_system_recipient_is_rejected() {
    let state = test_state();
    let c = cast();
    let mut draft = draft_for(&c.parent, "Ghost");
    draft.recipient = UserRef::new(Uuid::new_v4(), UserKind::System);

    let err = state.notifications.create(draft).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_expired_notifications_are_invisible_and_purged() {
    let state = test_state();
    let c = cast();
    seed(&state, &c.parent, &["Still current"]).await;

    let mut stale = draft_for(&c.parent, "Old news");
    stale.expires_at = Some(Utc::now() - Duration::minutes(1));
    let stale = state.notifications.create(stale).await.unwrap();

    let listed = state
        .notifications
        .list(&c.parent, NotificationFilter::default(), page())
        .await
        .unwrap();
    assert_eq!(listed.total, 1);
    assert!(listed.items.iter().all(|n| n.id != stale.id));
    assert_eq!(state.notifications.unread_count(&c.parent).await.unwrap(), 1);

    // Expired records can no longer be acted on
    let err = state
        .notifications
        .mark_read(&c.parent, stale.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFoundOrForbidden("Notification")));

    assert_eq!(state.notifications.purge_expired().await.unwrap(), 1);
    assert_eq!(state.notifications.purge_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_is_newest_first_and_filtered() {
    let state = test_state();
    let c = cast();
    seed(&state, &c.parent, &["First", "Second"]).await;
    let mut urgent = draft_for(&c.parent, "Lockdown drill");
    urgent.priority = Some(Priority::Urgent);
    urgent.notification_type = NotificationType::SystemUpdate;
    state.notifications.create(urgent).await.unwrap();
    // Someone else's notification never shows up
    seed(&state, &c.teacher, &["Staff meeting"]).await;

    let all = state
        .notifications
        .list(&c.parent, NotificationFilter::default(), page())
        .await
        .unwrap();
    let titles: Vec<&str> = all.items.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Lockdown drill", "Second", "First"]);

    let urgent_only = state
        .notifications
        .list(
            &c.parent,
            NotificationFilter {
                priority: Some(Priority::Urgent),
                ..Default::default()
            },
            page(),
        )
        .await
        .unwrap();
    assert_eq!(urgent_only.total, 1);
    assert_eq!(urgent_only.items[0].notification_type, NotificationType::SystemUpdate);
}

#[tokio::test]
async fn test_read_state_transitions() {
    let state = test_state();
    let c = cast();
    seed(&state, &c.parent, &["A", "B", "C"]).await;
    let listed = state
        .notifications
        .list(&c.parent, NotificationFilter::default(), page())
        .await
        .unwrap();
    let target = listed.items[0].id;

    // Another user's id reports not found
    let err = state
        .notifications
        .mark_read(&c.teacher, target)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFoundOrForbidden("Notification")));

    let read = state.notifications.mark_read(&c.parent, target).await.unwrap();
    assert!(read.read);
    assert!(read.read_at.is_some());
    assert_eq!(state.notifications.unread_count(&c.parent).await.unwrap(), 2);

    assert_eq!(state.notifications.mark_all_read(&c.parent).await.unwrap(), 2);
    assert_eq!(state.notifications.mark_all_read(&c.parent).await.unwrap(), 0);
    assert_eq!(state.notifications.unread_count(&c.parent).await.unwrap(), 0);

    let unread = state
        .notifications
        .list(
            &c.parent,
            NotificationFilter {
                read: Some(false),
                ..Default::default()
            },
            page(),
        )
        .await
        .unwrap();
    assert_eq!(unread.total, 0);
}

#[tokio::test]
async fn test_delete_is_owner_only() {
    let state = test_state();
    let c = cast();
    let notification = state
        .notifications
        .create(draft_for(&c.parent, "Library book overdue"))
        .await
        .unwrap();

    let err = state
        .notifications
        .delete(&c.teacher, notification.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFoundOrForbidden("Notification")));

    state
        .notifications
        .delete(&c.parent, notification.id)
        .await
        .unwrap();
    assert!(state
        .notifications
        .delete(&c.parent, notification.id)
        .await
        .is_err());
}

#[tokio::test]
async fn test_broadcast_requires_admin() {
    let state = test_state();
    let c = cast();

    let err = state
        .notifications
        .broadcast(&c.teacher, broadcast_to(vec![recipient(c.parent.id, "parent")]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = state
        .notifications
        .broadcast(&c.admin, broadcast_to(Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_broadcast_failures_stay_independent() {
    let state = test_state();
    let c = cast();

    let outcome = state
        .notifications
        .broadcast(
            &c.admin,
            broadcast_to(vec![
                recipient(c.parent.id, "parent"),
                recipient("not-a-uuid", "teacher"),
                recipient(c.teacher.id, "teacher"),
                recipient(c.outsider.id, "janitor"),
                recipient(c.outsider.id, "student"),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.count, 3);
    assert_eq!(outcome.notifications.len(), 3);
    let failed: Vec<usize> = outcome.failed.iter().map(|f| f.index).collect();
    assert_eq!(failed, vec![1, 3]);
    assert_eq!(outcome.failed[0].user_id, "not-a-uuid");

    for who in [&c.parent, &c.teacher, &c.outsider] {
        let listed = state
            .notifications
            .list(who, NotificationFilter::default(), page())
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
        let n = &listed.items[0];
        assert_eq!(n.title, "Snow day");
        assert_eq!(n.priority, Priority::High);
        assert_eq!(n.sender.user_id, Some(c.admin.id));
    }
}

#[tokio::test]
async fn test_admin_create_and_stats() {
    let state = test_state();
    let c = cast();

    let created = state
        .notifications
        .create_by_admin(&c.admin, draft_for(&c.parent, "Parent meeting"))
        .await
        .unwrap();
    assert_eq!(created.recipient, c.parent.user_ref());
    assert_eq!(created.sender.user_id, Some(c.admin.id));
    assert_eq!(created.sender.user_type, UserKind::Admin);

    let err = state
        .notifications
        .create_by_admin(&c.teacher, draft_for(&c.parent, "Parent meeting"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    seed(&state, &c.parent, &["Extra"]).await;
    state.notifications.mark_all_read(&c.parent).await.unwrap();

    let err = state.notifications.stats(&c.parent).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let stats = state.notifications.stats(&c.admin).await.unwrap();
    let general = stats
        .type_stats
        .iter()
        .find(|s| s.notification_type == NotificationType::General)
        .unwrap();
    assert_eq!(general.count, 2);
    assert_eq!(general.read_count, 2);
    assert_eq!(general.unread_count, 0);
}

#[tokio::test]
async fn test_complaint_opens_thread_and_notifies_teacher() {
    let state = test_state();
    let c = cast();

    let complaint = state
        .complaints
        .file(
            &c.parent,
            FileComplaint {
                student_id: Uuid::new_v4(),
                teacher_id: c.teacher.id,
                teacher_name: c.teacher.name.clone(),
                title: "Homework load".to_string(),
                description: "Four hours a night is too much".to_string(),
                category: ComplaintCategory::Homework,
                priority: Priority::Urgent,
            },
        )
        .await
        .unwrap();

    let thread = state
        .conversations
        .require_participant(complaint.conversation_id, c.teacher.id)
        .await
        .unwrap();
    assert!(thread.has_participant(c.parent.id));

    let inbox = state
        .notifications
        .list(&c.teacher, NotificationFilter::default(), page())
        .await
        .unwrap();
    assert_eq!(inbox.total, 1);
    assert_eq!(inbox.items[0].notification_type, NotificationType::ComplaintUpdate);
    assert_eq!(inbox.items[0].priority, Priority::Urgent);
    assert_eq!(
        inbox.items[0].message,
        "Dana Reyes has filed a complaint: Homework load"
    );

    let teacher_view = state.complaints.list(&c.teacher, page()).await.unwrap();
    assert_eq!(teacher_view.total, 1);
    let admin_view = state.complaints.list(&c.admin, page()).await.unwrap();
    assert_eq!(admin_view.total, 1);
}

#[tokio::test]
async fn test_teachers_cannot_file_complaints() {
    let state = test_state();
    let c = cast();

    let err = state
        .complaints
        .file(
            &c.teacher,
            FileComplaint {
                student_id: Uuid::new_v4(),
                teacher_id: Uuid::new_v4(),
                teacher_name: "Mr. Brandt".to_string(),
                title: "Noise".to_string(),
                description: "Room 12 is loud".to_string(),
                category: ComplaintCategory::Facilities,
                priority: Priority::Low,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}
