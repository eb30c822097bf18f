//! In-process store used for `STORAGE_BACKEND=memory` and the test-suite.
//!
//! A single `RwLock` guards all collections, so every trait method is atomic
//! with respect to every other.

use super::{ComplaintRepository, ConversationRepository, MessageRepository, NotificationRepository};
use crate::error::AppResult;
use crate::models::{
    Complaint, ComplaintScope, ComplaintStatus, Conversation, DailyCount, Message, NewComplaint,
    NewConversation, NewMessage, NewNotification, Notification, NotificationFilter,
    NotificationStats, NotificationType, Page, PageRequest, Priority, PriorityStat, ReadReceipt,
    TypeStat, UserRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

struct Stored<T> {
    seq: u64,
    value: T,
}

#[derive(Default)]
struct MemoryState {
    seq: u64,
    conversations: HashMap<Uuid, Stored<Conversation>>,
    messages: HashMap<Uuid, Stored<Message>>,
    notifications: HashMap<Uuid, Stored<Notification>>,
    complaints: HashMap<Uuid, Stored<Complaint>>,
}

impl MemoryState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn insert_conversation(&mut self, new: NewConversation) -> Conversation {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            conversation_type: new.conversation_type,
            subject: new.subject,
            participants: new.participants,
            last_message_id: None,
            last_message_at: now,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let seq = self.next_seq();
        self.conversations.insert(
            conversation.id,
            Stored {
                seq,
                value: conversation.clone(),
            },
        );
        conversation
    }

    /// Newest first; insertion order breaks timestamp ties
    fn messages_newest_first(&self, keep: impl Fn(&Message) -> bool) -> Vec<Message> {
        let mut found: Vec<&Stored<Message>> =
            self.messages.values().filter(|m| keep(&m.value)).collect();
        found.sort_by_key(|m| Reverse((m.value.created_at, m.seq)));
        found.into_iter().map(|m| m.value.clone()).collect()
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationRepository for MemoryRepository {
    async fn find_or_create(&self, new: NewConversation) -> AppResult<Conversation> {
        let key = new.participant_key();
        let mut state = self.state.write().await;

        if new.conversation_type.is_reusable() {
            let existing = state.conversations.values().find(|c| {
                c.value.conversation_type == new.conversation_type
                    && crate::models::participant_key(
                        c.value.participants.iter().map(|p| p.user_id),
                    ) == key
            });
            if let Some(existing) = existing {
                return Ok(existing.value.clone());
            }
        }

        Ok(state.insert_conversation(new))
    }

    async fn create(&self, new: NewConversation) -> AppResult<Conversation> {
        Ok(self.state.write().await.insert_conversation(new))
    }

    async fn find_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .get(&conversation_id)
            .filter(|c| c.value.has_participant(user_id))
            .map(|c| c.value.clone()))
    }

    async fn list_active(&self, user_id: Uuid, page: PageRequest) -> AppResult<Page<Conversation>> {
        let state = self.state.read().await;
        let mut found: Vec<&Stored<Conversation>> = state
            .conversations
            .values()
            .filter(|c| c.value.is_active && c.value.has_participant(user_id))
            .collect();
        found.sort_by_key(|c| Reverse((c.value.last_message_at, c.seq)));
        let all = found.into_iter().map(|c| c.value.clone()).collect();
        Ok(Page::slice(all, page))
    }

    async fn ids_for_participant(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .values()
            .filter(|c| c.value.has_participant(user_id))
            .map(|c| c.value.id)
            .collect())
    }

    async fn touch_last_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        if let Some(stored) = state.conversations.get_mut(&conversation_id) {
            stored.value.last_message_id = Some(message_id);
            stored.value.last_message_at = at;
            stored.value.updated_at = at;
        }
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for MemoryRepository {
    async fn insert(&self, new: NewMessage) -> AppResult<Message> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id,
            sender: new.sender,
            content: new.content,
            message_type: new.message_type,
            attachments: new.attachments,
            read_by: Vec::new(),
            edited: false,
            edited_at: None,
            deleted: false,
            deleted_at: None,
            school_id: new.school_id,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.write().await;
        let seq = state.next_seq();
        state.messages.insert(
            message.id,
            Stored {
                seq,
                value: message.clone(),
            },
        );
        Ok(message)
    }

    async fn find(&self, message_id: Uuid) -> AppResult<Option<Message>> {
        let state = self.state.read().await;
        Ok(state.messages.get(&message_id).map(|m| m.value.clone()))
    }

    async fn list_page(&self, conversation_id: Uuid, page: PageRequest) -> AppResult<Page<Message>> {
        let state = self.state.read().await;
        let all =
            state.messages_newest_first(|m| m.conversation_id == conversation_id && !m.deleted);
        Ok(Page::slice(all, page))
    }

    async fn update_content(
        &self,
        message_id: Uuid,
        sender_id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .messages
            .get_mut(&message_id)
            .filter(|m| m.value.sender.user_id == sender_id && !m.value.deleted)
        else {
            return Ok(None);
        };
        stored.value.content = content.to_string();
        stored.value.edited = true;
        stored.value.edited_at = Some(at);
        stored.value.updated_at = at;
        Ok(Some(stored.value.clone()))
    }

    async fn soft_delete(
        &self,
        message_id: Uuid,
        sender_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .messages
            .get_mut(&message_id)
            .filter(|m| m.value.sender.user_id == sender_id && !m.value.deleted)
        else {
            return Ok(None);
        };
        stored.value.deleted = true;
        stored.value.deleted_at = Some(at);
        stored.value.updated_at = at;
        Ok(Some(stored.value.clone()))
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader: UserRef,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut marked = 0;
        for stored in state.messages.values_mut() {
            let message = &mut stored.value;
            if message.conversation_id == conversation_id && message.is_unread_for(reader.user_id) {
                message.read_by.push(ReadReceipt {
                    user_id: reader.user_id,
                    user_type: reader.user_type,
                    read_at: at,
                });
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn count_unread(&self, conversation_ids: &[Uuid], user_id: Uuid) -> AppResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .values()
            .filter(|m| {
                conversation_ids.contains(&m.value.conversation_id)
                    && m.value.is_unread_for(user_id)
            })
            .count() as u64)
    }

    async fn search(
        &self,
        conversation_ids: &[Uuid],
        query: &str,
        page: PageRequest,
    ) -> AppResult<Page<Message>> {
        let needle = query.to_lowercase();
        let state = self.state.read().await;
        let all = state.messages_newest_first(|m| {
            !m.deleted
                && conversation_ids.contains(&m.conversation_id)
                && m.content.to_lowercase().contains(&needle)
        });
        Ok(Page::slice(all, page))
    }

    async fn daily_counts(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>> {
        let state = self.state.read().await;
        let mut days: BTreeMap<String, u64> = BTreeMap::new();
        for stored in state.messages.values() {
            let m = &stored.value;
            if m.school_id == school_id && !m.deleted && m.created_at >= since {
                *days
                    .entry(m.created_at.format("%Y-%m-%d").to_string())
                    .or_default() += 1;
            }
        }
        Ok(days
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryRepository {
    async fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient: new.recipient,
            sender: new.sender,
            title: new.title,
            message: new.message,
            notification_type: new.notification_type,
            priority: new.priority,
            read: false,
            read_at: None,
            action_url: new.action_url,
            action_data: new.action_data,
            expires_at: new.expires_at,
            school_id: new.school_id,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.write().await;
        let seq = state.next_seq();
        state.notifications.insert(
            notification.id,
            Stored {
                seq,
                value: notification.clone(),
            },
        );
        Ok(notification)
    }

    async fn list(
        &self,
        recipient: UserRef,
        filter: NotificationFilter,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> AppResult<Page<Notification>> {
        let state = self.state.read().await;
        let mut found: Vec<&Stored<Notification>> = state
            .notifications
            .values()
            .filter(|n| {
                n.value.recipient == recipient
                    && n.value.is_visible_at(now)
                    && filter.matches(&n.value)
            })
            .collect();
        found.sort_by_key(|n| Reverse((n.value.created_at, n.seq)));
        let all = found.into_iter().map(|n| n.value.clone()).collect();
        Ok(Page::slice(all, page))
    }

    async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient: UserRef,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Notification>> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .notifications
            .get_mut(&notification_id)
            .filter(|n| n.value.recipient == recipient && n.value.is_visible_at(now))
        else {
            return Ok(None);
        };
        if !stored.value.read {
            stored.value.read = true;
            stored.value.read_at = Some(now);
            stored.value.updated_at = now;
        }
        Ok(Some(stored.value.clone()))
    }

    async fn mark_all_read(&self, recipient: UserRef, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut modified = 0;
        for stored in state.notifications.values_mut() {
            let n = &mut stored.value;
            if n.recipient == recipient && !n.read && n.is_visible_at(now) {
                n.read = true;
                n.read_at = Some(now);
                n.updated_at = now;
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn count_unread(&self, recipient: UserRef, now: DateTime<Utc>) -> AppResult<u64> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .values()
            .filter(|n| n.value.recipient == recipient && !n.value.read && n.value.is_visible_at(now))
            .count() as u64)
    }

    async fn delete(&self, notification_id: Uuid, recipient: UserRef) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let owned = state
            .notifications
            .get(&notification_id)
            .is_some_and(|n| n.value.recipient == recipient);
        if owned {
            state.notifications.remove(&notification_id);
        }
        Ok(owned)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let before = state.notifications.len();
        state.notifications.retain(|_, n| n.value.is_visible_at(now));
        Ok((before - state.notifications.len()) as u64)
    }

    async fn stats(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<NotificationStats> {
        let state = self.state.read().await;
        let mut by_type: HashMap<NotificationType, (u64, u64)> = HashMap::new();
        let mut by_priority: HashMap<Priority, u64> = HashMap::new();

        for stored in state.notifications.values() {
            let n = &stored.value;
            if n.school_id != school_id {
                continue;
            }
            *by_priority.entry(n.priority).or_default() += 1;
            if n.created_at >= since {
                let entry = by_type.entry(n.notification_type).or_default();
                entry.0 += 1;
                if n.read {
                    entry.1 += 1;
                }
            }
        }

        let mut type_stats: Vec<TypeStat> = by_type
            .into_iter()
            .map(|(notification_type, (count, read_count))| TypeStat {
                notification_type,
                count,
                read_count,
                unread_count: count - read_count,
            })
            .collect();
        type_stats.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.notification_type.as_str().cmp(b.notification_type.as_str()))
        });

        let mut priority_stats: Vec<PriorityStat> = by_priority
            .into_iter()
            .map(|(priority, count)| PriorityStat { priority, count })
            .collect();
        priority_stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| b.priority.cmp(&a.priority)));

        Ok(NotificationStats {
            type_stats,
            priority_stats,
        })
    }
}

#[async_trait]
impl ComplaintRepository for MemoryRepository {
    async fn insert(&self, new: NewComplaint) -> AppResult<Complaint> {
        let now = Utc::now();
        let complaint = Complaint {
            id: Uuid::new_v4(),
            complainant: new.complainant,
            student_id: new.student_id,
            teacher_id: new.teacher_id,
            title: new.title,
            description: new.description,
            category: new.category,
            priority: new.priority,
            status: ComplaintStatus::Open,
            conversation_id: new.conversation_id,
            school_id: new.school_id,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.write().await;
        let seq = state.next_seq();
        state.complaints.insert(
            complaint.id,
            Stored {
                seq,
                value: complaint.clone(),
            },
        );
        Ok(complaint)
    }

    async fn list(&self, scope: ComplaintScope, page: PageRequest) -> AppResult<Page<Complaint>> {
        let state = self.state.read().await;
        let mut found: Vec<&Stored<Complaint>> = state
            .complaints
            .values()
            .filter(|c| match scope {
                ComplaintScope::Teacher(id) => c.value.teacher_id == id,
                ComplaintScope::Complainant(id) => c.value.complainant.user_id == id,
                ComplaintScope::School(id) => c.value.school_id == id,
            })
            .collect();
        found.sort_by_key(|c| Reverse((c.value.created_at, c.seq)));
        let all = found.into_iter().map(|c| c.value.clone()).collect();
        Ok(Page::slice(all, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationType, MessageType, NotificationSender, Participant, UserKind};
    use chrono::Duration;

    fn participant(kind: UserKind) -> Participant {
        Participant {
            user_id: Uuid::new_v4(),
            user_type: kind,
            name: format!("{kind} user"),
            role: kind.as_str().to_string(),
        }
    }

    fn text(conversation_id: Uuid, sender: &Participant, content: &str) -> NewMessage {
        NewMessage {
            conversation_id,
            sender: sender.clone(),
            content: content.to_string(),
            message_type: MessageType::Text,
            attachments: Vec::new(),
            school_id: Uuid::nil(),
        }
    }

    #[tokio::test]
    async fn test_find_or_create_reuses_exact_participant_set() {
        let repo = MemoryRepository::new();
        let a = participant(UserKind::Teacher);
        let b = participant(UserKind::Parent);

        let first = repo
            .find_or_create(NewConversation::new(
                ConversationType::Direct,
                None,
                vec![a.clone(), b.clone()],
            ))
            .await
            .unwrap();
        let second = repo
            .find_or_create(NewConversation::new(
                ConversationType::Direct,
                None,
                vec![b.clone(), a.clone()],
            ))
            .await
            .unwrap();
        let group = repo
            .find_or_create(NewConversation::new(ConversationType::Group, None, vec![a, b]))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, group.id);
    }

    #[tokio::test]
    async fn test_complaint_threads_are_never_reused() {
        let repo = MemoryRepository::new();
        let a = participant(UserKind::Parent);
        let b = participant(UserKind::Teacher);
        let new = NewConversation::new(ConversationType::Complaint, None, vec![a, b]);

        let first = repo.find_or_create(new.clone()).await.unwrap();
        let second = repo.find_or_create(new).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_list_page_is_newest_first_and_skips_deleted() {
        let repo = MemoryRepository::new();
        let a = participant(UserKind::Teacher);
        let conversation_id = Uuid::new_v4();

        let first = MessageRepository::insert(&repo, text(conversation_id, &a, "one")).await.unwrap();
        MessageRepository::insert(&repo, text(conversation_id, &a, "two")).await.unwrap();
        MessageRepository::insert(&repo, text(conversation_id, &a, "three")).await.unwrap();
        repo.soft_delete(first.id, a.user_id, Utc::now()).await.unwrap();

        let page = repo
            .list_page(conversation_id, PageRequest::new(None, None, 50))
            .await
            .unwrap();
        let contents: Vec<&str> = page.items.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "two"]);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_mark_read_is_set_union() {
        let repo = MemoryRepository::new();
        let a = participant(UserKind::Teacher);
        let b = participant(UserKind::Parent);
        let conversation_id = Uuid::new_v4();
        MessageRepository::insert(&repo, text(conversation_id, &a, "hi")).await.unwrap();

        let mark = |reader: UserRef| MessageRepository::mark_read(&repo, conversation_id, reader, Utc::now());
        assert_eq!(mark(b.user_ref()).await.unwrap(), 1);
        assert_eq!(mark(b.user_ref()).await.unwrap(), 0);
        // The author never gets a receipt for their own message.
        assert_eq!(mark(a.user_ref()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired_removes_only_expired() {
        let repo = MemoryRepository::new();
        let now = Utc::now();
        let recipient = UserRef::new(Uuid::new_v4(), UserKind::Student);
        for offset in [-2, -1, 1] {
            NotificationRepository::insert(
                &repo,
                NewNotification {
                    recipient,
                    sender: NotificationSender::system(),
                    title: "t".to_string(),
                    message: "m".to_string(),
                    notification_type: NotificationType::General,
                    priority: Priority::Low,
                    action_url: None,
                    action_data: None,
                    expires_at: now + Duration::hours(offset),
                    school_id: Uuid::nil(),
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(repo.purge_expired(now).await.unwrap(), 2);
        assert_eq!(
            NotificationRepository::count_unread(&repo, recipient, now).await.unwrap(),
            1
        );
    }
}
