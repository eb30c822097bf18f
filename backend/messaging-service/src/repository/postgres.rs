//! PostgreSQL-backed repositories (runtime-checked sqlx queries).

use super::{ComplaintRepository, ConversationRepository, MessageRepository, NotificationRepository};
use crate::error::{AppError, AppResult};
use crate::models::{
    Attachment, Complainant, Complaint, ComplaintScope, Conversation, DailyCount, Message,
    NewComplaint, NewConversation, NewMessage, NewNotification, Notification, NotificationFilter,
    NotificationSender, NotificationStats, Page, PageRequest, Participant, PriorityStat,
    ReadReceipt, TypeStat, UserRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str = "c.id, c.conversation_type, c.subject, c.last_message_id, \
     c.last_message_at, c.is_active, c.created_at, c.updated_at";

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, sender_type, sender_name, \
     sender_role, content, message_type, attachments, edited, edited_at, deleted, deleted_at, \
     school_id, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, recipient_type, sender_id, sender_type, \
     sender_name, title, message, notification_type, priority, read, read_at, action_url, \
     action_data, expires_at, school_id, created_at, updated_at";

const COMPLAINT_COLUMNS: &str = "id, complainant_id, complainant_type, complainant_name, \
     student_id, teacher_id, title, description, category, priority, status, conversation_id, \
     school_id, created_at, updated_at";

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_conversations(&self, rows: Vec<PgRow>) -> AppResult<Vec<Conversation>> {
        let mut conversations = rows
            .iter()
            .map(conversation_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        let ids: Vec<Uuid> = conversations.iter().map(|c| c.id).collect();
        if ids.is_empty() {
            return Ok(conversations);
        }

        let participant_rows = sqlx::query(
            "SELECT conversation_id, user_id, user_type, name, role \
             FROM conversation_participants \
             WHERE conversation_id = ANY($1) \
             ORDER BY conversation_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_conversation: HashMap<Uuid, Vec<Participant>> = HashMap::new();
        for row in &participant_rows {
            by_conversation
                .entry(row.try_get("conversation_id")?)
                .or_default()
                .push(Participant {
                    user_id: row.try_get("user_id")?,
                    user_type: parse_column(row, "user_type")?,
                    name: row.try_get("name")?,
                    role: row.try_get("role")?,
                });
        }
        for conversation in &mut conversations {
            conversation.participants = by_conversation.remove(&conversation.id).unwrap_or_default();
        }
        Ok(conversations)
    }

    async fn load_conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = $1"
        ))
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(self.load_conversations(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn insert_participants(
        tx: &mut Transaction<'_, Postgres>,
        conversation_id: Uuid,
        participants: &[Participant],
    ) -> AppResult<()> {
        for (position, participant) in participants.iter().enumerate() {
            sqlx::query(
                "INSERT INTO conversation_participants \
                 (conversation_id, user_id, user_type, name, role, position) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(conversation_id)
            .bind(participant.user_id)
            .bind(participant.user_type.as_str())
            .bind(&participant.name)
            .bind(&participant.role)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn attach_receipts(&self, mut messages: Vec<Message>) -> AppResult<Vec<Message>> {
        let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
        if ids.is_empty() {
            return Ok(messages);
        }

        let rows = sqlx::query(
            "SELECT message_id, user_id, user_type, read_at FROM message_reads \
             WHERE message_id = ANY($1) ORDER BY read_at, user_id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_message: HashMap<Uuid, Vec<ReadReceipt>> = HashMap::new();
        for row in &rows {
            by_message
                .entry(row.try_get("message_id")?)
                .or_default()
                .push(ReadReceipt {
                    user_id: row.try_get("user_id")?,
                    user_type: parse_column(row, "user_type")?,
                    read_at: row.try_get("read_at")?,
                });
        }
        for message in &mut messages {
            message.read_by = by_message.remove(&message.id).unwrap_or_default();
        }
        Ok(messages)
    }

    async fn messages_from_rows(&self, rows: Vec<PgRow>) -> AppResult<Vec<Message>> {
        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        self.attach_receipts(messages).await
    }

    async fn single_message(&self, row: Option<PgRow>) -> AppResult<Option<Message>> {
        match row {
            Some(row) => Ok(self.messages_from_rows(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

fn parse_column<T>(row: &PgRow, column: &str) -> AppResult<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: String| AppError::Database(format!("column {column}: {e}")))
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn page_bounds(page: PageRequest) -> (i64, i64) {
    (
        i64::from(page.limit),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

/// Escape LIKE metacharacters so user input matches literally
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn conversation_from_row(row: &PgRow) -> AppResult<Conversation> {
    Ok(Conversation {
        id: row.try_get("id")?,
        conversation_type: parse_column(row, "conversation_type")?,
        subject: row.try_get("subject")?,
        participants: Vec::new(),
        last_message_id: row.try_get("last_message_id")?,
        last_message_at: row.try_get("last_message_at")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &PgRow) -> AppResult<Message> {
    let attachments: Json<Vec<Attachment>> = row.try_get("attachments")?;
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender: Participant {
            user_id: row.try_get("sender_id")?,
            user_type: parse_column(row, "sender_type")?,
            name: row.try_get("sender_name")?,
            role: row.try_get("sender_role")?,
        },
        content: row.try_get("content")?,
        message_type: parse_column(row, "message_type")?,
        attachments: attachments.0,
        read_by: Vec::new(),
        edited: row.try_get("edited")?,
        edited_at: row.try_get("edited_at")?,
        deleted: row.try_get("deleted")?,
        deleted_at: row.try_get("deleted_at")?,
        school_id: row.try_get("school_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn notification_from_row(row: &PgRow) -> AppResult<Notification> {
    let action_data: Option<Json<serde_json::Value>> = row.try_get("action_data")?;
    Ok(Notification {
        id: row.try_get("id")?,
        recipient: UserRef::new(row.try_get("recipient_id")?, parse_column(row, "recipient_type")?),
        sender: NotificationSender {
            user_id: row.try_get("sender_id")?,
            user_type: parse_column(row, "sender_type")?,
            name: row.try_get("sender_name")?,
        },
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        notification_type: parse_column(row, "notification_type")?,
        priority: parse_column(row, "priority")?,
        read: row.try_get("read")?,
        read_at: row.try_get("read_at")?,
        action_url: row.try_get("action_url")?,
        action_data: action_data.map(|j| j.0),
        expires_at: row.try_get("expires_at")?,
        school_id: row.try_get("school_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn complaint_from_row(row: &PgRow) -> AppResult<Complaint> {
    Ok(Complaint {
        id: row.try_get("id")?,
        complainant: Complainant {
            user_id: row.try_get("complainant_id")?,
            user_type: parse_column(row, "complainant_type")?,
            name: row.try_get("complainant_name")?,
        },
        student_id: row.try_get("student_id")?,
        teacher_id: row.try_get("teacher_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: parse_column(row, "category")?,
        priority: parse_column(row, "priority")?,
        status: parse_column(row, "status")?,
        conversation_id: row.try_get("conversation_id")?,
        school_id: row.try_get("school_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ConversationRepository for PgRepository {
    async fn find_or_create(&self, new: NewConversation) -> AppResult<Conversation> {
        let key = new.participant_key();
        let mut tx = self.pool.begin().await?;

        // The partial unique index serialises concurrent creators: the loser's
        // insert waits for the winner to commit and then does nothing.
        let inserted: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO conversations (id, conversation_type, subject, participant_key) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (conversation_type, participant_key) \
             WHERE conversation_type <> 'complaint' DO NOTHING \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(new.conversation_type.as_str())
        .bind(&new.subject)
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;

        let conversation_id = match inserted {
            Some(id) => {
                Self::insert_participants(&mut tx, id, &new.participants).await?;
                tx.commit().await?;
                id
            }
            None => {
                tx.commit().await?;
                sqlx::query_scalar(
                    "SELECT id FROM conversations \
                     WHERE conversation_type = $1 AND participant_key = $2",
                )
                .bind(new.conversation_type.as_str())
                .bind(&key)
                .fetch_one(&self.pool)
                .await?
            }
        };

        self.load_conversation(conversation_id)
            .await?
            .ok_or(AppError::Internal)
    }

    async fn create(&self, new: NewConversation) -> AppResult<Conversation> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO conversations (id, conversation_type, subject, participant_key) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(new.conversation_type.as_str())
        .bind(&new.subject)
        .bind(new.participant_key())
        .execute(&mut *tx)
        .await?;
        Self::insert_participants(&mut tx, id, &new.participants).await?;
        tx.commit().await?;

        self.load_conversation(id).await?.ok_or(AppError::Internal)
    }

    async fn find_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c \
             WHERE c.id = $1 AND EXISTS ( \
                 SELECT 1 FROM conversation_participants p \
                 WHERE p.conversation_id = c.id AND p.user_id = $2)"
        ))
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(self.load_conversations(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_active(&self, user_id: Uuid, page: PageRequest) -> AppResult<Page<Conversation>> {
        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c \
             JOIN conversation_participants p ON p.conversation_id = c.id \
             WHERE p.user_id = $1 AND c.is_active = TRUE \
             ORDER BY c.last_message_at DESC, c.created_at DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversations c \
             JOIN conversation_participants p ON p.conversation_id = c.id \
             WHERE p.user_id = $1 AND c.is_active = TRUE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let conversations = self.load_conversations(rows).await?;
        Ok(Page::new(conversations, to_count(total), page))
    }

    async fn ids_for_participant(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar(
            "SELECT conversation_id FROM conversation_participants WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn touch_last_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE conversations \
             SET last_message_id = $2, last_message_at = $3, updated_at = $3 \
             WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(message_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for PgRepository {
    async fn insert(&self, new: NewMessage) -> AppResult<Message> {
        let row = sqlx::query(&format!(
            "INSERT INTO messages \
             (id, conversation_id, sender_id, sender_type, sender_name, sender_role, \
              content, message_type, attachments, school_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.conversation_id)
        .bind(new.sender.user_id)
        .bind(new.sender.user_type.as_str())
        .bind(&new.sender.name)
        .bind(&new.sender.role)
        .bind(&new.content)
        .bind(new.message_type.as_str())
        .bind(Json(&new.attachments))
        .bind(new.school_id)
        .fetch_one(&self.pool)
        .await?;
        message_from_row(&row)
    }

    async fn find(&self, message_id: Uuid) -> AppResult<Option<Message>> {
        let row = sqlx::query(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        self.single_message(row).await
    }

    async fn list_page(&self, conversation_id: Uuid, page: PageRequest) -> AppResult<Page<Message>> {
        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 AND deleted = FALSE \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = $1 AND deleted = FALSE",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;

        let messages = self.messages_from_rows(rows).await?;
        Ok(Page::new(messages, to_count(total), page))
    }

    async fn update_content(
        &self,
        message_id: Uuid,
        sender_id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "UPDATE messages \
             SET content = $3, edited = TRUE, edited_at = $4, updated_at = $4 \
             WHERE id = $1 AND sender_id = $2 AND deleted = FALSE \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message_id)
        .bind(sender_id)
        .bind(content)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        self.single_message(row).await
    }

    async fn soft_delete(
        &self,
        message_id: Uuid,
        sender_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "UPDATE messages \
             SET deleted = TRUE, deleted_at = $3, updated_at = $3 \
             WHERE id = $1 AND sender_id = $2 AND deleted = FALSE \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message_id)
        .bind(sender_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        self.single_message(row).await
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader: UserRef,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "INSERT INTO message_reads (message_id, user_id, user_type, read_at) \
             SELECT m.id, $2, $3, $4 FROM messages m \
             WHERE m.conversation_id = $1 AND m.sender_id <> $2 AND m.deleted = FALSE \
             ON CONFLICT (message_id, user_id) DO NOTHING",
        )
        .bind(conversation_id)
        .bind(reader.user_id)
        .bind(reader.user_type.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_unread(&self, conversation_ids: &[Uuid], user_id: Uuid) -> AppResult<u64> {
        if conversation_ids.is_empty() {
            return Ok(0);
        }
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m \
             WHERE m.conversation_id = ANY($1) AND m.deleted = FALSE AND m.sender_id <> $2 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM message_reads r \
                   WHERE r.message_id = m.id AND r.user_id = $2)",
        )
        .bind(conversation_ids)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(to_count(count))
    }

    async fn search(
        &self,
        conversation_ids: &[Uuid],
        query: &str,
        page: PageRequest,
    ) -> AppResult<Page<Message>> {
        if conversation_ids.is_empty() {
            return Ok(Page::new(Vec::new(), 0, page));
        }
        let pattern = like_pattern(query);
        let (limit, offset) = page_bounds(page);

        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = ANY($1) AND deleted = FALSE AND content ILIKE $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        ))
        .bind(conversation_ids)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE conversation_id = ANY($1) AND deleted = FALSE AND content ILIKE $2",
        )
        .bind(conversation_ids)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let messages = self.messages_from_rows(rows).await?;
        Ok(Page::new(messages, to_count(total), page))
    }

    async fn daily_counts(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>> {
        let rows = sqlx::query(
            "SELECT to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD') AS day, COUNT(*) AS count \
             FROM messages \
             WHERE school_id = $1 AND deleted = FALSE AND created_at >= $2 \
             GROUP BY day ORDER BY day",
        )
        .bind(school_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> AppResult<DailyCount> {
                Ok(DailyCount {
                    date: row.try_get("day")?,
                    count: to_count(row.try_get("count")?),
                })
            })
            .collect()
    }
}

#[async_trait]
impl NotificationRepository for PgRepository {
    async fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        let row = sqlx::query(&format!(
            "INSERT INTO notifications \
             (id, recipient_id, recipient_type, sender_id, sender_type, sender_name, title, \
              message, notification_type, priority, action_url, action_data, expires_at, school_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.recipient.user_id)
        .bind(new.recipient.user_type.as_str())
        .bind(new.sender.user_id)
        .bind(new.sender.user_type.as_str())
        .bind(&new.sender.name)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.notification_type.as_str())
        .bind(new.priority.as_str())
        .bind(&new.action_url)
        .bind(new.action_data.as_ref().map(Json))
        .bind(new.expires_at)
        .bind(new.school_id)
        .fetch_one(&self.pool)
        .await?;
        notification_from_row(&row)
    }

    async fn list(
        &self,
        recipient: UserRef,
        filter: NotificationFilter,
        now: DateTime<Utc>,
        page: PageRequest,
    ) -> AppResult<Page<Notification>> {
        const FILTER: &str = "recipient_id = $1 AND recipient_type = $2 AND expires_at > $3 \
             AND ($4::text IS NULL OR notification_type = $4) \
             AND ($5::text IS NULL OR priority = $5) \
             AND ($6::bool IS NULL OR read = $6)";

        let notification_type = filter.notification_type.map(|t| t.as_str());
        let priority = filter.priority.map(|p| p.as_str());
        let (limit, offset) = page_bounds(page);

        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE {FILTER} \
             ORDER BY created_at DESC, id DESC LIMIT $7 OFFSET $8"
        ))
        .bind(recipient.user_id)
        .bind(recipient.user_type.as_str())
        .bind(now)
        .bind(notification_type)
        .bind(priority)
        .bind(filter.read)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM notifications WHERE {FILTER}"))
            .bind(recipient.user_id)
            .bind(recipient.user_type.as_str())
            .bind(now)
            .bind(notification_type)
            .bind(priority)
            .bind(filter.read)
            .fetch_one(&self.pool)
            .await?;

        let notifications = rows
            .iter()
            .map(notification_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Page::new(notifications, to_count(total), page))
    }

    async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient: UserRef,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Notification>> {
        // COALESCE keeps the first read time when the flag is already set.
        let row = sqlx::query(&format!(
            "UPDATE notifications \
             SET read = TRUE, read_at = COALESCE(read_at, $4), updated_at = $4 \
             WHERE id = $1 AND recipient_id = $2 AND recipient_type = $3 AND expires_at > $4 \
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(notification_id)
        .bind(recipient.user_id)
        .bind(recipient.user_type.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(notification_from_row).transpose()
    }

    async fn mark_all_read(&self, recipient: UserRef, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE, read_at = $3, updated_at = $3 \
             WHERE recipient_id = $1 AND recipient_type = $2 AND read = FALSE AND expires_at > $3",
        )
        .bind(recipient.user_id)
        .bind(recipient.user_type.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_unread(&self, recipient: UserRef, now: DateTime<Utc>) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE recipient_id = $1 AND recipient_type = $2 AND read = FALSE AND expires_at > $3",
        )
        .bind(recipient.user_id)
        .bind(recipient.user_type.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(to_count(count))
    }

    async fn delete(&self, notification_id: Uuid, recipient: UserRef) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE id = $1 AND recipient_id = $2 AND recipient_type = $3",
        )
        .bind(notification_id)
        .bind(recipient.user_id)
        .bind(recipient.user_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<NotificationStats> {
        let type_rows = sqlx::query(
            "SELECT notification_type, COUNT(*) AS count, \
                    COUNT(*) FILTER (WHERE read) AS read_count \
             FROM notifications WHERE school_id = $1 AND created_at >= $2 \
             GROUP BY notification_type ORDER BY count DESC, notification_type",
        )
        .bind(school_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let priority_rows = sqlx::query(
            "SELECT priority, COUNT(*) AS count FROM notifications WHERE school_id = $1 \
             GROUP BY priority \
             ORDER BY count DESC, \
                 CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END",
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;

        let type_stats = type_rows
            .iter()
            .map(|row| -> AppResult<TypeStat> {
                let count = to_count(row.try_get("count")?);
                let read_count = to_count(row.try_get("read_count")?);
                Ok(TypeStat {
                    notification_type: parse_column(row, "notification_type")?,
                    count,
                    read_count,
                    unread_count: count.saturating_sub(read_count),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let priority_stats = priority_rows
            .iter()
            .map(|row| -> AppResult<PriorityStat> {
                Ok(PriorityStat {
                    priority: parse_column(row, "priority")?,
                    count: to_count(row.try_get("count")?),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(NotificationStats {
            type_stats,
            priority_stats,
        })
    }
}

#[async_trait]
impl ComplaintRepository for PgRepository {
    async fn insert(&self, new: NewComplaint) -> AppResult<Complaint> {
        let row = sqlx::query(&format!(
            "INSERT INTO complaints \
             (id, complainant_id, complainant_type, complainant_name, student_id, teacher_id, \
              title, description, category, priority, conversation_id, school_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {COMPLAINT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.complainant.user_id)
        .bind(new.complainant.user_type.as_str())
        .bind(&new.complainant.name)
        .bind(new.student_id)
        .bind(new.teacher_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.category.as_str())
        .bind(new.priority.as_str())
        .bind(new.conversation_id)
        .bind(new.school_id)
        .fetch_one(&self.pool)
        .await?;
        complaint_from_row(&row)
    }

    async fn list(&self, scope: ComplaintScope, page: PageRequest) -> AppResult<Page<Complaint>> {
        let (column, id) = match scope {
            ComplaintScope::Teacher(id) => ("teacher_id", id),
            ComplaintScope::Complainant(id) => ("complainant_id", id),
            ComplaintScope::School(id) => ("school_id", id),
        };
        let (limit, offset) = page_bounds(page);

        let rows = sqlx::query(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE {column} = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM complaints WHERE {column} = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        let complaints = rows
            .iter()
            .map(complaint_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Page::new(complaints, to_count(total), page))
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("hello"), "%hello%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
