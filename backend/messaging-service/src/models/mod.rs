pub mod complaint;
pub mod conversation;
pub mod identity;
pub mod message;
pub mod notification;
pub mod pagination;

pub use complaint::{
    Complainant, Complaint, ComplaintCategory, ComplaintScope, ComplaintStatus, NewComplaint,
};
pub use conversation::{
    participant_key, Conversation, ConversationSummary, ConversationType, NewConversation,
    Participant,
};
pub use identity::{Principal, UserKind, UserRef};
pub use message::{
    preview, Attachment, DailyCount, Message, MessageStats, MessageType, NewMessage, ReadReceipt,
};
pub use notification::{
    NewNotification, Notification, NotificationFilter, NotificationSender, NotificationStats,
    NotificationType, Priority, PriorityStat, TypeStat,
};
pub use pagination::{Page, PageQuery, PageRequest, Pagination};
