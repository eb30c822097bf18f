pub mod complaint_service;
pub mod conversation_service;
pub mod expiry;
pub mod message_service;
pub mod notification_service;

pub use complaint_service::{ComplaintService, FileComplaint};
pub use conversation_service::{ConversationService, StartConversation};
pub use expiry::spawn_expiry_sweeper;
pub use message_service::{MessageService, SendMessage};
pub use notification_service::{
    BroadcastFailure, BroadcastOutcome, BroadcastRequest, NotificationDraft, NotificationService,
    RecipientSpec,
};
