use crate::config::Config;
use crate::repository::Repositories;
use crate::services::{ComplaintService, ConversationService, MessageService, NotificationService};
use crate::websocket::{ConnectionRegistry, DeliveryChannel};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: ConnectionRegistry,
    pub channel: DeliveryChannel,
    pub conversations: ConversationService,
    pub messages: MessageService,
    pub notifications: NotificationService,
    pub complaints: ComplaintService,
}

impl AppState {
    /// Wire services over one set of repositories and a delivery channel
    pub fn new(config: Arc<Config>, repos: Repositories, channel: DeliveryChannel) -> Self {
        let notifications = NotificationService::new(
            repos.notifications.clone(),
            channel.clone(),
            config.notifications.ttl_days,
        );
        let conversations =
            ConversationService::new(repos.conversations.clone(), repos.messages.clone());
        let messages = MessageService::new(
            conversations.clone(),
            repos.messages.clone(),
            notifications.clone(),
            channel.clone(),
        );
        let complaints = ComplaintService::new(
            repos.complaints.clone(),
            conversations.clone(),
            notifications.clone(),
        );

        Self {
            config,
            registry: channel.registry().clone(),
            channel,
            conversations,
            messages,
            notifications,
            complaints,
        }
    }
}
