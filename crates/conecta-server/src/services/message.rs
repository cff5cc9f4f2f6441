use crate::error::{AppError, Result};
use crate::store::{DocumentStore, Entity, Query, Subscription, fetch};
use chrono::Utc;
use conecta_protocol::{ChannelMessage, CreateMessage, DirectMessage, User};
use std::sync::Arc;

/// Channel and direct messages. Both are append-only.
#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn DocumentStore>,
}

impl MessageService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn channel_query(channel_id: &str) -> Query {
        Query::collection(ChannelMessage::COLLECTION)
            .where_eq("channelId", channel_id)
            .order_by("timestamp")
    }

    pub fn subscribe_channel(&self, channel_id: &str) -> Subscription<ChannelMessage> {
        Subscription::start(self.store.clone(), Self::channel_query(channel_id))
    }

    pub async fn channel_messages(&self, channel_id: &str) -> Result<Vec<ChannelMessage>> {
        Ok(fetch(self.store.as_ref(), &Self::channel_query(channel_id)).await?)
    }

    pub async fn post_to_channel(
        &self,
        author: &User,
        channel_id: &str,
        input: CreateMessage,
    ) -> Result<ChannelMessage> {
        ensure_content(&input)?;

        let mut message = ChannelMessage {
            id: String::new(),
            channel_id: channel_id.to_string(),
            user_id: author.id.clone(),
            text: input.text,
            timestamp: Utc::now(),
            attachments: input.attachments,
        };
        message.id = self
            .store
            .add(ChannelMessage::COLLECTION, message.to_fields()?)
            .await?;

        tracing::debug!(channel_id, message_id = %message.id, "Channel message posted");
        Ok(message)
    }

    /// Every direct message between two users, oldest first. The argument
    /// order does not matter.
    pub async fn conversation(&self, a: &str, b: &str) -> Result<Vec<DirectMessage>> {
        let query = Query::collection(DirectMessage::COLLECTION)
            .where_in("senderId", [a, b])
            .where_in("receiverId", [a, b])
            .order_by("timestamp");
        let messages: Vec<DirectMessage> = fetch(self.store.as_ref(), &query).await?;
        Ok(messages.into_iter().filter(|m| m.is_between(a, b)).collect())
    }

    /// Live view of one conversation. Snapshots include every direct message
    /// either user took part in; narrow them with [`DirectMessage::is_between`].
    pub fn subscribe_conversation(&self, a: &str, b: &str) -> Subscription<DirectMessage> {
        let query = Query::collection(DirectMessage::COLLECTION)
            .where_in("senderId", [a, b])
            .where_in("receiverId", [a, b])
            .order_by("timestamp");
        Subscription::start(self.store.clone(), query)
    }

    pub async fn send_direct(
        &self,
        sender: &User,
        receiver_id: &str,
        input: CreateMessage,
    ) -> Result<DirectMessage> {
        ensure_content(&input)?;

        let mut message = DirectMessage {
            id: String::new(),
            sender_id: sender.id.clone(),
            receiver_id: receiver_id.to_string(),
            text: input.text,
            timestamp: Utc::now(),
            attachments: input.attachments,
        };
        message.id = self
            .store
            .add(DirectMessage::COLLECTION, message.to_fields()?)
            .await?;

        tracing::debug!(message_id = %message.id, "Direct message sent");
        Ok(message)
    }
}

fn ensure_content(input: &CreateMessage) -> Result<()> {
    if input.text.trim().is_empty() && input.attachments.is_empty() {
        return Err(AppError::BadRequest(
            "A message needs text or an attachment".to_string(),
        ));
    }
    Ok(())
}
