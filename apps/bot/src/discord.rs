use std::sync::Arc;

use market::{InboundEvent, MarketError, MessageSink, RecipientId};
use serenity::all::{ChannelId, Context, EventHandler, Http, Message, Ready};
use serenity::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Sends text to a Discord channel; the recipient id is the channel id.
pub struct DiscordSink {
    http: Arc<Http>,
}

impl DiscordSink {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MessageSink for DiscordSink {
    async fn send_text(&self, recipient: RecipientId, text: &str) -> market::Result<()> {
        if recipient.0 == 0 {
            return Err(MarketError::Delivery {
                recipient,
                reason: "channel id 0 is not valid".to_string(),
            });
        }

        ChannelId::new(recipient.0)
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| MarketError::Delivery {
                recipient,
                reason: e.to_string(),
            })
    }
}

/// Forwards chat messages into the dispatcher queue.
///
/// In guild channels only prefixed messages are forwarded; in direct messages everything is,
/// so plain text there gets the "commands only" answer.
pub struct Handler {
    events: mpsc::Sender<InboundEvent>,
    prefix: String,
}

impl Handler {
    pub fn new(events: mpsc::Sender<InboundEvent>, prefix: impl Into<String>) -> Self {
        Self {
            events,
            prefix: prefix.into(),
        }
    }

    fn wants(&self, msg: &Message) -> bool {
        !msg.author.bot
            && (msg.guild_id.is_none() || msg.content.trim_start().starts_with(&self.prefix))
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, _ctx: Context, msg: Message) {
        if !self.wants(&msg) {
            return;
        }

        let recipient = RecipientId(msg.channel_id.get());
        let event = InboundEvent::from_message(recipient, &msg.content, &self.prefix);
        debug!(
            recipient = %recipient,
            user_id = msg.author.id.get(),
            body = ?event.body,
            "inbound message"
        );

        if self.events.send(event).await.is_err() {
            warn!(recipient = %recipient, "dispatcher stopped, dropping message");
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            "{} [{}] connected successfully!",
            ready.user.name, ready.user.id
        );
    }
}
