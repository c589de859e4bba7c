use std::time::Duration;

use async_trait::async_trait;

use super::error::TransportResult;
use super::telegram::{TelegramClient, Update};
use super::{InboundEvent, UpdateSource};

/// `getUpdates` long polling; acknowledges each batch through the offset.
#[derive(Debug, Clone)]
pub struct LongPollSource {
    client: TelegramClient,
    offset: i64,
    poll_timeout: Duration,
}

impl LongPollSource {
    pub fn new(client: TelegramClient, poll_timeout: Duration) -> Self {
        Self {
            client,
            offset: 0,
            poll_timeout,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

#[async_trait]
impl UpdateSource for LongPollSource {
    async fn next_events(&mut self) -> TransportResult<Vec<InboundEvent>> {
        let updates = self
            .client
            .get_updates(self.offset, self.poll_timeout)
            .await?;
        let (offset, events) = absorb_updates(self.offset, updates);
        self.offset = offset;
        Ok(events)
    }
}

fn absorb_updates(offset: i64, updates: Vec<Update>) -> (i64, Vec<InboundEvent>) {
    let mut next = offset;
    let mut events = Vec::with_capacity(updates.len());
    for update in updates {
        next = next.max(update.update_id + 1);
        if let Some(message) = update.message {
            events.push(message.into());
        }
    }
    (next, events)
}
