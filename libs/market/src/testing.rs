//! In-memory fakes for the price source and the chat transport.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{MarketError, MessageSink, PriceSource, Quote, RecipientId, Result};

/// Replays queued snapshots in order; fails once the queue is empty.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Vec<Quote>>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn push_ok(&self, quotes: &[(&str, &str)]) {
        let quotes = quotes.iter().map(|(s, p)| Quote::new(*s, *p)).collect();
        self.responses.lock().unwrap().push_back(Ok(quotes));
    }

    pub(crate) fn push_err(&self, reason: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(MarketError::Fetch(reason.to_string())));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<Vec<Quote>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(MarketError::Fetch("no scripted response".to_string())))
    }
}

/// Records every message; recipients marked with `fail_for` get a delivery error.
#[derive(Default)]
pub(crate) struct RecordingSink {
    sent: Mutex<Vec<(RecipientId, String)>>,
    failing: Mutex<HashSet<RecipientId>>,
}

impl RecordingSink {
    pub(crate) fn fail_for(&self, recipient: RecipientId) {
        self.failing.lock().unwrap().insert(recipient);
    }

    pub(crate) fn sent(&self) -> Vec<(RecipientId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn messages_to(&self, recipient: RecipientId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == recipient)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send_text(&self, recipient: RecipientId, text: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(&recipient) {
            return Err(MarketError::Delivery {
                recipient,
                reason: "channel unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push((recipient, text.to_string()));
        Ok(())
    }
}
