use std::collections::BTreeSet;

use tokio::sync::RwLock;

use crate::RecipientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotPresent,
}

/// Recipients that opted in to scheduled reports.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    members: RwLock<BTreeSet<RecipientId>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, id: RecipientId) -> SubscribeOutcome {
        if self.members.write().await.insert(id) {
            SubscribeOutcome::Added
        } else {
            SubscribeOutcome::AlreadyPresent
        }
    }

    pub async fn unsubscribe(&self, id: RecipientId) -> UnsubscribeOutcome {
        if self.members.write().await.remove(&id) {
            UnsubscribeOutcome::Removed
        } else {
            UnsubscribeOutcome::NotPresent
        }
    }

    pub async fn contains(&self, id: RecipientId) -> bool {
        self.members.read().await.contains(&id)
    }

    /// Copy of the current members, so callers can iterate without holding the lock.
    pub async fn recipients(&self) -> Vec<RecipientId> {
        self.members.read().await.iter().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
