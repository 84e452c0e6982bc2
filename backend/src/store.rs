use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;
use shared::models::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Which collection a subscription follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    Candidates,
    Votes,
}

impl Feed {
    /// Notification channel the database publishes this feed on.
    pub fn channel(self) -> &'static str {
        match self {
            Feed::Candidates => "candidates_changed",
            Feed::Votes => "votes_changed",
        }
    }
}

/// Live change notifications for one feed of one election.
///
/// Each notification only says "something changed"; consumers re-read the
/// snapshot they care about. Dropping the handle stops the forwarding task.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<()>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::Receiver<()>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Waits for the next change. `None` once the feed has ended.
    pub async fn changed(&mut self) -> Option<()> {
        self.rx.recv().await?;
        // Collapse a burst into a single wakeup; recompute is a full rebuild anyway.
        while self.rx.try_recv().is_ok() {}
        Some(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Document store holding elections, candidates and votes.
///
/// Votes are stored one record per [`VoteKey`]. Writes to the same key are
/// last-write-wins; the store is the only serialization point.
#[async_trait]
pub trait ElectionStore: Send + Sync {
    async fn election(&self, id: Uuid) -> Result<Option<Election>, StoreError>;

    async fn candidates(&self, election_id: Uuid) -> Result<Vec<Candidate>, StoreError>;

    async fn votes(&self, election_id: Uuid) -> Result<Vec<Vote>, StoreError>;

    async fn vote(&self, key: &VoteKey) -> Result<Option<Vote>, StoreError>;

    /// Writes the voter's choice and returns it with the store's timestamp.
    async fn upsert_vote(&self, key: &VoteKey, candidate_id: Uuid) -> Result<Vote, StoreError>;

    async fn delete_vote(&self, key: &VoteKey) -> Result<(), StoreError>;

    async fn subscribe(&self, election_id: Uuid, feed: Feed) -> Result<Subscription, StoreError>;

    async fn voter_votes(&self, election_id: Uuid, voter_id: &str) -> Result<Vec<Vote>, StoreError> {
        Ok(self.votes(election_id).await?
            .into_iter()
            .filter(|v| v.voter_id == voter_id)
            .collect())
    }
}
