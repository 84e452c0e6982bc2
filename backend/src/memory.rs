use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;
use shared::models::*;
use crate::store::{ElectionStore, Feed, StoreError, Subscription};

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
struct Change {
    election_id: Uuid,
    feed: Feed,
}

#[derive(Debug, Default)]
struct State {
    elections: HashMap<Uuid, Election>,
    // Insertion order is the order candidates are listed in.
    candidates: Vec<Candidate>,
    votes: BTreeMap<VoteKey, Vote>,
}

/// In-process store with a broadcast change feed.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    changes: broadcast::Sender<Change>,
    offline: AtomicBool,
    fail_next_upsert: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            changes,
            offline: AtomicBool::new(false),
            fail_next_upsert: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        self.state.lock().map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn notify(&self, election_id: Uuid, feed: Feed) {
        // No receivers is fine: nobody is watching this election.
        let _ = self.changes.send(Change { election_id, feed });
    }

    pub fn put_election(&self, election: Election) -> Result<(), StoreError> {
        self.lock()?.elections.insert(election.id, election);
        Ok(())
    }

    pub fn put_candidate(&self, candidate: Candidate) -> Result<(), StoreError> {
        let election_id = candidate.election_id;
        {
            let mut state = self.lock()?;
            match state.candidates.iter_mut().find(|c| c.id == candidate.id) {
                Some(existing) => *existing = candidate,
                None => state.candidates.push(candidate),
            }
        }
        self.notify(election_id, Feed::Candidates);
        Ok(())
    }

    pub fn remove_candidate(&self, candidate_id: Uuid) -> Result<Option<Candidate>, StoreError> {
        let removed = {
            let mut state = self.lock()?;
            let idx = state.candidates.iter().position(|c| c.id == candidate_id);
            idx.map(|i| state.candidates.remove(i))
        };
        if let Some(candidate) = &removed {
            self.notify(candidate.election_id, Feed::Candidates);
        }
        Ok(removed)
    }

    /// Takes the store off the network; every call fails until brought back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes the next `upsert_vote` fail once.
    pub fn fail_next_upsert(&self) {
        self.fail_next_upsert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ElectionStore for MemoryStore {
    async fn election(&self, id: Uuid) -> Result<Option<Election>, StoreError> {
        Ok(self.lock()?.elections.get(&id).cloned())
    }

    async fn candidates(&self, election_id: Uuid) -> Result<Vec<Candidate>, StoreError> {
        Ok(self.lock()?.candidates.iter()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn votes(&self, election_id: Uuid) -> Result<Vec<Vote>, StoreError> {
        Ok(self.lock()?.votes.values()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn vote(&self, key: &VoteKey) -> Result<Option<Vote>, StoreError> {
        Ok(self.lock()?.votes.get(key).cloned())
    }

    async fn upsert_vote(&self, key: &VoteKey, candidate_id: Uuid) -> Result<Vote, StoreError> {
        if self.fail_next_upsert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".into()));
        }
        let vote = Vote {
            election_id: key.election_id,
            position: key.position.clone(),
            voter_id: key.voter_id.clone(),
            candidate_id,
            cast_at: OffsetDateTime::now_utc(),
        };
        self.lock()?.votes.insert(key.clone(), vote.clone());
        self.notify(key.election_id, Feed::Votes);
        Ok(vote)
    }

    async fn delete_vote(&self, key: &VoteKey) -> Result<(), StoreError> {
        let removed = self.lock()?.votes.remove(key);
        if removed.is_some() {
            self.notify(key.election_id, Feed::Votes);
        }
        Ok(())
    }

    async fn subscribe(&self, election_id: Uuid, feed: Feed) -> Result<Subscription, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        let mut changes = self.changes.subscribe();
        let (tx, rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            loop {
                let wake = match changes.recv().await {
                    Ok(change) => change.election_id == election_id && change.feed == feed,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Memory feed lagged, forcing refresh");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if wake && tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}
