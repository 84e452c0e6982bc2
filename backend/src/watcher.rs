use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use shared::tally::{compute_tally, CandidatesByPosition, Tally};
use crate::store::{ElectionStore, Feed, StoreError, Subscription};

/// Keeps a tally for one election current as candidates and votes change.
///
/// Holds one subscription per feed. Every notification from either feed
/// triggers a full recompute, published on a watch channel. If one feed ends
/// the watcher keeps following the other; it stops once both have ended. Dropping the
/// watcher (or calling [`TallyWatcher::stop`]) releases both subscriptions.
#[derive(Debug)]
pub struct TallyWatcher {
    rx: watch::Receiver<Tally>,
    task: JoinHandle<()>,
}

impl TallyWatcher {
    /// Subscribes, computes the first tally, then keeps it fresh in the background.
    pub async fn spawn<S>(store: Arc<S>, election_id: Uuid, viewer: Option<String>) -> Result<Self, StoreError>
    where
        S: ElectionStore + 'static,
    {
        // Subscribe before the first read so no change slips in between.
        let candidates_feed = store.subscribe(election_id, Feed::Candidates).await?;
        let votes_feed = store.subscribe(election_id, Feed::Votes).await?;

        let initial = recompute(store.as_ref(), election_id, viewer.as_deref()).await?;
        info!(%election_id, counted = initial.counted, "📊 Tally ready");
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            let mut candidates_feed = Some(candidates_feed);
            let mut votes_feed = Some(votes_feed);

            while candidates_feed.is_some() || votes_feed.is_some() {
                let (feed, changed) = tokio::select! {
                    changed = next_change(&mut candidates_feed) => (Feed::Candidates, changed),
                    changed = next_change(&mut votes_feed) => (Feed::Votes, changed),
                };
                if changed.is_none() {
                    // Still refresh: the ended feed may have dropped its last change.
                    warn!(%election_id, ?feed, "Change feed ended, following the remaining feed");
                    match feed {
                        Feed::Candidates => candidates_feed = None,
                        Feed::Votes => votes_feed = None,
                    }
                }
                debug!(%election_id, ?feed, "Recomputing tally");

                match recompute(store.as_ref(), election_id, viewer.as_deref()).await {
                    Ok(tally) => {
                        if tx.send(tally).is_err() {
                            return;
                        }
                    }
                    Err(e) => error!(%election_id, "Tally refresh failed, keeping previous: {}", e),
                }
            }
            warn!(%election_id, "All change feeds ended, tally is no longer live");
        });

        Ok(Self { rx, task })
    }

    /// The most recent tally.
    pub fn current(&self) -> Tally {
        self.rx.borrow().clone()
    }

    /// Waits until a newer tally is published. `None` once the watcher stopped.
    pub async fn next(&mut self) -> Option<Tally> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Tally> {
        self.rx.clone()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for TallyWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Next change on `feed`; never resolves once the feed has been dropped.
async fn next_change(feed: &mut Option<Subscription>) -> Option<()> {
    match feed {
        Some(subscription) => subscription.changed().await,
        None => std::future::pending().await,
    }
}

async fn recompute<S: ElectionStore + ?Sized>(
    store: &S,
    election_id: Uuid,
    viewer: Option<&str>,
) -> Result<Tally, StoreError> {
    let (candidates, votes) = futures::try_join!(store.candidates(election_id), store.votes(election_id))?;
    Ok(compute_tally(&CandidatesByPosition::group(candidates), &votes, viewer))
}
