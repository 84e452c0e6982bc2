use std::time::Duration;
use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use time::{Date, OffsetDateTime, Time};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use shared::models::*;
use crate::store::{ElectionStore, Feed, StoreError, Subscription};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(sqlx::FromRow)]
struct ElectionRow {
    id: Uuid,
    title: String,
    date: Option<Date>,
    starts_at: Option<Time>,
    ends_at: Option<Time>,
}

impl From<ElectionRow> for Election {
    fn from(row: ElectionRow) -> Self {
        Election {
            id: row.id,
            title: row.title,
            date: row.date,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: Uuid,
    election_id: Uuid,
    position: String,
    name: String,
    photo_url: Option<String>,
    term_duration: Option<String>,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Candidate {
            id: row.id,
            election_id: row.election_id,
            position: row.position,
            name: row.name,
            photo_url: row.photo_url,
            term_duration: row.term_duration,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VoteRow {
    election_id: Uuid,
    position: String,
    voter_id: String,
    candidate_id: Uuid,
    cast_at: OffsetDateTime,
}

impl From<VoteRow> for Vote {
    fn from(row: VoteRow) -> Self {
        Vote {
            election_id: row.election_id,
            position: row.position,
            voter_id: row.voter_id,
            candidate_id: row.candidate_id,
            cast_at: row.cast_at,
        }
    }
}

const RECONNECT_MIN: Duration = Duration::from_millis(250);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Delay before the next reconnect attempt: doubles, capped at [`RECONNECT_MAX`].
pub(crate) fn next_delay(delay: Duration) -> Duration {
    delay.saturating_mul(2).min(RECONNECT_MAX)
}

async fn listen(pool: &PgPool, feed: Feed) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(feed.channel()).await?;
    Ok(listener)
}

/// Retries [`listen`] with exponential backoff. Gives up only when the
/// subscriber has gone away.
async fn reconnect(pool: &PgPool, feed: Feed, tx: &mpsc::Sender<()>) -> Option<PgListener> {
    let mut delay = RECONNECT_MIN;
    loop {
        tokio::time::sleep(delay).await;
        if tx.is_closed() {
            return None;
        }
        match listen(pool, feed).await {
            Ok(listener) => {
                info!(channel = feed.channel(), "Change feed reconnected");
                return Some(listener);
            }
            Err(e) => {
                delay = next_delay(delay);
                warn!(channel = feed.channel(), retry_in = ?delay, "Change feed reconnect failed: {}", e);
            }
        }
    }
}

/// PostgreSQL-backed store; change feeds ride on LISTEN/NOTIFY.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!("📋 Migrations complete");
        Ok(())
    }
}

#[async_trait]
impl ElectionStore for PgStore {
    async fn election(&self, id: Uuid) -> Result<Option<Election>, StoreError> {
        let row = sqlx::query_as::<_, ElectionRow>(
            "SELECT id, title, date, starts_at, ends_at FROM elections WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Election::from))
    }

    async fn candidates(&self, election_id: Uuid) -> Result<Vec<Candidate>, StoreError> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            "SELECT id, election_id, position, name, photo_url, term_duration
             FROM candidates WHERE election_id = $1
             ORDER BY created_at, id"
        )
        .bind(election_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Candidate::from).collect())
    }

    async fn votes(&self, election_id: Uuid) -> Result<Vec<Vote>, StoreError> {
        let rows = sqlx::query_as::<_, VoteRow>(
            "SELECT election_id, position, voter_id, candidate_id, cast_at
             FROM votes WHERE election_id = $1"
        )
        .bind(election_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Vote::from).collect())
    }

    async fn vote(&self, key: &VoteKey) -> Result<Option<Vote>, StoreError> {
        let row = sqlx::query_as::<_, VoteRow>(
            "SELECT election_id, position, voter_id, candidate_id, cast_at
             FROM votes WHERE election_id = $1 AND position = $2 AND voter_id = $3"
        )
        .bind(key.election_id)
        .bind(&key.position)
        .bind(&key.voter_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Vote::from))
    }

    async fn voter_votes(&self, election_id: Uuid, voter_id: &str) -> Result<Vec<Vote>, StoreError> {
        let rows = sqlx::query_as::<_, VoteRow>(
            "SELECT election_id, position, voter_id, candidate_id, cast_at
             FROM votes WHERE election_id = $1 AND voter_id = $2"
        )
        .bind(election_id)
        .bind(voter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Vote::from).collect())
    }

    async fn upsert_vote(&self, key: &VoteKey, candidate_id: Uuid) -> Result<Vote, StoreError> {
        let row = sqlx::query_as::<_, VoteRow>(
            "INSERT INTO votes (election_id, position, voter_id, candidate_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (election_id, position, voter_id)
             DO UPDATE SET candidate_id = EXCLUDED.candidate_id, cast_at = NOW()
             RETURNING election_id, position, voter_id, candidate_id, cast_at"
        )
        .bind(key.election_id)
        .bind(&key.position)
        .bind(&key.voter_id)
        .bind(candidate_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn delete_vote(&self, key: &VoteKey) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM votes WHERE election_id = $1 AND position = $2 AND voter_id = $3")
            .bind(key.election_id)
            .bind(&key.position)
            .bind(&key.voter_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, election_id: Uuid, feed: Feed) -> Result<Subscription, StoreError> {
        let mut listener = listen(&self.pool, feed).await?;
        debug!(%election_id, channel = feed.channel(), "Listening for changes");

        let (tx, rx) = mpsc::channel(1);
        let wanted = election_id.to_string();
        let pool = self.pool.clone();

        let task = tokio::spawn(async move {
            loop {
                let reconnected = match listener.try_recv().await {
                    Ok(Some(notification)) if notification.payload() == wanted => false,
                    Ok(Some(_)) => continue,
                    Ok(None) => {
                        warn!(channel = feed.channel(), "Change feed connection lost");
                        true
                    }
                    Err(e) => {
                        warn!(channel = feed.channel(), "Change feed failed: {}", e);
                        true
                    }
                };
                if reconnected {
                    let Some(fresh) = reconnect(&pool, feed, &tx).await else { break };
                    listener = fresh;
                    // Notifications sent while disconnected are gone; wake the consumer anyway.
                }
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}
