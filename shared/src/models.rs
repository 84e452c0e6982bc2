use serde::{Serialize, Deserialize};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    pub id: Uuid,
    pub title: String,
    pub date: Option<Date>,
    pub starts_at: Option<Time>,
    pub ends_at: Option<Time>,
}

impl Election {
    pub fn new(id: Uuid, title: impl Into<String>) -> Self {
        Self { id, title: title.into(), date: None, starts_at: None, ends_at: None }
    }

    pub fn scheduled(mut self, date: Date, starts_at: Time, ends_at: Time) -> Self {
        self.date = Some(date);
        self.starts_at = Some(starts_at);
        self.ends_at = Some(ends_at);
        self
    }

    /// Start and end of polling, when the full schedule is known.
    pub fn voting_window(&self) -> Option<(PrimitiveDateTime, PrimitiveDateTime)> {
        let date = self.date?;
        Some((date.with_time(self.starts_at?), date.with_time(self.ends_at?)))
    }

    /// Schedules are wall-clock and carry no offset; they are compared in UTC.
    /// An election without a complete schedule is always open.
    pub fn is_open_at(&self, now: OffsetDateTime) -> bool {
        match self.voting_window() {
            Some((start, end)) => {
                let now = PrimitiveDateTime::new(now.date(), now.time());
                start <= now && now <= end
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: Uuid,
    pub election_id: Uuid,
    pub position: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_duration: Option<String>,
}

impl Candidate {
    pub fn new(election_id: Uuid, position: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            election_id,
            position: position.into(),
            name: name.into(),
            photo_url: None,
            term_duration: None,
        }
    }
}

/// Storage key of a live vote: one voter, one position, one election.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct VoteKey {
    pub election_id: Uuid,
    pub position: String,
    pub voter_id: String,
}

impl VoteKey {
    pub fn new(election_id: Uuid, position: impl Into<String>, voter_id: impl Into<String>) -> Self {
        Self { election_id, position: position.into(), voter_id: voter_id.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub election_id: Uuid,
    pub position: String,
    pub voter_id: String,
    pub candidate_id: Uuid,
    pub cast_at: OffsetDateTime,
}

impl Vote {
    pub fn key(&self) -> VoteKey {
        VoteKey::new(self.election_id, self.position.clone(), self.voter_id.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum CastOutcome {
    Recorded,
    Replaced { previous: Uuid },
    Unchanged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BallotReceipt {
    pub election_id: Uuid,
    pub voter_id: String,
    pub outcomes: Vec<(String, CastOutcome)>,
}

impl BallotReceipt {
    /// Number of positions whose stored choice actually changed.
    pub fn changed(&self) -> usize {
        self.outcomes.iter()
            .filter(|(_, outcome)| *outcome != CastOutcome::Unchanged)
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MyVote {
    pub position: String,
    pub candidate: Candidate,
    pub cast_at: OffsetDateTime,
}
