use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use tracing::warn;
use uuid::Uuid;
use crate::error::ErrorCode;
use crate::models::{Candidate, Vote};

/// Candidates partitioned by position. Positions keep the order in which
/// they first appear; candidates keep their input order within a position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatesByPosition {
    groups: Vec<(String, Vec<Candidate>)>,
}

impl CandidatesByPosition {
    pub fn group<I: IntoIterator<Item = Candidate>>(candidates: I) -> Self {
        let mut groups: Vec<(String, Vec<Candidate>)> = Vec::new();
        for candidate in candidates {
            match groups.iter_mut().find(|(position, _)| *position == candidate.position) {
                Some((_, members)) => members.push(candidate),
                None => groups.push((candidate.position.clone(), vec![candidate])),
            }
        }
        Self { groups }
    }

    pub fn positions(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(position, _)| position.as_str())
    }

    pub fn get(&self, position: &str) -> Option<&[Candidate]> {
        self.groups.iter()
            .find(|(p, _)| p == position)
            .map(|(_, members)| members.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Candidate])> {
        self.groups.iter().map(|(p, members)| (p.as_str(), members.as_slice()))
    }

    fn find(&self, candidate_id: Uuid) -> Option<&Candidate> {
        self.groups.iter()
            .flat_map(|(_, members)| members.iter())
            .find(|c| c.id == candidate_id)
    }

    pub fn is_empty(&self) -> bool { self.groups.is_empty() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyRow {
    pub candidate: Candidate,
    pub votes: u32,
    pub is_leader: bool,
    pub is_user_choice: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionTally {
    pub position: String,
    pub rows: Vec<TallyRow>,
}

impl PositionTally {
    pub fn leaders(&self) -> impl Iterator<Item = &Candidate> {
        self.rows.iter().filter(|r| r.is_leader).map(|r| &r.candidate)
    }

    pub fn votes_for(&self, candidate_id: Uuid) -> Option<u32> {
        self.rows.iter().find(|r| r.candidate.id == candidate_id).map(|r| r.votes)
    }

    pub fn total_votes(&self) -> u32 {
        self.rows.iter().map(|r| r.votes).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub positions: Vec<PositionTally>,
    /// Live votes that landed on a candidate.
    pub counted: usize,
    /// Live votes dropped because their candidate is gone or moved.
    pub excluded: usize,
}

impl Tally {
    pub fn position(&self, position: &str) -> Option<&PositionTally> {
        self.positions.iter().find(|p| p.position == position)
    }
}

/// Rebuilds the per-position ranking from scratch.
///
/// Votes are resolved by candidate id only. A vote whose candidate is
/// missing, or whose candidate runs for a different position than the one
/// the vote was cast under, is stale: it is logged and left out of every
/// count. `viewer` marks that voter's own picks.
pub fn compute_tally(
    candidates: &CandidatesByPosition,
    votes: &[Vote],
    viewer: Option<&str>,
) -> Tally {
    let mut counts: HashMap<Uuid, u32> = HashMap::new();
    let mut picks: HashMap<&str, Uuid> = HashMap::new();
    let mut excluded = 0;

    for vote in votes {
        match candidates.find(vote.candidate_id) {
            Some(candidate) if candidate.position == vote.position => {
                *counts.entry(vote.candidate_id).or_insert(0) += 1;
                if viewer == Some(vote.voter_id.as_str()) {
                    picks.insert(vote.position.as_str(), vote.candidate_id);
                }
            }
            _ => {
                excluded += 1;
                warn!(
                    code = ?ErrorCode::StaleReference,
                    election_id = %vote.election_id,
                    position = %vote.position,
                    candidate_id = %vote.candidate_id,
                    "Excluding vote: {}", ErrorCode::StaleReference
                );
            }
        }
    }

    let positions = candidates.iter()
        .map(|(position, members)| {
            let mut rows: Vec<TallyRow> = members.iter()
                .map(|candidate| TallyRow {
                    votes: counts.get(&candidate.id).copied().unwrap_or(0),
                    is_leader: false,
                    is_user_choice: picks.get(position) == Some(&candidate.id),
                    candidate: candidate.clone(),
                })
                .collect();

            rows.sort_by(|a, b| b.votes.cmp(&a.votes));

            let max = rows.first().map_or(0, |r| r.votes);
            if max > 0 {
                rows.iter_mut()
                    .take_while(|r| r.votes == max)
                    .for_each(|r| r.is_leader = true);
            }

            PositionTally { position: position.to_string(), rows }
        })
        .collect();

    Tally { positions, counted: votes.len() - excluded, excluded }
}
