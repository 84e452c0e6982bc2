use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;
use shared::models::*;
use shared::tally::CandidatesByPosition;
use shared::validation::{validate_ballot, validate_choice};
use shared::voter::VoterIdentity;
use crate::auth::Authenticator;
use crate::error::LedgerError;
use crate::store::ElectionStore;

/// How a voter may revise a ballot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BallotPolicy {
    /// Each position can be changed at any time; repeating a choice is a no-op.
    #[default]
    ReplaceOnChange,
    /// Any recorded vote locks the voter out of the whole election.
    SingleSubmission,
}

/// Records voters' choices, one live vote per voter per position.
pub struct VoteLedger<S, A> {
    store: Arc<S>,
    auth: Arc<A>,
    policy: BallotPolicy,
}

impl<S: ElectionStore, A: Authenticator> VoteLedger<S, A> {
    pub fn new(store: Arc<S>, auth: Arc<A>) -> Self {
        Self::with_policy(store, auth, BallotPolicy::default())
    }

    pub fn with_policy(store: Arc<S>, auth: Arc<A>, policy: BallotPolicy) -> Self {
        Self { store, auth, policy }
    }

    pub fn policy(&self) -> BallotPolicy {
        self.policy
    }

    fn voter(&self) -> Result<VoterIdentity, LedgerError> {
        let voter = self.auth.current_voter().ok_or(LedgerError::NotAuthenticated)?;
        Span::current().record("voter_id", voter.id.as_str());
        Ok(voter)
    }

    async fn check_policy(&self, election_id: Uuid, voter_id: &str) -> Result<(), LedgerError> {
        if self.policy == BallotPolicy::SingleSubmission
            && !self.store.voter_votes(election_id, voter_id).await?.is_empty()
        {
            return Err(LedgerError::AlreadyVoted { election_id, voter_id: voter_id.to_string() });
        }
        Ok(())
    }

    /// Points the signed-in voter's vote for `position` at `candidate_id`.
    ///
    /// Re-casting the current choice is a no-op. Changing it overwrites the
    /// record in a single write, so the previous choice stays live until the
    /// new one has landed.
    #[instrument(skip(self), fields(voter_id))]
    pub async fn cast_vote(
        &self,
        election_id: Uuid,
        position: &str,
        candidate_id: Uuid,
    ) -> Result<CastOutcome, LedgerError> {
        let voter = self.voter()?;
        let candidates = self.store.candidates(election_id).await?;
        validate_choice(&candidates, election_id, position, candidate_id)?;
        self.check_policy(election_id, &voter.id).await?;

        self.record(VoteKey::new(election_id, position, voter.id), candidate_id).await
    }

    /// Casts a whole ballot. Every choice is validated before anything is
    /// written; positions are then recorded one at a time.
    #[instrument(skip(self, choices), fields(voter_id, positions = choices.len()))]
    pub async fn submit_ballot(
        &self,
        election_id: Uuid,
        choices: &BTreeMap<String, Uuid>,
    ) -> Result<BallotReceipt, LedgerError> {
        let voter = self.voter()?;
        let candidates = self.store.candidates(election_id).await?;
        validate_ballot(&candidates, election_id, choices)?;
        self.check_policy(election_id, &voter.id).await?;

        let mut outcomes = Vec::with_capacity(choices.len());
        for (position, &candidate_id) in choices {
            let key = VoteKey::new(election_id, position.clone(), voter.id.clone());
            outcomes.push((position.clone(), self.record(key, candidate_id).await?));
        }

        let receipt = BallotReceipt { election_id, voter_id: voter.id, outcomes };
        info!(changed = receipt.changed(), "🗳️ Ballot submitted");
        Ok(receipt)
    }

    async fn record(&self, key: VoteKey, candidate_id: Uuid) -> Result<CastOutcome, LedgerError> {
        match self.store.vote(&key).await? {
            Some(current) if current.candidate_id == candidate_id => {
                debug!(position = %key.position, "Choice unchanged, nothing to write");
                Ok(CastOutcome::Unchanged)
            }
            Some(current) => {
                let previous = current.candidate_id;
                if let Err(e) = self.store.upsert_vote(&key, candidate_id).await {
                    warn!(position = %key.position, %previous, "Replacement not saved, keeping previous vote: {}", e);
                    return Err(e.into());
                }
                info!(position = %key.position, %previous, %candidate_id, "✓ Vote replaced");
                Ok(CastOutcome::Replaced { previous })
            }
            None => {
                self.store.upsert_vote(&key, candidate_id).await?;
                info!(position = %key.position, %candidate_id, "✓ Vote recorded");
                Ok(CastOutcome::Recorded)
            }
        }
    }

    /// The signed-in voter's current picks, in ballot order. Picks whose
    /// candidate has since been removed are skipped.
    #[instrument(skip(self), fields(voter_id))]
    pub async fn my_votes(&self, election_id: Uuid) -> Result<Vec<MyVote>, LedgerError> {
        let voter = self.voter()?;
        let (candidates, votes) = futures::try_join!(
            self.store.candidates(election_id),
            self.store.voter_votes(election_id, &voter.id),
        )?;
        let grouped = CandidatesByPosition::group(candidates);

        let picks: Vec<MyVote> = grouped.iter()
            .filter_map(|(position, members)| {
                let vote = votes.iter().find(|v| v.position == position)?;
                let candidate = members.iter().find(|c| c.id == vote.candidate_id)?;
                Some(MyVote {
                    position: position.to_string(),
                    candidate: candidate.clone(),
                    cast_at: vote.cast_at,
                })
            })
            .collect();

        if picks.len() < votes.len() {
            debug!(skipped = votes.len() - picks.len(), "Skipped picks for removed candidates");
        }
        Ok(picks)
    }
}
