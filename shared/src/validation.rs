use std::collections::BTreeMap;
use uuid::Uuid;
use crate::models::Candidate;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown candidate: {0}")]
    UnknownCandidate(Uuid),
    #[error("Candidate {candidate} belongs to election {actual}, not {expected}")]
    WrongElection { candidate: Uuid, expected: Uuid, actual: Uuid },
    #[error("Candidate {candidate} runs for {actual}, not {expected}")]
    WrongPosition { candidate: Uuid, expected: String, actual: String },
    #[error("Position must not be empty")]
    EmptyPosition,
    #[error("Please select at least one candidate")]
    EmptyBallot,
}

/// Checks that `candidate_id` is a nominee for `position` in `election_id`
/// and returns the matching candidate.
pub fn validate_choice<'a>(
    candidates: &'a [Candidate],
    election_id: Uuid,
    position: &str,
    candidate_id: Uuid,
) -> Result<&'a Candidate, ValidationError> {
    if position.trim().is_empty() {
        return Err(ValidationError::EmptyPosition);
    }

    let candidate = candidates.iter()
        .find(|c| c.id == candidate_id)
        .ok_or(ValidationError::UnknownCandidate(candidate_id))?;

    if candidate.election_id != election_id {
        return Err(ValidationError::WrongElection {
            candidate: candidate_id,
            expected: election_id,
            actual: candidate.election_id,
        });
    }
    if candidate.position != position {
        return Err(ValidationError::WrongPosition {
            candidate: candidate_id,
            expected: position.to_string(),
            actual: candidate.position.clone(),
        });
    }
    Ok(candidate)
}

pub fn validate_ballot(
    candidates: &[Candidate],
    election_id: Uuid,
    choices: &BTreeMap<String, Uuid>,
) -> Result<(), ValidationError> {
    if choices.is_empty() { return Err(ValidationError::EmptyBallot); }

    choices.iter()
        .try_for_each(|(position, &candidate_id)| {
            validate_choice(candidates, election_id, position, candidate_id).map(|_| ())
        })
}
