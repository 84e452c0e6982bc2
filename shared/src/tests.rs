#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use time::{macros::{date, datetime, time}, OffsetDateTime};
    use uuid::Uuid;
    use crate::error::{Error, ErrorCode};
    use crate::models::{CastOutcome, BallotReceipt, Candidate, Election, Vote};
    use crate::tally::{compute_tally, CandidatesByPosition};
    use crate::validation::{validate_ballot, validate_choice, ValidationError};

    fn candidates(election_id: Uuid, position: &str, names: &[&str]) -> Vec<Candidate> {
        names.iter().map(|name| Candidate::new(election_id, position, *name)).collect()
    }

    fn vote(candidate: &Candidate, voter: &str) -> Vote {
        Vote {
            election_id: candidate.election_id,
            position: candidate.position.clone(),
            voter_id: voter.to_string(),
            candidate_id: candidate.id,
            cast_at: OffsetDateTime::now_utc(),
        }
    }

    fn names(tally: &crate::tally::PositionTally) -> Vec<&str> {
        tally.rows.iter().map(|r| r.candidate.name.as_str()).collect()
    }

    #[test]
    fn test_counts_and_single_leader() {
        let e = Uuid::new_v4();
        let c = candidates(e, "Treasurer", &["A", "B", "C"]);
        let votes = [vote(&c[0], "voter1"), vote(&c[0], "voter2"), vote(&c[1], "voter3")];

        let tally = compute_tally(&CandidatesByPosition::group(c.clone()), &votes, None);
        let treasurer = tally.position("Treasurer").unwrap();

        assert_eq!(treasurer.votes_for(c[0].id), Some(2));
        assert_eq!(treasurer.votes_for(c[1].id), Some(1));
        assert_eq!(treasurer.votes_for(c[2].id), Some(0));
        assert_eq!(names(treasurer), ["A", "B", "C"]);
        assert_eq!(treasurer.leaders().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["A"]);
        assert!(!treasurer.rows[1].is_leader);
        assert!(!treasurer.rows[2].is_leader);
        assert_eq!(tally.counted, 3);
        assert_eq!(tally.excluded, 0);
    }

    #[test]
    fn test_tie_marks_every_leader() {
        let e = Uuid::new_v4();
        let c = candidates(e, "President", &["A", "B"]);
        let votes = [vote(&c[0], "voter1"), vote(&c[1], "voter2")];

        let tally = compute_tally(&CandidatesByPosition::group(c), &votes, None);
        let president = tally.position("President").unwrap();

        assert!(president.rows.iter().all(|r| r.is_leader && r.votes == 1));
        assert_eq!(president.leaders().count(), 2);
    }

    #[test]
    fn test_no_votes_no_leader() {
        let e = Uuid::new_v4();
        let c = candidates(e, "Secretary", &["A", "B"]);

        let tally = compute_tally(&CandidatesByPosition::group(c), &[], None);
        let secretary = tally.position("Secretary").unwrap();

        assert_eq!(secretary.rows.len(), 2, "Zero-vote candidates must stay visible");
        assert!(secretary.rows.iter().all(|r| r.votes == 0 && !r.is_leader));
        assert_eq!(secretary.total_votes(), 0);
    }

    #[test]
    fn test_stale_votes_are_excluded() {
        let e = Uuid::new_v4();
        let c = candidates(e, "Treasurer", &["A", "B"]);
        let removed = Candidate::new(e, "Treasurer", "Gone");
        let votes = [vote(&c[0], "voter1"), vote(&removed, "voter2"), vote(&removed, "voter3")];

        let tally = compute_tally(&CandidatesByPosition::group(c), &votes, None);

        assert_eq!(tally.counted, 1);
        assert_eq!(tally.excluded, 2);
        assert_eq!(tally.counted, votes.len() - tally.excluded);
        assert_eq!(tally.positions.iter().map(|p| p.total_votes()).sum::<u32>(), 1);
    }

    #[test]
    fn test_vote_under_wrong_position_is_stale() {
        let e = Uuid::new_v4();
        let mut c = candidates(e, "President", &["A"]);
        c.extend(candidates(e, "Treasurer", &["B"]));

        let mut misfiled = vote(&c[0], "voter1");
        misfiled.position = "Treasurer".into();

        let tally = compute_tally(&CandidatesByPosition::group(c), &[misfiled], None);
        assert_eq!(tally.excluded, 1);
        assert!(tally.positions.iter().all(|p| p.total_votes() == 0));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let e = Uuid::new_v4();
        let c = candidates(e, "President", &["A", "B", "C", "D"]);
        let votes = [vote(&c[3], "v1"), vote(&c[1], "v2"), vote(&c[3], "v3"), vote(&c[2], "v4")];

        let tally = compute_tally(&CandidatesByPosition::group(c), &votes, None);
        assert_eq!(names(tally.position("President").unwrap()), ["D", "B", "C", "A"]);
    }

    #[test]
    fn test_user_choice_annotation() {
        let e = Uuid::new_v4();
        let mut c = candidates(e, "President", &["A", "B"]);
        c.extend(candidates(e, "Treasurer", &["C", "D"]));
        let votes = [vote(&c[1], "me"), vote(&c[0], "other"), vote(&c[3], "other")];

        let tally = compute_tally(&CandidatesByPosition::group(c), &votes, Some("me"));

        let president = tally.position("President").unwrap();
        let picked: Vec<_> = president.rows.iter().filter(|r| r.is_user_choice).collect();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].candidate.name, "B");
        assert!(tally.position("Treasurer").unwrap().rows.iter().all(|r| !r.is_user_choice));
    }

    #[test]
    fn test_grouping_keeps_first_appearance_order() {
        let e = Uuid::new_v4();
        let c = vec![
            Candidate::new(e, "Treasurer", "A"),
            Candidate::new(e, "President", "B"),
            Candidate::new(e, "Treasurer", "C"),
        ];
        let grouped = CandidatesByPosition::group(c);

        assert_eq!(grouped.positions().collect::<Vec<_>>(), ["Treasurer", "President"]);
        assert_eq!(grouped.get("Treasurer").unwrap().len(), 2);
        assert!(grouped.get("Secretary").is_none());
        assert!(CandidatesByPosition::group(Vec::new()).is_empty());
    }

    #[test]
    fn test_validate_choice() {
        let e = Uuid::new_v4();
        let mut c = candidates(e, "President", &["A"]);
        let elsewhere = Candidate::new(Uuid::new_v4(), "President", "X");
        c.push(elsewhere.clone());

        assert_eq!(validate_choice(&c, e, "President", c[0].id).unwrap().name, "A");
        assert!(matches!(
            validate_choice(&c, e, "Treasurer", c[0].id),
            Err(ValidationError::WrongPosition { .. })
        ));
        assert!(matches!(
            validate_choice(&c, e, "President", elsewhere.id),
            Err(ValidationError::WrongElection { .. })
        ));
        let unknown = Uuid::new_v4();
        assert_eq!(
            validate_choice(&c, e, "President", unknown),
            Err(ValidationError::UnknownCandidate(unknown))
        );
        assert_eq!(validate_choice(&c, e, "  ", c[0].id), Err(ValidationError::EmptyPosition));
    }

    #[test]
    fn test_long_position_labels_are_accepted() {
        let e = Uuid::new_v4();
        let position = "Member-at-Large, Architectural Review and Landscaping Committee";
        let c = candidates(e, position, &["A"]);
        assert_eq!(validate_choice(&c, e, position, c[0].id).unwrap().name, "A");

        let accented = "Présidente du comité d'embellissement et de l'aménagement paysager";
        let c = candidates(e, accented, &["B"]);
        assert!(validate_choice(&c, e, accented, c[0].id).is_ok());
    }

    #[test]
    fn test_validate_ballot() {
        let e = Uuid::new_v4();
        let c = candidates(e, "President", &["A"]);

        assert_eq!(validate_ballot(&c, e, &BTreeMap::new()), Err(ValidationError::EmptyBallot));

        let ok: BTreeMap<_, _> = [("President".to_string(), c[0].id)].into();
        assert!(validate_ballot(&c, e, &ok).is_ok());

        let bad: BTreeMap<_, _> = [
            ("President".to_string(), c[0].id),
            ("Treasurer".to_string(), c[0].id),
        ].into();
        assert!(validate_ballot(&c, e, &bad).is_err());
    }

    #[test]
    fn test_election_window() {
        let e = Election::new(Uuid::new_v4(), "Board 2025")
            .scheduled(date!(2025 - 03 - 01), time!(09:00), time!(17:00));

        assert!(e.is_open_at(datetime!(2025-03-01 12:00 UTC)));
        assert!(!e.is_open_at(datetime!(2025-03-01 18:00 UTC)));
        assert!(!e.is_open_at(datetime!(2025-02-28 12:00 UTC)));

        let unscheduled = Election::new(Uuid::new_v4(), "Special");
        assert!(unscheduled.voting_window().is_none());
        assert!(unscheduled.is_open_at(OffsetDateTime::now_utc()));
    }

    #[test]
    fn test_error_envelope() {
        let err = Error::new(ErrorCode::StoreUnavailable, "Could not record vote").with_details("timeout");
        assert!(err.retryable);
        assert_eq!(err.to_string(), "Election service unavailable: Could not record vote (timeout)");

        let plain = Error::from(ErrorCode::AlreadyVoted);
        assert_eq!(plain.message, "You have already submitted your vote");
        assert!(plain.details.is_none() && !plain.retryable);
        assert!(Error::from(ErrorCode::StoreUnavailable).retryable(false).to_string().ends_with("unavailable"));

        let json = serde_json::to_value(Error::new(ErrorCode::NotAuthenticated, "Sign in")).unwrap();
        assert_eq!(json["code"], "notAuthenticated");
        assert_eq!(json["retryable"], false);
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_receipt_counts_changes() {
        let receipt = BallotReceipt {
            election_id: Uuid::new_v4(),
            voter_id: "me".into(),
            outcomes: vec![
                ("President".into(), CastOutcome::Recorded),
                ("Treasurer".into(), CastOutcome::Unchanged),
                ("Secretary".into(), CastOutcome::Replaced { previous: Uuid::new_v4() }),
            ],
        };
        assert_eq!(receipt.changed(), 2);
    }
}
