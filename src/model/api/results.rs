use serde::{Deserialize, Serialize};

use crate::model::db::{
    candidate::Candidate, election::Election, position::Position, vote::VoteCounts,
};

use super::{election::ElectionDescription, id::ApiId};

/// One candidate's share of a position's votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub candidate_id: ApiId,
    pub display_name: String,
    pub votes: u64,
    /// `100 * votes / total_votes`, or 0 when nobody voted.
    pub percentage: f64,
}

/// The tally for one position, leading candidate first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResults {
    pub position_id: ApiId,
    pub name: String,
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
}

/// Results for a whole election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election: ElectionDescription,
    pub positions: Vec<PositionResults>,
}

impl ElectionResults {
    /// Tally the given vote counts.
    ///
    /// `positions` and `candidates` must be in listing order; candidates with equal votes keep
    /// that order. Candidates absent from `counts` have no votes.
    pub fn tally(
        election: Election,
        positions: Vec<Position>,
        candidates: Vec<Candidate>,
        counts: &VoteCounts,
    ) -> Self {
        let positions = positions
            .into_iter()
            .map(|position| {
                let mut results: Vec<CandidateResult> = candidates
                    .iter()
                    .filter(|candidate| candidate.position_id == position.id)
                    .map(|candidate| CandidateResult {
                        candidate_id: candidate.id.into(),
                        display_name: candidate.display_name.clone(),
                        votes: counts
                            .get(&(position.id, candidate.id))
                            .copied()
                            .unwrap_or(0),
                        percentage: 0.0,
                    })
                    .collect();

                let total_votes: u64 = results.iter().map(|result| result.votes).sum();
                if total_votes > 0 {
                    for result in &mut results {
                        result.percentage = 100.0 * result.votes as f64 / total_votes as f64;
                    }
                }
                // `sort_by` is stable, so ties stay in listing order.
                results.sort_by(|a, b| b.votes.cmp(&a.votes));

                PositionResults {
                    position_id: position.id.into(),
                    name: position.position.name,
                    total_votes,
                    candidates: results,
                }
            })
            .collect();

        Self {
            election: election.into(),
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        db::{
            candidate::CandidateCore, election::ElectionCore, position::PositionCore,
        },
        mongodb::Id,
    };

    fn election() -> Election {
        Election {
            id: Id::new(),
            election: ElectionCore::running_example(Id::new(), Id::new()),
        }
    }

    fn position(election: &Election, name: &str) -> Position {
        Position {
            id: Id::new(),
            position: PositionCore {
                election_id: election.id,
                name: name.to_string(),
                max_choices: 1,
            },
        }
    }

    fn candidate(position: &Position, name: &str) -> Candidate {
        Candidate {
            id: Id::new(),
            candidate: CandidateCore {
                election_id: position.election_id,
                position_id: position.id,
                display_name: name.to_string(),
                user_id: None,
                manifesto: None,
                photo_url: None,
            },
        }
    }

    #[test]
    fn single_vote_takes_everything() {
        let election = election();
        let rep = position(&election, "Class Representative");
        let a = candidate(&rep, "A");
        let b = candidate(&rep, "B");
        let counts = VoteCounts::from([((rep.id, a.id), 1)]);

        let results =
            ElectionResults::tally(election, vec![rep], vec![a.clone(), b.clone()], &counts);

        let position = &results.positions[0];
        assert_eq!(position.total_votes, 1);
        assert_eq!(position.candidates[0].candidate_id, ApiId::from(a.id));
        assert_eq!(position.candidates[0].votes, 1);
        assert_eq!(position.candidates[0].percentage, 100.0);
        assert_eq!(position.candidates[1].candidate_id, ApiId::from(b.id));
        assert_eq!(position.candidates[1].votes, 0);
        assert_eq!(position.candidates[1].percentage, 0.0);
    }

    #[test]
    fn no_votes_gives_zero_percentages_in_listing_order() {
        let election = election();
        let rep = position(&election, "Treasurer");
        let candidates: Vec<_> = ["A", "B", "C"].iter().map(|n| candidate(&rep, n)).collect();

        let results =
            ElectionResults::tally(election, vec![rep], candidates.clone(), &VoteCounts::new());

        let names: Vec<_> = results.positions[0]
            .candidates
            .iter()
            .map(|c| c.display_name.as_str())
            .collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert!(results.positions[0]
            .candidates
            .iter()
            .all(|c| c.percentage == 0.0));
    }

    #[test]
    fn sorted_descending_with_stable_ties() {
        let election = election();
        let rep = position(&election, "Secretary");
        let a = candidate(&rep, "A");
        let b = candidate(&rep, "B");
        let c = candidate(&rep, "C");
        let counts = VoteCounts::from([
            ((rep.id, a.id), 2),
            ((rep.id, b.id), 5),
            ((rep.id, c.id), 2),
        ]);

        let results = ElectionResults::tally(election, vec![rep], vec![a, b, c], &counts);

        let names: Vec<_> = results.positions[0]
            .candidates
            .iter()
            .map(|c| c.display_name.as_str())
            .collect();
        assert_eq!(names, ["B", "A", "C"]);
    }

    #[test]
    fn positions_are_tallied_separately() {
        let election = election();
        let chair = position(&election, "Chair");
        let treasurer = position(&election, "Treasurer");
        let x = candidate(&chair, "X");
        let y = candidate(&chair, "Y");
        let z = candidate(&treasurer, "Z");
        let counts = VoteCounts::from([
            ((chair.id, x.id), 3),
            ((chair.id, y.id), 1),
            ((treasurer.id, z.id), 4),
        ]);

        let results =
            ElectionResults::tally(election, vec![chair, treasurer], vec![x, y, z], &counts);

        for (position, expected_total) in results.positions.iter().zip([4, 4]) {
            let sum: u64 = position.candidates.iter().map(|c| c.votes).sum();
            assert_eq!(sum, position.total_votes);
            assert_eq!(position.total_votes, expected_total);
            let percent: f64 = position.candidates.iter().map(|c| c.percentage).sum();
            assert!((percent - 100.0).abs() < 1e-9);
        }
        assert_eq!(results.positions[0].candidates[0].percentage, 75.0);
    }
}
