use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::eligibility::Ineligibility;

use super::{
    candidate::CandidateDescription, election::ElectionDescription, id::ApiId,
    position::PositionDescription,
};

/// Whether the signed-in voter may vote in an election, and if not, why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: Option<Ineligibility>,
    /// Human-readable form of `reason`.
    pub message: Option<String>,
}

impl From<Result<(), Ineligibility>> for Eligibility {
    fn from(check: Result<(), Ineligibility>) -> Self {
        match check {
            Ok(()) => Self {
                eligible: true,
                reason: None,
                message: None,
            },
            Err(reason) => Self {
                eligible: false,
                reason: Some(reason),
                message: Some(reason.to_string()),
            },
        }
    }
}

/// An election listed for a voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterElection {
    #[serde(flatten)]
    pub election: ElectionDescription,
    #[serde(flatten)]
    pub eligibility: Eligibility,
    /// Number of positions the voter has already voted in.
    pub positions_voted: u64,
    pub position_count: u64,
}

/// The elections a voter can see, stamped with the server's clock so clients can show
/// accurate countdowns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterElectionList {
    pub server_time: DateTime<Utc>,
    pub elections: Vec<VoterElection>,
}

/// One position on a voter's ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotPosition {
    #[serde(flatten)]
    pub position: PositionDescription,
    pub candidates: Vec<CandidateDescription>,
    /// The candidate this voter already chose, if any.
    pub voted_candidate_id: Option<ApiId>,
}

/// An election's full ballot as seen by one voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    #[serde(flatten)]
    pub election: ElectionDescription,
    #[serde(flatten)]
    pub eligibility: Eligibility,
    pub server_time: DateTime<Utc>,
    pub positions: Vec<BallotPosition>,
}
