//! Who may vote in, and see the results of, which elections.
//!
//! The voter-facing election listing and vote admission both go through these checks, so a
//! voter is only ever offered ballots they can actually cast.

use chrono::{DateTime, Utc};
use rocket::http::Status;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;
use crate::model::{
    common::election::{ElectionCategory, ElectionStatus},
    db::{election::ElectionCore, user::UserCore},
};

/// Why a voter may not vote in (or see the results of) an election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ineligibility {
    #[error("Only students may vote")]
    NotStudent,
    #[error("Election is not running")]
    NotRunning,
    #[error("Voting has not opened yet")]
    NotStarted,
    #[error("Voting has closed")]
    Closed,
    #[error("Results are available once the election has ended")]
    NotEnded,
    #[error("Voting in SRC elections is not enabled")]
    SrcVotingDisabled,
    #[error("This election is for another department")]
    OtherDepartment,
}

impl Ineligibility {
    pub fn status(self) -> Status {
        match self {
            Self::NotRunning | Self::NotStarted | Self::Closed | Self::NotEnded => {
                Status::BadRequest
            }
            Self::NotStudent | Self::SrcVotingDisabled | Self::OtherDepartment => Status::Forbidden,
        }
    }
}

impl From<Ineligibility> for Error {
    fn from(reason: Ineligibility) -> Self {
        Error::Status(reason.status(), reason.to_string())
    }
}

/// May `voter` cast a vote in `election` at time `now`?
///
/// Checks, in order: the voter is a student; the election is running and `now` lies within
/// its voting window; the voter belongs to the election's electorate.
pub fn check_voting_eligibility(
    voter: &UserCore,
    election: &ElectionCore,
    now: DateTime<Utc>,
    src_voting: bool,
) -> Result<(), Ineligibility> {
    if !voter.is_student() {
        return Err(Ineligibility::NotStudent);
    }
    if election.status != ElectionStatus::Running {
        return Err(Ineligibility::NotRunning);
    }
    if now < election.start_at {
        return Err(Ineligibility::NotStarted);
    }
    if now > election.end_at {
        return Err(Ineligibility::Closed);
    }
    check_electorate(voter, election, src_voting)
}

/// May `voter` see the results of `election`? Only once it has ended, and only for
/// elections they could have voted in.
pub fn check_results_visibility(
    voter: &UserCore,
    election: &ElectionCore,
    src_voting: bool,
) -> Result<(), Ineligibility> {
    if !voter.is_student() {
        return Err(Ineligibility::NotStudent);
    }
    if election.status != ElectionStatus::Ended {
        return Err(Ineligibility::NotEnded);
    }
    check_electorate(voter, election, src_voting)
}

fn check_electorate(
    voter: &UserCore,
    election: &ElectionCore,
    src_voting: bool,
) -> Result<(), Ineligibility> {
    match election.category {
        ElectionCategory::Src if src_voting => Ok(()),
        ElectionCategory::Src => Err(Ineligibility::SrcVotingDisabled),
        ElectionCategory::Department => match (election.department_id, voter.department_id) {
            (Some(election_dept), Some(voter_dept)) if election_dept == voter_dept => Ok(()),
            _ => Err(Ineligibility::OtherDepartment),
        },
    }
}
