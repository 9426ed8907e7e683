//! Routes for signed-in students: browsing elections, voting and results.

use std::collections::HashMap;

use chrono::Utc;
use log::info;
use mongodb::bson::doc;
use rocket::{response::status::Created, serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, Student},
            ballot::{Ballot, BallotPosition, Eligibility, VoterElection, VoterElectionList},
            election::ElectionDescription,
            results::ElectionResults,
            vote::{VoteReceipt, VoteRequest},
        },
        common::{
            election::{ElectionCategory, ElectionStatus},
            eligibility::{check_results_visibility, check_voting_eligibility, Ineligibility},
        },
        db::{
            candidate::Candidate,
            election::Election,
            position::Position,
            user::User,
            vote::{NewVote, Vote},
        },
        mongodb::{inserted_id, is_duplicate_key_error, Coll, Id},
    },
};

use super::{
    common::{find_by_id, find_in_order},
    results::tally,
};

pub fn routes() -> Vec<Route> {
    routes![
        list_elections,
        get_ballot,
        cast_vote,
        list_results,
        election_results,
    ]
}

const ALREADY_VOTED: &str = "You have already voted for this position";

/// Running elections the voter can see: SRC elections and those of their own department.
#[get("/api/voter/elections")]
async fn list_elections(
    token: AuthToken<Student>,
    users: Coll<User>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    votes: Coll<Vote>,
    config: &State<Config>,
) -> Result<Json<VoterElectionList>> {
    let voter = token.user(&users).await?;
    let now = Utc::now();

    let filter = doc! {
        "status": ElectionStatus::Running,
        "$or": visible_to(&voter),
    };
    let mut listed = Vec::new();
    for election in find_in_order(&elections, filter).await? {
        let eligibility = check_voting_eligibility(&voter, &election, now, config.src_voting());
        let in_election = doc! { "election_id": election.id };
        let position_count = positions.count_documents(in_election.clone(), None).await?;
        let mut voted = in_election;
        voted.insert("voter_id", voter.id);
        let positions_voted = votes.count_documents(voted, None).await?;
        listed.push(VoterElection {
            election: election.into(),
            eligibility: eligibility.into(),
            positions_voted,
            position_count,
        });
    }

    Ok(Json(VoterElectionList {
        server_time: now,
        elections: listed,
    }))
}

/// An election's positions and candidates, marking the choices already made.
#[get("/api/voter/elections/<election_id>")]
async fn get_ballot(
    token: AuthToken<Student>,
    election_id: Id,
    users: Coll<User>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    config: &State<Config>,
) -> Result<Json<Ballot>> {
    let voter = token.user(&users).await?;
    let election = find_visible_election(&elections, election_id, &voter).await?;
    let now = Utc::now();
    let eligibility = check_voting_eligibility(&voter, &election, now, config.src_voting());

    let in_election = doc! { "election_id": election_id };
    let positions = find_in_order(&positions, in_election.clone()).await?;
    let candidates = find_in_order(&candidates, in_election.clone()).await?;
    let mut mine = in_election;
    mine.insert("voter_id", voter.id);
    let choices: HashMap<Id, Id> = find_in_order(&votes, mine)
        .await?
        .into_iter()
        .map(|vote| (vote.position_id, vote.candidate_id))
        .collect();

    let positions = positions
        .into_iter()
        .map(|position| BallotPosition {
            candidates: candidates
                .iter()
                .filter(|candidate| candidate.position_id == position.id)
                .cloned()
                .map(Into::into)
                .collect(),
            voted_candidate_id: choices.get(&position.id).copied().map(Into::into),
            position: position.into(),
        })
        .collect();

    Ok(Json(Ballot {
        election: election.into(),
        eligibility: Eligibility::from(eligibility),
        server_time: now,
        positions,
    }))
}

/// Cast a vote for one position.
///
/// Checked in order: the voter may vote in this election now, the position belongs to the
/// election, the candidate stands for the position, and the voter has not yet voted for it.
/// The unique index on votes settles any race with a concurrent submission.
#[post("/api/voter/elections/<election_id>/votes", data = "<request>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn cast_vote(
    token: AuthToken<Student>,
    election_id: Id,
    request: Json<VoteRequest>,
    users: Coll<User>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    new_votes: Coll<NewVote>,
    votes: Coll<Vote>,
    config: &State<Config>,
) -> Result<Created<Json<VoteReceipt>>> {
    let voter = token.user(&users).await?;
    let election = find_by_id(&elections, election_id, "Election").await?;
    check_voting_eligibility(&voter, &election, Utc::now(), config.src_voting())?;

    let position_id: Id = request.position_id.into();
    let position = positions
        .find_one(doc! { "_id": position_id, "election_id": election_id }, None)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("Position {position_id} in election {election_id}"))
        })?;

    let candidate_id: Id = request.candidate_id.into();
    let candidate = candidates
        .find_one(doc! { "_id": candidate_id, "position_id": position.id }, None)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("Candidate {candidate_id} for position {position_id}"))
        })?;

    let existing = doc! {
        "voter_id": voter.id,
        "election_id": election_id,
        "position_id": position.id,
    };
    if votes.find_one(existing, None).await?.is_some() {
        return Err(Error::conflict(ALREADY_VOTED));
    }

    let vote = NewVote {
        voter_id: voter.id,
        election_id,
        position_id: position.id,
        candidate_id: candidate.id,
        cast_at: Utc::now(),
    };
    let id = record_vote(&new_votes, &vote).await?;
    info!("Voter {} voted in election {election_id}", voter.id);

    let receipt = VoteReceipt::from(Vote { id, vote });
    Ok(Created::new(uri!(get_ballot(election_id)).to_string()).body(Json(receipt)))
}

/// Ended elections whose results the voter may see.
#[get("/api/voter/results")]
async fn list_results(
    token: AuthToken<Student>,
    users: Coll<User>,
    elections: Coll<Election>,
    config: &State<Config>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let voter = token.user(&users).await?;
    let filter = doc! {
        "status": ElectionStatus::Ended,
        "$or": visible_to(&voter),
    };
    let visible = find_in_order(&elections, filter)
        .await?
        .into_iter()
        .filter(|election| {
            check_results_visibility(&voter, election, config.src_voting()).is_ok()
        })
        .map(Into::into)
        .collect();
    Ok(Json(visible))
}

#[get("/api/voter/elections/<election_id>/results")]
#[allow(clippy::too_many_arguments)]
async fn election_results(
    token: AuthToken<Student>,
    election_id: Id,
    users: Coll<User>,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    config: &State<Config>,
) -> Result<Json<ElectionResults>> {
    let voter = token.user(&users).await?;
    let election = find_visible_election(&elections, election_id, &voter).await?;
    check_results_visibility(&voter, &election, config.src_voting())?;
    Ok(Json(tally(election, &positions, &candidates, &votes).await?))
}

/// Filter clauses selecting SRC elections and elections of the voter's department.
/// Insert a vote. The unique (voter, election, position) index turns a racing second vote
/// into the same conflict as the pre-check.
async fn record_vote(new_votes: &Coll<NewVote>, vote: &NewVote) -> Result<Id> {
    let result = new_votes.insert_one(vote, None).await.map_err(|e| {
        if is_duplicate_key_error(&e) {
            Error::conflict(ALREADY_VOTED)
        } else {
            e.into()
        }
    })?;
    Ok(inserted_id(result))
}

fn visible_to(voter: &User) -> Vec<mongodb::bson::Document> {
    let mut clauses = vec![doc! { "category": ElectionCategory::Src }];
    if let Some(department_id) = voter.department_id {
        clauses.push(doc! {
            "category": ElectionCategory::Department,
            "department_id": department_id,
        });
    }
    clauses
}

/// Find an election the voter is allowed to know about. Drafts do not exist as far as voters
/// are concerned, and other departments' elections are off limits.
async fn find_visible_election(
    elections: &Coll<Election>,
    election_id: Id,
    voter: &User,
) -> Result<Election> {
    let election = find_by_id(elections, election_id, "Election").await?;
    if election.status == ElectionStatus::Draft {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    if election.category == ElectionCategory::Department
        && election.department_id != voter.department_id
    {
        return Err(Ineligibility::OtherDepartment.into());
    }
    Ok(election)
}
