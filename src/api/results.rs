use mongodb::bson::doc;
use rocket::{serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken},
            results::ElectionResults,
            stats::{DashboardStats, ElectionCounts},
        },
        common::{election::ElectionStatus, role::Role},
        db::{
            candidate::Candidate,
            department::Department,
            election::Election,
            position::Position,
            user::User,
            vote::{count_votes, Vote},
        },
        mongodb::{Coll, Id},
    },
};

use super::common::{find_by_id, find_in_order};

pub fn routes() -> Vec<Route> {
    routes![election_results, dashboard_stats]
}

/// Live or final results. Draft elections have none.
#[get("/api/admin/elections/<election_id>/results")]
async fn election_results(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Json<ElectionResults>> {
    let election = find_by_id(&elections, election_id, "Election").await?;
    if election.status == ElectionStatus::Draft {
        return Err(Error::bad_request(format!(
            "Election {election_id} is a draft and has no results"
        )));
    }
    Ok(Json(tally(election, &positions, &candidates, &votes).await?))
}

#[get("/api/admin/stats")]
async fn dashboard_stats(
    _token: AuthToken<Admin>,
    departments: Coll<Department>,
    users: Coll<User>,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<Json<DashboardStats>> {
    let mut counts = ElectionCounts::default();
    for status in ElectionStatus::ALL {
        let count = elections
            .count_documents(doc! { "status": status }, None)
            .await?;
        match status {
            ElectionStatus::Draft => counts.draft = count,
            ElectionStatus::Running => counts.running = count,
            ElectionStatus::Ended => counts.ended = count,
        }
    }

    Ok(Json(DashboardStats {
        departments: departments.count_documents(None, None).await?,
        voters: users
            .count_documents(doc! { "role": Role::Student }, None)
            .await?,
        verified_voters: users
            .count_documents(
                doc! { "role": Role::Student, "email_verified": true },
                None,
            )
            .await?,
        elections: counts,
        votes: votes.count_documents(None, None).await?,
    }))
}

/// Count an election's votes and rank the candidates for each position.
pub(super) async fn tally(
    election: Election,
    positions: &Coll<Position>,
    candidates: &Coll<Candidate>,
    votes: &Coll<Vote>,
) -> Result<ElectionResults> {
    let in_election = doc! { "election_id": election.id };
    let positions = find_in_order(positions, in_election.clone()).await?;
    let candidates = find_in_order(candidates, in_election).await?;
    let counts = count_votes(votes, election.id).await?;
    Ok(ElectionResults::tally(election, positions, candidates, &counts))
}
