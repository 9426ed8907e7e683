use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::{
    candidate::{Candidate, NewCandidate},
    position::Position,
};

use super::id::ApiId;

/// A candidate as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpec {
    pub display_name: String,
    #[serde(default)]
    pub user_id: Option<ApiId>,
    #[serde(default)]
    pub manifesto: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl CandidateSpec {
    /// Validate this spec and attach it to a position (and so its election).
    pub fn into_candidate(self, position: &Position) -> Result<NewCandidate> {
        let display_name = self.display_name.trim();
        if display_name.is_empty() {
            return Err(Error::bad_request("Candidate name must not be empty"));
        }
        Ok(NewCandidate {
            election_id: position.election_id,
            position_id: position.id,
            display_name: display_name.to_string(),
            user_id: self.user_id.map(Into::into),
            manifesto: non_blank(self.manifesto),
            photo_url: non_blank(self.photo_url),
        })
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub position_id: ApiId,
    pub display_name: String,
    pub user_id: Option<ApiId>,
    pub manifesto: Option<String>,
    pub photo_url: Option<String>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            election_id: candidate.election_id.into(),
            position_id: candidate.position_id.into(),
            display_name: candidate.candidate.display_name,
            user_id: candidate.candidate.user_id.map(Into::into),
            manifesto: candidate.candidate.manifesto,
            photo_url: candidate.candidate.photo_url,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateSpec {
        pub fn example(display_name: &str) -> Self {
            Self {
                display_name: display_name.to_string(),
                user_id: None,
                manifesto: Some(format!("Vote {display_name}!")),
                photo_url: None,
            }
        }
    }
}
