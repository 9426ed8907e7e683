use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::{ElectionCategory, ElectionStatus},
    db::election::{Election, ElectionCore, NewElection},
    mongodb::Id,
};

use super::{candidate::CandidateDescription, id::ApiId, position::PositionDescription};

/// An election as submitted by an admin, for creation or update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: ElectionCategory,
    #[serde(default)]
    pub department_id: Option<ApiId>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl ElectionSpec {
    /// Check the spec describes a consistent election.
    ///
    /// SRC elections must not name a department, department elections must, and voting must
    /// close after it opens.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request("Election name must not be empty"));
        }
        match (self.category.requires_department(), self.department_id) {
            (true, None) => {
                return Err(Error::bad_request(
                    "Department elections must specify a department",
                ))
            }
            (false, Some(_)) => {
                return Err(Error::bad_request(
                    "SRC elections cannot be tied to a department",
                ))
            }
            _ => {}
        }
        if self.end_at <= self.start_at {
            return Err(Error::bad_request("endAt must be after startAt"));
        }
        Ok(())
    }

    /// Convert into a new draft election created by the given admin.
    pub fn into_election(self, created_by_id: Id) -> Result<NewElection> {
        self.validate()?;
        Ok(NewElection {
            name: self.name.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            category: self.category,
            department_id: self.department_id.map(Into::into),
            status: ElectionStatus::Draft,
            start_at: self.start_at,
            end_at: self.end_at,
            created_by_id,
        })
    }

    /// Apply this spec to an existing election, keeping its status and creator.
    pub fn apply_to(self, election: &mut ElectionCore) -> Result<()> {
        let updated = self.into_election(election.created_by_id)?;
        *election = ElectionCore {
            status: election.status,
            ..updated
        };
        Ok(())
    }
}

/// A requested status change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ElectionStatus,
}

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    pub description: Option<String>,
    pub category: ElectionCategory,
    pub department_id: Option<ApiId>,
    pub status: ElectionStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub created_by_id: ApiId,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let Election { id, election } = election;
        Self {
            id: id.into(),
            name: election.name,
            description: election.description,
            category: election.category,
            department_id: election.department_id.map(Into::into),
            status: election.status,
            start_at: election.start_at,
            end_at: election.end_at,
            created_by_id: election.created_by_id.into(),
        }
    }
}

/// A position together with its candidates, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionWithCandidates {
    #[serde(flatten)]
    pub position: PositionDescription,
    pub candidates: Vec<CandidateDescription>,
}

/// An election with its full structure, as seen by admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDetail {
    #[serde(flatten)]
    pub election: ElectionDescription,
    pub positions: Vec<PositionWithCandidates>,
}
