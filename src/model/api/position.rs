use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::position::{NewPosition, Position},
    mongodb::Id,
};

use super::id::ApiId;

fn default_max_choices() -> u32 {
    1
}

/// A position as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSpec {
    pub name: String,
    #[serde(default = "default_max_choices")]
    pub max_choices: u32,
}

impl PositionSpec {
    /// Validate this spec and attach it to an election.
    pub fn into_position(self, election_id: Id) -> Result<NewPosition> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::bad_request("Position name must not be empty"));
        }
        if self.max_choices < 1 {
            return Err(Error::bad_request("maxChoices must be at least 1"));
        }
        Ok(NewPosition {
            election_id,
            name: name.to_string(),
            max_choices: self.max_choices,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub name: String,
    pub max_choices: u32,
}

impl From<Position> for PositionDescription {
    fn from(position: Position) -> Self {
        Self {
            id: position.id.into(),
            election_id: position.election_id.into(),
            name: position.position.name,
            max_choices: position.position.max_choices,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl PositionSpec {
        pub fn example() -> Self {
            Self {
                name: "Class Representative".to_string(),
                max_choices: 1,
            }
        }
    }
}
