use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Who an election is for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionCategory {
    /// University-wide Students' Representative Council election. Never tied to a department.
    Src,
    /// Scoped to one department; only its students may vote.
    Department,
}

impl ElectionCategory {
    /// Does this category require the election to name a department?
    pub fn requires_department(self) -> bool {
        self == Self::Department
    }
}

impl From<ElectionCategory> for Bson {
    fn from(category: ElectionCategory) -> Self {
        to_bson(&category).expect("Serialisation is infallible")
    }
}
