use mongodb::bson::{to_bson, Bson};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};

/// States in the election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionStatus {
    /// Under construction, only visible to admins.
    Draft,
    /// Accepting votes between the start and end times.
    Running,
    /// Closed. Results may be published to voters.
    Ended,
}

impl ElectionStatus {
    pub const ALL: [ElectionStatus; 3] = [Self::Draft, Self::Running, Self::Ended];

    /// Can an election move from this status to `next`?
    /// Transitions only ever move forwards.
    pub fn can_become(self, next: ElectionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Running) | (Self::Draft, Self::Ended) | (Self::Running, Self::Ended)
        )
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
