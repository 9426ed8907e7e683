use serde::{Deserialize, Serialize};

/// Number of elections in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCounts {
    pub draft: u64,
    pub running: u64,
    pub ended: u64,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub departments: u64,
    pub voters: u64,
    /// Voters who have verified their email.
    pub verified_voters: u64,
    pub elections: ElectionCounts,
    pub votes: u64,
}
