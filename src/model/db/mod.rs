//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod candidate;
pub mod department;
pub mod election;
pub mod login_otp;
pub mod position;
pub mod user;
pub mod vote;
