//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Field names are camelCase.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod auth;
pub mod ballot;
pub mod candidate;
pub mod department;
pub mod election;
pub mod id;
pub mod otp;
pub mod pagination;
pub mod position;
pub mod results;
pub mod stats;
pub mod vote;
pub mod voter;
