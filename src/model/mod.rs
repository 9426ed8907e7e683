//! Data types, split by where they live.
//!
//! - [`db`]: documents as stored in MongoDB.
//! - [`api`]: request and response bodies.
//! - [`common`]: types shared by both, and the rules that relate them.
//! - [`mongodb`]: collection and ID plumbing.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
