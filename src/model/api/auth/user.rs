use crate::model::common::role::Role;

/// A kind of signed-in account, deciding which roles an [`AuthToken`](super::AuthToken) for it
/// accepts.
pub trait Account {
    /// Does a token carrying `role` belong to this kind of account?
    fn permits(role: Role) -> bool;
}

/// Marker for administrator accounts.
#[derive(Debug)]
pub enum Admin {}

/// Marker for student (voter) accounts.
#[derive(Debug)]
pub enum Student {}

/// Marker for any signed-in account.
#[derive(Debug)]
pub enum AnyAccount {}

impl Account for Admin {
    fn permits(role: Role) -> bool {
        role == Role::Admin
    }
}

impl Account for Student {
    fn permits(role: Role) -> bool {
        role == Role::Student
    }
}

impl Account for AnyAccount {
    fn permits(_: Role) -> bool {
        true
    }
}
