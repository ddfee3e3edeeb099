//! Shared types for the chat client.
//!
//! Error definitions, connection/session events and the identifiers
//! used across the crate.

pub mod errors;
pub mod events;

pub use errors::{ChatError, ChatResult};
pub use events::{ConnectionEvent, SessionUpdate};

pub type RoomId = i64;
pub type OrganizationId = i64;

/// Fixed authorship flag of a session: staff or member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderRole {
    Admin,
    Member,
}

impl SenderRole {
    pub fn is_admin(self) -> bool {
        matches!(self, SenderRole::Admin)
    }
}

impl From<bool> for SenderRole {
    fn from(is_admin: bool) -> Self {
        if is_admin {
            SenderRole::Admin
        } else {
            SenderRole::Member
        }
    }
}
