use thiserror::Error;

use crate::identity::Role;

/// Reasons a room join is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("Unknown room '{0}'")]
    UnknownRoom(String),

    #[error("Role '{role}' may not join room '{room}'")]
    Forbidden { room: String, role: Role },
}
