use thiserror::Error;

/// Invariant violations that a caller can race into. These are expected
/// outcomes, not bugs; the UI is expected to surface them to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("a project must keep at least one owner")]
    LastOwnerViolation,
    #[error("a pending invitation already exists for this email")]
    DuplicatePendingInvitation,
    #[error("user is already a member of this project")]
    AlreadyMember,
    #[error("invitation has already been processed")]
    InvitationAlreadyProcessed,
    #[error("a user with this email already exists")]
    DuplicateEmail,
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Conflict(#[from] Conflict),

    #[error("validation failed: {0}")]
    Validation(String),

    /// The storage layer could not complete the atomic unit. The only kind
    /// a caller may legitimately retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Unavailable(e.to_string())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
