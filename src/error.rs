use thiserror::Error;

/// Failure taxonomy for the command boundary. Every variant except `Storage`
/// is recovered locally: the caller gets the message and no state mutates.
#[derive(Debug, Error)]
pub(crate) enum CommandError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("You are already part of a group. Leave it before joining another.")]
    AlreadyMember,

    #[error("Something went wrong, please try again.")]
    Storage(#[source] anyhow::Error),
}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        CommandError::Storage(err)
    }
}

impl CommandError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        CommandError::Validation(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        CommandError::NotFound(msg.into())
    }

    pub(crate) fn unauthorized(msg: impl Into<String>) -> Self {
        CommandError::Unauthorized(msg.into())
    }
}

pub(crate) type CommandResult<T> = Result<T, CommandError>;
