//! Error types for Postern

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Account Errors
    #[error("An account with this login already exists")]
    AccountExists,

    #[error("The specified account does not exist")]
    NoSuchAccount,

    #[error("The specified account does not exist: {0}")]
    NoSuchAccountNamed(String),

    #[error("The specified mail server does not exist")]
    NoSuchServer,

    #[error("The specified user does not exist")]
    NoSuchUser,

    // Access Errors
    #[error("Access Denied")]
    AccessDenied,

    // Validation Errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Database Errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    // Internal Errors
    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::AccountExists => "AccountExists",
            Error::NoSuchAccount | Error::NoSuchAccountNamed(_) => "NoSuchAccount",
            Error::NoSuchServer => "NoSuchServer",
            Error::NoSuchUser => "NoSuchUser",
            Error::AccessDenied => "AccessDenied",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::DatabaseError(_) => "InternalError",
            Error::InternalError(_) => "InternalError",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::AccountExists.code(), "AccountExists");
        assert_eq!(Error::NoSuchAccountNamed("a@b.c".into()).code(), "NoSuchAccount");
        assert_eq!(Error::DatabaseError("locked".into()).code(), "InternalError");
    }
}
