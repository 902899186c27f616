//! Defines the crate level error type and its conversion from SQLite errors.

use crate::{account::AccountId, ledger::LedgerMode};

/// The errors that may occur when working with the ledger.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An account with the given name is already registered.
    #[error("the account \"{0}\" already exists")]
    DuplicateAccount(String),

    /// An account name was empty or only whitespace.
    #[error("account name cannot be empty")]
    EmptyAccountName,

    /// The name and password did not match a registered account.
    ///
    /// Unknown names and wrong passwords are deliberately reported the same
    /// way so callers cannot discover which names are registered.
    #[error("invalid account name or password")]
    AuthenticationFailed,

    /// A transaction amount was zero, negative or not a finite number.
    ///
    /// Amounts are always positive, the direction of the money is given by
    /// the transaction kind.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// An expense was submitted without a category.
    #[error("expenses must have a category")]
    MissingCategory,

    /// A transaction was added to a scoped ledger without an owning account.
    #[error("an owning account is required in scoped mode")]
    MissingOwner,

    /// The owner ID used to create a transaction did not match an account.
    #[error("the account ID {0} does not refer to a registered account")]
    InvalidOwner(AccountId),

    /// Transactions cannot be deleted from a scoped ledger.
    #[error("deleting transactions is only supported in global mode")]
    DeleteUnsupported,

    /// The database was created in one ledger mode and opened in the other.
    ///
    /// Owned and ownerless transactions are never mixed in one database.
    #[error("the database is a {stored} ledger and cannot be opened in {requested} mode")]
    ModeMismatch {
        /// The mode recorded in the database.
        stored: LedgerMode,
        /// The mode the caller asked for.
        requested: LedgerMode,
    },

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged, it should not be shown to
    /// end users.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The requested record was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested record could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
