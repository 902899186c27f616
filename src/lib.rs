//! Tally is a small personal finance tracker.
//!
//! Accounts record income and expense transactions in a SQLite database and
//! the running balance is computed on demand from those records.
//!
//! The [Ledger] handle is the main entry point. The modules also expose the
//! same operations as free functions taking a [rusqlite::Connection] for
//! callers that manage their own connection.

#![warn(missing_docs)]

pub mod account;
pub mod balance;
pub mod db;
mod error;
mod ledger;
mod password;
pub mod transaction;

pub use account::{Account, AccountId};
pub use balance::Totals;
pub use error::Error;
pub use ledger::{Ledger, LedgerMode};
pub use password::{PasswordHash, ValidatedPassword};
pub use transaction::{CategoryName, NewTransaction, Transaction, TransactionId, TransactionKind};
