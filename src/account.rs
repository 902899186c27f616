//! Code for creating the account table, registering accounts and checking
//! their credentials.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash, db::count_rows};

/// A newtype wrapper for integer account IDs.
///
/// Keeps account IDs from being mixed up with transaction IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct AccountId(i64);

impl AccountId {
    /// Create a new account ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the account ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the ledger.
///
/// Accounts are never updated or deleted once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The account's ID in the database.
    pub id: AccountId,
    /// The unique, human readable account name.
    pub name: String,
    /// The account's password hash.
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
}

/// Create the account table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Register a new account.
///
/// Leading and trailing whitespace is trimmed from `name`.
///
/// # Errors
///
/// This function will return a:
/// - [Error::EmptyAccountName] if `name` is blank,
/// - [Error::DuplicateAccount] if the name is already taken,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_account(
    name: &str,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<AccountId, Error> {
    let name = name.trim();

    if name.is_empty() {
        return Err(Error::EmptyAccountName);
    }

    connection
        .execute(
            "INSERT INTO account (name, password) VALUES (?1, ?2)",
            (name, password_hash.as_ref()),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateAccount(name.to_owned()),
            error => error.into(),
        })?;

    let id = AccountId::new(connection.last_insert_rowid());
    tracing::info!("Registered account {id} ({name})");

    Ok(id)
}

/// Look up an account by its name, returning `None` if there is no such account.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn find_account(name: &str, connection: &Connection) -> Result<Option<Account>, Error> {
    connection
        .prepare("SELECT id, name, password FROM account WHERE name = :name")?
        .query_row(&[(":name", name.trim())], map_account_row)
        .optional()
        .map_err(|error| error.into())
}

/// Get the account with an ID equal to `account_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `account_id` does not belong to a registered account ([Error::NotFound]),
/// - or there was an error trying to access the database.
pub fn get_account(account_id: AccountId, connection: &Connection) -> Result<Account, Error> {
    connection
        .prepare("SELECT id, name, password FROM account WHERE id = :id")?
        .query_row(&[(":id", &account_id.as_i64())], map_account_row)
        .map_err(|error| error.into())
}

/// Check `raw_password` against the stored hash for the account called `name`.
///
/// # Errors
///
/// Returns [Error::AuthenticationFailed] if there is no account with that
/// name, the password does not match or the stored hash cannot be read.
pub fn authenticate(
    name: &str,
    raw_password: &str,
    connection: &Connection,
) -> Result<Account, Error> {
    let Some(account) = find_account(name, connection)? else {
        tracing::debug!("Log in attempt for unknown account \"{name}\"");
        return Err(Error::AuthenticationFailed);
    };

    match account.password_hash.verify(raw_password) {
        Ok(true) => Ok(account),
        Ok(false) => {
            tracing::debug!("Wrong password for account {}", account.id);
            Err(Error::AuthenticationFailed)
        }
        Err(error) => {
            tracing::error!("Could not verify password for account {}: {error}", account.id);
            Err(Error::AuthenticationFailed)
        }
    }
}

/// Get the number of registered accounts.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_accounts(connection: &Connection) -> Result<usize, Error> {
    count_rows("SELECT COUNT(id) FROM account;", connection)
}

fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    let raw_id = row.get(0)?;
    let name = row.get(1)?;
    let raw_password_hash: String = row.get(2)?;

    Ok(Account {
        id: AccountId::new(raw_id),
        name,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}
