//! Opening and initialising the ledger's SQLite database.

use std::path::Path;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error, account::create_account_table, ledger::create_ledger_mode_table,
    transaction::create_transaction_table,
};

/// Open (or create) the database file at `path` and make sure the tables exist.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the schema cannot be created.
pub fn open(path: impl AsRef<Path>) -> Result<Connection, Error> {
    let path = path.as_ref();
    let connection = Connection::open(path)?;
    initialize(&connection)?;

    tracing::debug!("Opened database at {path:?}");

    Ok(connection)
}

/// Create the tables for the domain models if they do not exist yet.
///
/// Also turns on foreign key enforcement for `connection`, which SQLite
/// leaves off by default and which cannot be changed inside a transaction.
///
/// # Errors
///
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_account_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_ledger_mode_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Run a `SELECT COUNT(...)` query and return the count.
///
/// # Errors
///
/// Returns a [Error::SqlError] if the query fails or the count does not fit in a `usize`.
pub(crate) fn count_rows(sql: &str, connection: &Connection) -> Result<usize, Error> {
    let count: i64 = connection.query_row(sql, [], |row| row.get(0))?;

    usize::try_from(count)
        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, count).into())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::{count_rows, initialize};

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        assert_eq!(initialize(&conn), Ok(()));
        assert_eq!(initialize(&conn), Ok(()));
    }

    #[test]
    fn initialize_enables_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let enabled: bool = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();

        assert!(enabled);
    }

    #[test]
    fn count_rows_counts_inserted_rows() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute(
            "INSERT INTO account (name, password) VALUES ('alice', 'hash'), ('bob', 'hash')",
            (),
        )
        .unwrap();

        assert_eq!(count_rows("SELECT COUNT(id) FROM account;", &conn), Ok(2));
    }

    #[test]
    fn count_rows_rejects_negative_count() {
        let conn = Connection::open_in_memory().unwrap();

        let result = count_rows("SELECT -1;", &conn);

        assert_eq!(
            result,
            Err(crate::Error::SqlError(
                rusqlite::Error::IntegralValueOutOfRange(0, -1)
            ))
        );
    }
}
