//! Defines the transaction model and its database queries.

use std::fmt::Display;

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, account::AccountId, db::count_rows};

/// Alias for the integer type used for transaction IDs.
pub type TransactionId = i64;

// ============================================================================
// MODELS
// ============================================================================

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionKind {
    /// The text stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(FromSqlError::Other(
                format!("unknown transaction kind \"{other}\"").into(),
            )),
        }
    }
}

/// The label on an expense, e.g. "food" or "rent".
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryName(String);

impl CategoryName {
    /// Trim `name` and wrap it, returning `None` if nothing is left.
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();

        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_owned()))
        }
    }

    /// The category label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recorded income or expense.
///
/// Transactions are never edited once stored. An expense always has a
/// category and an income never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// How much money moved. Always greater than zero.
    pub amount: f64,
    /// Whether the money came in or went out.
    pub kind: TransactionKind,
    /// What the money was spent on. Only set for expenses.
    pub category: Option<CategoryName>,
    /// The account that recorded the transaction, if the ledger is scoped.
    pub owner_id: Option<AccountId>,
}

/// The details needed to record a transaction.
///
/// Use [NewTransaction::income] or [NewTransaction::expense] to create one.
/// Nothing is checked until the transaction is added to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// How much money moved.
    pub amount: f64,
    /// Whether the money came in or went out.
    pub kind: TransactionKind,
    /// The raw category label as entered by the user.
    pub category: Option<String>,
}

impl NewTransaction {
    /// Money earned.
    pub fn income(amount: f64) -> Self {
        Self {
            amount,
            kind: TransactionKind::Income,
            category: None,
        }
    }

    /// Money spent.
    pub fn expense(amount: f64) -> Self {
        Self {
            amount,
            kind: TransactionKind::Expense,
            category: None,
        }
    }

    /// Set the category label.
    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_owned());
        self
    }

    /// Check the amount and category, returning the category to store.
    ///
    /// A category given for an income is dropped.
    fn validate(&self) -> Result<Option<CategoryName>, Error> {
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(Error::InvalidAmount(self.amount));
        }

        let category = self.category.as_deref().and_then(CategoryName::new);

        match self.kind {
            TransactionKind::Expense if category.is_none() => Err(Error::MissingCategory),
            TransactionKind::Expense => Ok(category),
            TransactionKind::Income => {
                if let Some(category) = category {
                    tracing::debug!("Ignoring category \"{category}\" on income");
                }
                Ok(None)
            }
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// Requires the account table to exist for the `owner_id` foreign key.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount REAL NOT NULL CHECK (amount > 0),
                category TEXT,
                kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                owner_id INTEGER,
                FOREIGN KEY(owner_id) REFERENCES account(id)
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_owner_kind ON \"transaction\"(owner_id, kind);",
        (),
    )?;

    Ok(())
}

/// Record a new transaction, optionally owned by `owner_id`.
///
/// The transaction is validated before anything is written, so a rejected
/// transaction leaves the database untouched.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not greater than zero,
/// - [Error::MissingCategory] if an expense has no category,
/// - [Error::InvalidOwner] if `owner_id` does not refer to an account,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn add_transaction(
    owner_id: Option<AccountId>,
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<TransactionId, Error> {
    let category = new_transaction.validate()?;

    connection
        .execute(
            "INSERT INTO \"transaction\" (amount, category, kind, owner_id)
            VALUES (?1, ?2, ?3, ?4)",
            (
                new_transaction.amount,
                category.as_ref().map(CategoryName::as_str),
                new_transaction.kind,
                owner_id.map(|id| id.as_i64()),
            ),
        )
        .map_err(|error| match (error, owner_id) {
            (
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: _,
                        extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                    },
                    _,
                ),
                Some(owner_id),
            ) => Error::InvalidOwner(owner_id),
            (error, _) => error.into(),
        })?;

    let id = connection.last_insert_rowid();
    tracing::info!(
        "Added {} transaction {id} of {}",
        new_transaction.kind,
        new_transaction.amount
    );

    Ok(id)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, amount, category, kind, owner_id FROM \"transaction\" WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(|error| error.into())
}

/// Get all transactions in the order they were added.
///
/// If `owner_id` is given only that account's transactions are returned.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_transactions(
    owner_id: Option<AccountId>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let transactions = connection
        .prepare(
            "SELECT id, amount, category, kind, owner_id FROM \"transaction\"
             WHERE :owner_id IS NULL OR owner_id = :owner_id
             ORDER BY id ASC",
        )?
        .query_map(
            &[(":owner_id", &owner_id.map(|id| id.as_i64()))],
            map_transaction_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        "Listed {} transactions for owner {owner_id:?}",
        transactions.len()
    );

    Ok(transactions)
}

type RowsAffected = usize;

/// Delete the transaction with the given `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if there is no transaction with that `id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected: RowsAffected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = :id",
        &[(":id", &id)],
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    tracing::info!("Deleted transaction {id}");

    Ok(())
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<usize, Error> {
    count_rows("SELECT COUNT(id) FROM \"transaction\";", connection)
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let raw_category: Option<String> = row.get(2)?;
    let kind = row.get(3)?;
    let raw_owner_id: Option<i64> = row.get(4)?;

    Ok(Transaction {
        id,
        amount,
        kind,
        category: raw_category.as_deref().and_then(CategoryName::new),
        owner_id: raw_owner_id.map(AccountId::new),
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod validation_tests {
    use crate::{
        Error,
        transaction::{CategoryName, NewTransaction},
    };

    #[test]
    fn zero_amount_is_rejected() {
        let result = NewTransaction::income(0.0).validate();

        assert_eq!(result, Err(Error::InvalidAmount(0.0)));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let result = NewTransaction::expense(-5.0).category("food").validate();

        assert_eq!(result, Err(Error::InvalidAmount(-5.0)));
    }

    #[test]
    fn nan_amount_is_rejected() {
        let result = NewTransaction::income(f64::NAN).validate();

        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn infinite_amount_is_rejected() {
        let result = NewTransaction::income(f64::INFINITY).validate();

        assert_eq!(result, Err(Error::InvalidAmount(f64::INFINITY)));
    }

    #[test]
    fn expense_without_category_is_rejected() {
        let result = NewTransaction::expense(50.0).validate();

        assert_eq!(result, Err(Error::MissingCategory));
    }

    #[test]
    fn expense_with_blank_category_is_rejected() {
        let result = NewTransaction::expense(50.0).category("   ").validate();

        assert_eq!(result, Err(Error::MissingCategory));
    }

    #[test]
    fn expense_keeps_trimmed_category() {
        let result = NewTransaction::expense(50.0).category(" food ").validate();

        assert_eq!(result, Ok(CategoryName::new("food")));
    }

    #[test]
    fn income_category_is_dropped() {
        let result = NewTransaction::income(1000.0).category("salary").validate();

        assert_eq!(result, Ok(None));
    }
}
