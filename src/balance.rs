//! Aggregate totals over the recorded transactions.
//!
//! Nothing here is cached: every call sums the current contents of the
//! transaction table. Sums use SQLite's floating point arithmetic, so
//! callers should not expect currency-grade rounding.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{Error, account::AccountId, transaction::TransactionKind};

/// Income and expense totals for one account, or for the whole ledger.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    /// The sum of all income.
    pub income: f64,
    /// The sum of all expenses.
    pub expense: f64,
}

impl Totals {
    /// Total income minus total expenses.
    pub fn balance(&self) -> f64 {
        self.income - self.expense
    }
}

/// Sum the amounts of all transactions of `kind`, optionally only those owned by `owner_id`.
///
/// Returns zero when there are no matching transactions.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn sum_by_kind(
    kind: TransactionKind,
    owner_id: Option<AccountId>,
    connection: &Connection,
) -> Result<f64, Error> {
    let total = connection
        .prepare(
            "SELECT COALESCE(SUM(amount), 0.0) FROM \"transaction\"
             WHERE kind = ?1 AND (?2 IS NULL OR owner_id = ?2)",
        )?
        .query_row((kind, owner_id.map(|id| id.as_i64())), |row| row.get(0))?;

    Ok(total)
}

/// The sum of all income.
pub fn total_income(owner_id: Option<AccountId>, connection: &Connection) -> Result<f64, Error> {
    sum_by_kind(TransactionKind::Income, owner_id, connection)
}

/// The sum of all expenses.
pub fn total_expense(owner_id: Option<AccountId>, connection: &Connection) -> Result<f64, Error> {
    sum_by_kind(TransactionKind::Expense, owner_id, connection)
}

/// Total income minus total expenses.
pub fn balance(owner_id: Option<AccountId>, connection: &Connection) -> Result<f64, Error> {
    totals(owner_id, connection).map(|totals| totals.balance())
}

/// Both totals at once.
///
/// # Errors
/// Returns [Error::SqlError] if either query fails.
pub fn totals(owner_id: Option<AccountId>, connection: &Connection) -> Result<Totals, Error> {
    let totals = Totals {
        income: total_income(owner_id, connection)?,
        expense: total_expense(owner_id, connection)?,
    };

    tracing::debug!("Computed totals {totals:?} for owner {owner_id:?}");

    Ok(totals)
}
