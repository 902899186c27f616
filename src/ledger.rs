//! The [Ledger] handle that callers use to reach the store and the balance queries.

use std::{fmt::Display, path::Path, str::FromStr};

use rusqlite::{
    Connection,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{
    Error, PasswordHash,
    account::{self, Account, AccountId},
    balance::{self, Totals},
    db,
    transaction::{self, NewTransaction, Transaction, TransactionId},
};

/// Whether transactions belong to accounts or to the ledger as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMode {
    /// Every transaction is owned by an account and queries only see the
    /// given account's transactions. Transactions cannot be deleted.
    #[default]
    Scoped,
    /// Transactions have no owner and every query sees all of them.
    /// Transactions can be deleted by ID.
    Global,
}

impl LedgerMode {
    fn as_str(&self) -> &'static str {
        match self {
            LedgerMode::Scoped => "scoped",
            LedgerMode::Global => "global",
        }
    }
}

impl Display for LedgerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LedgerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scoped" => Ok(LedgerMode::Scoped),
            "global" => Ok(LedgerMode::Global),
            other => Err(format!(
                "unknown ledger mode \"{other}\", expected \"scoped\" or \"global\""
            )),
        }
    }
}

impl ToSql for LedgerMode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LedgerMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// Create the table that records which mode a database was created in.
///
/// The table holds at most one row.
pub(crate) fn create_ledger_mode_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS ledger_mode (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                mode TEXT NOT NULL CHECK (mode IN ('scoped', 'global'))
                )",
        (),
    )?;

    Ok(())
}

/// Record `mode` as the database's mode on first use, otherwise check it
/// matches the recorded mode.
///
/// # Errors
///
/// Returns [Error::ModeMismatch] if the database was created in the other mode.
fn pin_mode(mode: LedgerMode, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT OR IGNORE INTO ledger_mode (id, mode) VALUES (1, ?1)",
        (mode,),
    )?;

    let stored: LedgerMode =
        connection.query_row("SELECT mode FROM ledger_mode WHERE id = 1", [], |row| {
            row.get(0)
        })?;

    if stored != mode {
        tracing::error!("Refusing to open a {stored} ledger in {mode} mode");
        return Err(Error::ModeMismatch {
            stored,
            requested: mode,
        });
    }

    Ok(())
}

/// A handle to an initialised ledger database.
///
/// The handle owns its connection, which is closed when the handle is
/// dropped. Each mutating method is a single SQL statement and is committed
/// before the method returns.
#[derive(Debug)]
pub struct Ledger {
    connection: Connection,
    mode: LedgerMode,
}

impl Ledger {
    /// Wrap `connection`, creating the tables if needed.
    ///
    /// A database keeps the mode it was first opened with.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialised, or
    /// [Error::ModeMismatch] if it was created in the other mode.
    pub fn new(connection: Connection, mode: LedgerMode) -> Result<Self, Error> {
        db::initialize(&connection)?;
        pin_mode(mode, &connection)?;

        Ok(Self { connection, mode })
    }

    /// Open the database file at `path`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Same as [Ledger::new].
    pub fn open(path: impl AsRef<Path>, mode: LedgerMode) -> Result<Self, Error> {
        let connection = db::open(path)?;
        pin_mode(mode, &connection)?;

        Ok(Self { connection, mode })
    }

    /// Create a ledger backed by a private in-memory database.
    pub fn open_in_memory(mode: LedgerMode) -> Result<Self, Error> {
        Self::new(Connection::open_in_memory()?, mode)
    }

    /// The mode the ledger was opened with.
    pub fn mode(&self) -> LedgerMode {
        self.mode
    }

    /// The underlying database connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Register a new account. See [account::create_account].
    pub fn create_account(
        &self,
        name: &str,
        password_hash: &PasswordHash,
    ) -> Result<AccountId, Error> {
        account::create_account(name, password_hash, &self.connection)
    }

    /// Look up an account by name. See [account::find_account].
    pub fn find_account(&self, name: &str) -> Result<Option<Account>, Error> {
        account::find_account(name, &self.connection)
    }

    /// Get an account by ID. See [account::get_account].
    pub fn get_account(&self, id: AccountId) -> Result<Account, Error> {
        account::get_account(id, &self.connection)
    }

    /// Check an account's password. See [account::authenticate].
    pub fn authenticate(&self, name: &str, raw_password: &str) -> Result<Account, Error> {
        account::authenticate(name, raw_password, &self.connection)
    }

    /// The number of registered accounts.
    pub fn count_accounts(&self) -> Result<usize, Error> {
        account::count_accounts(&self.connection)
    }

    /// Record a transaction.
    ///
    /// In scoped mode `owner_id` is required. In global mode it is ignored
    /// and the transaction is stored without an owner.
    ///
    /// # Errors
    ///
    /// Returns [Error::MissingOwner] if the ledger is scoped and no owner was
    /// given, otherwise see [transaction::add_transaction].
    pub fn add_transaction(
        &self,
        owner_id: Option<AccountId>,
        new_transaction: NewTransaction,
    ) -> Result<TransactionId, Error> {
        let owner_id = self.resolve_owner(owner_id)?;

        transaction::add_transaction(owner_id, new_transaction, &self.connection)
    }

    /// Get a single transaction by ID.
    pub fn get_transaction(&self, id: TransactionId) -> Result<Transaction, Error> {
        transaction::get_transaction(id, &self.connection)
    }

    /// List transactions in the order they were added.
    ///
    /// Scoped ledgers return only the owner's transactions.
    pub fn list_transactions(
        &self,
        owner_id: Option<AccountId>,
    ) -> Result<Vec<Transaction>, Error> {
        let owner_id = self.resolve_owner(owner_id)?;

        transaction::list_transactions(owner_id, &self.connection)
    }

    /// Delete a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns [Error::DeleteUnsupported] for scoped ledgers and
    /// [Error::NotFound] if there is no transaction with that ID.
    pub fn delete_transaction(&self, id: TransactionId) -> Result<(), Error> {
        match self.mode {
            LedgerMode::Scoped => Err(Error::DeleteUnsupported),
            LedgerMode::Global => transaction::delete_transaction(id, &self.connection),
        }
    }

    /// The sum of all income.
    pub fn total_income(&self, owner_id: Option<AccountId>) -> Result<f64, Error> {
        balance::total_income(self.resolve_owner(owner_id)?, &self.connection)
    }

    /// The sum of all expenses.
    pub fn total_expense(&self, owner_id: Option<AccountId>) -> Result<f64, Error> {
        balance::total_expense(self.resolve_owner(owner_id)?, &self.connection)
    }

    /// Total income minus total expenses.
    pub fn balance(&self, owner_id: Option<AccountId>) -> Result<f64, Error> {
        balance::balance(self.resolve_owner(owner_id)?, &self.connection)
    }

    /// Income and expense totals together.
    pub fn totals(&self, owner_id: Option<AccountId>) -> Result<Totals, Error> {
        balance::totals(self.resolve_owner(owner_id)?, &self.connection)
    }

    /// Decide which owner filter to use for the ledger's mode.
    fn resolve_owner(&self, owner_id: Option<AccountId>) -> Result<Option<AccountId>, Error> {
        match (self.mode, owner_id) {
            (LedgerMode::Scoped, None) => Err(Error::MissingOwner),
            (LedgerMode::Scoped, owner_id) => Ok(owner_id),
            (LedgerMode::Global, Some(owner_id)) => {
                tracing::debug!("Ignoring owner {owner_id} in global mode");
                Ok(None)
            }
            (LedgerMode::Global, None) => Ok(None),
        }
    }
}

#[cfg(test)]
mod global_ledger_tests {
    use crate::{
        Error,
        transaction::{NewTransaction, TransactionKind},
    };

    use super::{Ledger, LedgerMode};

    fn get_ledger() -> Ledger {
        Ledger::open_in_memory(LedgerMode::Global).expect("Could not open in-memory ledger")
    }

    #[test]
    fn fresh_ledger_has_zero_totals() {
        let ledger = get_ledger();

        assert_eq!(ledger.total_income(None), Ok(0.0));
        assert_eq!(ledger.total_expense(None), Ok(0.0));
        assert_eq!(ledger.balance(None), Ok(0.0));
    }

    #[test]
    fn income_and_expense_give_balance() {
        let ledger = get_ledger();

        ledger
            .add_transaction(None, NewTransaction::income(1000.0))
            .unwrap();
        ledger
            .add_transaction(None, NewTransaction::expense(200.0).category("food"))
            .unwrap();

        assert_eq!(ledger.balance(None), Ok(800.0));
    }

    #[test]
    fn expense_without_category_leaves_ledger_empty() {
        let ledger = get_ledger();

        let result = ledger.add_transaction(None, NewTransaction::expense(50.0));

        assert_eq!(result, Err(Error::MissingCategory));
        assert_eq!(ledger.list_transactions(None), Ok(vec![]));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let ledger = get_ledger();

        assert_eq!(
            ledger.add_transaction(None, NewTransaction::income(0.0)),
            Err(Error::InvalidAmount(0.0))
        );
        assert_eq!(
            ledger.add_transaction(None, NewTransaction::income(-1.0)),
            Err(Error::InvalidAmount(-1.0))
        );
    }

    #[test]
    fn income_with_category_is_always_accepted() {
        let ledger = get_ledger();

        for _ in 0..3 {
            let id = ledger
                .add_transaction(None, NewTransaction::income(5.0).category("gift"))
                .unwrap();
            let transaction = ledger.get_transaction(id).unwrap();

            assert_eq!(transaction.kind, TransactionKind::Income);
            assert_eq!(transaction.category, None);
        }
    }

    #[test]
    fn deleted_transaction_is_not_listed() {
        let ledger = get_ledger();
        let id = ledger
            .add_transaction(None, NewTransaction::income(10.0))
            .unwrap();

        ledger.delete_transaction(id).unwrap();

        assert!(
            ledger
                .list_transactions(None)
                .unwrap()
                .iter()
                .all(|transaction| transaction.id != id)
        );
        assert_eq!(ledger.delete_transaction(id), Err(Error::NotFound));
    }

    #[test]
    fn owner_is_ignored() {
        let ledger = get_ledger();
        let id = ledger
            .add_transaction(
                Some(crate::account::AccountId::new(99)),
                NewTransaction::income(10.0),
            )
            .unwrap();

        assert_eq!(ledger.get_transaction(id).unwrap().owner_id, None);
    }
}

#[cfg(test)]
mod scoped_ledger_tests {
    use crate::{Error, PasswordHash, ValidatedPassword, transaction::NewTransaction};

    use super::{Ledger, LedgerMode};

    fn get_ledger() -> Ledger {
        Ledger::open_in_memory(LedgerMode::Scoped).expect("Could not open in-memory ledger")
    }

    fn hash(raw_password: &str) -> PasswordHash {
        PasswordHash::new(ValidatedPassword::new_unchecked(raw_password), 4).unwrap()
    }

    #[test]
    fn duplicate_account_name_is_rejected() {
        let ledger = get_ledger();
        ledger.create_account("alice", &hash("first")).unwrap();

        let result = ledger.create_account("alice", &hash("second"));

        assert_eq!(result, Err(Error::DuplicateAccount("alice".to_owned())));
        assert_eq!(ledger.count_accounts(), Ok(1));
    }

    #[test]
    fn transactions_require_an_owner() {
        let ledger = get_ledger();

        assert_eq!(
            ledger.add_transaction(None, NewTransaction::income(1.0)),
            Err(Error::MissingOwner)
        );
        assert_eq!(ledger.list_transactions(None), Err(Error::MissingOwner));
        assert_eq!(ledger.balance(None), Err(Error::MissingOwner));
    }

    #[test]
    fn authenticated_account_sees_only_its_own_balance() {
        let ledger = get_ledger();
        ledger.create_account("alice", &hash("alicepassword")).unwrap();
        ledger.create_account("bob", &hash("bobpassword")).unwrap();
        let alice = ledger.authenticate("alice", "alicepassword").unwrap();
        let bob = ledger.authenticate("bob", "bobpassword").unwrap();

        ledger
            .add_transaction(Some(alice.id), NewTransaction::income(1000.0))
            .unwrap();
        ledger
            .add_transaction(Some(alice.id), NewTransaction::expense(200.0).category("food"))
            .unwrap();
        ledger
            .add_transaction(Some(bob.id), NewTransaction::expense(5.0).category("coffee"))
            .unwrap();

        assert_eq!(ledger.balance(Some(alice.id)), Ok(800.0));
        assert_eq!(ledger.balance(Some(bob.id)), Ok(-5.0));
        assert_eq!(ledger.list_transactions(Some(alice.id)).unwrap().len(), 2);
    }

    #[test]
    fn wrong_password_fails_authentication() {
        let ledger = get_ledger();
        ledger.create_account("alice", &hash("alicepassword")).unwrap();

        assert_eq!(
            ledger.authenticate("alice", "bobpassword"),
            Err(Error::AuthenticationFailed)
        );
    }

    #[test]
    fn unknown_owner_is_rejected() {
        let ledger = get_ledger();
        let owner_id = crate::account::AccountId::new(7);

        assert_eq!(
            ledger.add_transaction(Some(owner_id), NewTransaction::income(1.0)),
            Err(Error::InvalidOwner(owner_id))
        );
    }

    #[test]
    fn delete_is_unsupported() {
        let ledger = get_ledger();
        let alice = ledger.create_account("alice", &hash("alicepassword")).unwrap();
        let id = ledger
            .add_transaction(Some(alice), NewTransaction::income(1.0))
            .unwrap();

        assert_eq!(ledger.delete_transaction(id), Err(Error::DeleteUnsupported));
        assert!(ledger.get_transaction(id).is_ok());
    }
}

#[cfg(test)]
mod ledger_mode_tests {
    use rusqlite::Connection;

    use crate::{Error, db::initialize};

    use super::{LedgerMode, pin_mode};

    #[test]
    fn first_mode_is_recorded() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        assert_eq!(pin_mode(LedgerMode::Global, &conn), Ok(()));
        assert_eq!(pin_mode(LedgerMode::Global, &conn), Ok(()));

        let stored: LedgerMode = conn
            .query_row("SELECT mode FROM ledger_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, LedgerMode::Global);
    }

    #[test]
    fn other_mode_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        pin_mode(LedgerMode::Scoped, &conn).unwrap();

        assert_eq!(
            pin_mode(LedgerMode::Global, &conn),
            Err(Error::ModeMismatch {
                stored: LedgerMode::Scoped,
                requested: LedgerMode::Global
            })
        );
    }

    #[test]
    fn displays_lowercase_name() {
        assert_eq!(LedgerMode::Global.to_string(), "global");
    }

    #[test]
    fn parses_known_modes() {
        assert_eq!("scoped".parse::<LedgerMode>(), Ok(LedgerMode::Scoped));
        assert_eq!("GLOBAL".parse::<LedgerMode>(), Ok(LedgerMode::Global));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!("shared".parse::<LedgerMode>().is_err());
    }

    #[test]
    fn defaults_to_scoped() {
        assert_eq!(LedgerMode::default(), LedgerMode::Scoped);
    }
}
