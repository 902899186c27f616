use std::{error::Error, io, path::PathBuf, process::exit};

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tally_rs::{
    AccountId, CategoryName, Ledger, LedgerMode, NewTransaction, PasswordHash, Totals, Transaction,
    TransactionId, ValidatedPassword,
};

/// Record income and expenses and keep track of your balance.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "TALLY_DB_PATH", default_value = "tally.db")]
    db_path: PathBuf,

    /// Whether transactions belong to accounts ("scoped") or are shared ("global").
    #[arg(long, env = "TALLY_MODE", default_value = "scoped")]
    mode: LedgerMode,

    /// The bcrypt cost used when registering accounts.
    #[arg(long, default_value_t = PasswordHash::DEFAULT_COST)]
    bcrypt_cost: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and its tables.
    Init,
    /// Register a new account.
    Register {
        /// The name to log in with.
        #[arg(long)]
        name: String,
    },
    /// Record an income or expense.
    Add {
        /// The account to record the transaction for. Required in scoped mode.
        #[arg(long)]
        name: Option<String>,
        /// How much money moved, always positive.
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
        /// Whether the money came in or went out.
        #[arg(long, value_enum)]
        kind: KindArg,
        /// What the money was spent on. Required for expenses.
        #[arg(long)]
        category: Option<String>,
    },
    /// Show the recorded transactions and totals.
    List {
        /// The account to list transactions for. Required in scoped mode.
        #[arg(long)]
        name: Option<String>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Delete a transaction. Only available in global mode.
    Delete {
        /// The ID of the transaction to delete.
        #[arg(long)]
        id: TransactionId,
    },
    /// Show the current balance.
    Balance {
        /// The account to show the balance for. Required in scoped mode.
        #[arg(long)]
        name: Option<String>,
    },
}

const PASSWORD_ATTEMPTS: usize = 3;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Income,
    Expense,
}

fn main() {
    setup_logging();

    let args = Args::parse();

    if let Err(error) = run(args) {
        report(error.as_ref());
        exit(1);
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let ledger = Ledger::open(&args.db_path, args.mode)?;

    match args.command {
        Command::Init => {
            println!("Database ready at {:#?}", args.db_path);
        }
        Command::Register { name } => {
            let Some(password_hash) = choose_password(&name, args.bcrypt_cost)? else {
                return Ok(());
            };
            let id = ledger.create_account(&name, &password_hash)?;
            println!("Registered account \"{}\" with ID {id}", name.trim());
        }
        Command::Add {
            name,
            amount,
            kind,
            category,
        } => {
            let owner_id = log_in(&ledger, name.as_deref())?;
            let mut new_transaction = match kind {
                KindArg::Income => NewTransaction::income(amount),
                KindArg::Expense => NewTransaction::expense(amount),
            };
            new_transaction.category = category;

            let id = ledger.add_transaction(owner_id, new_transaction)?;
            println!("Added transaction {id}");
        }
        Command::List { name, json } => {
            let owner_id = log_in(&ledger, name.as_deref())?;
            let transactions = ledger.list_transactions(owner_id)?;
            let totals = ledger.totals(owner_id)?;

            if json {
                let output = serde_json::json!({
                    "transactions": transactions,
                    "totals": totals,
                    "balance": totals.balance(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_transactions(&transactions, &totals);
            }
        }
        Command::Delete { id } => {
            ledger.delete_transaction(id)?;
            println!("Deleted transaction {id}");
        }
        Command::Balance { name } => {
            let owner_id = log_in(&ledger, name.as_deref())?;
            println!("{:.2}", ledger.balance(owner_id)?);
        }
    }

    Ok(())
}

/// Ask for the account's password and check it.
///
/// Global ledgers have no owners, so nobody logs in.
fn log_in(ledger: &Ledger, name: Option<&str>) -> Result<Option<AccountId>, Box<dyn Error>> {
    if ledger.mode() == LedgerMode::Global {
        return Ok(None);
    }

    let Some(name) = name else {
        return Err("--name is required in scoped mode".into());
    };

    let password = read_password(&format!("Password for {name}: "))?.ok_or("no password given")?;
    let account = ledger.authenticate(name, &password)?;

    Ok(Some(account.id))
}

/// Prompt for a new password until one is strong enough and typed twice.
///
/// Returns `None` if stdin is closed before a password is chosen.
fn choose_password(name: &str, cost: u32) -> Result<Option<PasswordHash>, Box<dyn Error>> {
    for _ in 0..PASSWORD_ATTEMPTS {
        let Some(raw_password) = read_password("Enter a password: ")? else {
            return Ok(None);
        };

        let validated_password = match ValidatedPassword::new(&raw_password, name) {
            Ok(password) => password,
            Err(error) => {
                report(&error);
                continue;
            }
        };

        let Some(confirmation) = read_password("Enter the same password again: ")? else {
            return Ok(None);
        };

        if confirmation == raw_password {
            return Ok(Some(PasswordHash::new(validated_password, cost)?));
        }

        eprintln!("Passwords must match, try again.");
    }

    Err(format!("no password chosen after {PASSWORD_ATTEMPTS} attempts").into())
}

/// Read a password without echoing it, mapping a closed stdin to `None`.
fn read_password(prompt: &str) -> io::Result<Option<String>> {
    match rpassword::prompt_password(prompt) {
        Ok(password) => Ok(Some(password)),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(error) => Err(error),
    }
}

fn print_transactions(transactions: &[Transaction], totals: &Totals) {
    println!("{:>6}  {:<8}  {:>12}  category", "id", "kind", "amount");

    for transaction in transactions {
        println!(
            "{:>6}  {:<8}  {:>12.2}  {}",
            transaction.id,
            transaction.kind,
            transaction.amount,
            transaction
                .category
                .as_ref()
                .map(CategoryName::as_str)
                .unwrap_or("-")
        );
    }

    println!();
    println!("Income:  {:>12.2}", totals.income);
    println!("Expense: {:>12.2}", totals.expense);
    println!("Balance: {:>12.2}", totals.balance());
}

/// Print `error` and its causes on one line in bold red.
fn report(error: &dyn Error) {
    let mut message = capitalise_first_char(&error.to_string());
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }

    eprintln!("\x1b[31;1m{message}\x1b[0m");
}

/// From https://crates.io/crates/capitalize
fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}

#[cfg(test)]
mod tests {
    use super::capitalise_first_char;

    #[test]
    fn capitalises_only_the_first_char() {
        assert_eq!(capitalise_first_char("no password given"), "No password given");
    }

    #[test]
    fn capitalising_empty_string_is_empty() {
        assert_eq!(capitalise_first_char(""), "");
    }
}
