//! Credential handling for accounts.
//!
//! `ValidatedPassword` wraps a raw password that passed the strength check.
//! `PasswordHash` is the salted bcrypt hash that gets stored in the account table.

use std::fmt::Display;

use bcrypt::{hash, verify};
use serde::{Deserialize, Serialize};
use zxcvbn::{Score, feedback::Feedback, zxcvbn};

use crate::Error;

/// A raw password that is strong enough to register with, not yet hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Check the strength of `raw_password`, using the account name as a
    /// hint so that passwords derived from it are rejected.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] with a suggestion for a stronger password if
    /// the password scores below three.
    pub fn new(raw_password: &str, account_name: &str) -> Result<Self, Error> {
        let analysis = zxcvbn(raw_password, &[account_name]);

        match analysis.score() {
            Score::Three | Score::Four => Ok(Self(raw_password.to_owned())),
            _ => Err(Error::TooWeak(
                analysis
                    .feedback()
                    .unwrap_or(&Feedback::default())
                    .to_string(),
            )),
        }
    }

    /// Wrap `raw_password` without checking its strength.
    ///
    /// Intended for tests and for seeding databases by hand.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_owned())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// The bcrypt cost used when the caller has no reason to pick another.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash `password` with a fresh salt.
    ///
    /// Higher `cost` values make hashing (and verifying) slower. Tests use
    /// the minimum of 4.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if bcrypt rejects the cost or fails.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap a hash read back from the database.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_owned())
    }

    /// Check the strength of `raw_password` and hash it in one go.
    pub fn from_raw_password(
        raw_password: &str,
        account_name: &str,
        cost: u32,
    ) -> Result<Self, Error> {
        let validated_password = ValidatedPassword::new(raw_password, account_name)?;
        PasswordHash::new(validated_password, cost)
    }

    /// Check whether `raw_password` matches this hash.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if the stored hash is malformed.
    pub fn verify(&self, raw_password: &str) -> Result<bool, Error> {
        verify(raw_password, &self.0).map_err(|error| Error::HashingError(error.to_string()))
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
