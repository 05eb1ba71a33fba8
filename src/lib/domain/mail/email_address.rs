//! Email Address

use std::fmt;

use lazy_static::lazy_static;
use lettre::Address;
use regex::Regex;
use thiserror::Error;

use EmailAddressError::*;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap();
}

/// An error that can occur when creating an email address
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmailAddressError {
    /// The email address is empty
    #[error("email is empty")]
    EmptyEmailAddress,

    /// The email address is invalid
    #[error("email is invalid")]
    InvalidEmailAddress,
}

/// An email address, in at least `local-part@domain` shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmailAddress(Address);

impl EmailAddress {
    /// Create a new email address
    pub fn new(raw: &str) -> Result<Self, EmailAddressError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(EmptyEmailAddress);
        }

        if !EMAIL_REGEX.is_match(trimmed) {
            return Err(InvalidEmailAddress);
        }

        let address = trimmed
            .parse::<Address>()
            .map_err(|_| InvalidEmailAddress)?;

        Ok(Self(address))
    }

    /// The address as a string slice
    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    /// The underlying [`lettre`] address
    pub fn as_address(&self) -> &Address {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0.to_string()
    }
}

impl From<EmailAddress> for Address {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}
