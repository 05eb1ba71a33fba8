//! Mailboxes, address roles and address list normalization

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use super::EmailAddress;

/// An address with an optional display name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mailbox {
    /// The email address
    pub address: EmailAddress,

    /// The display name, if any
    pub name: Option<String>,
}

impl Mailbox {
    /// Create a new mailbox
    pub fn new(address: EmailAddress, name: Option<String>) -> Self {
        Self { address, name }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

impl From<&Mailbox> for lettre::message::Mailbox {
    fn from(mailbox: &Mailbox) -> Self {
        lettre::message::Mailbox::new(mailbox.name.clone(), mailbox.address.as_address().clone())
    }
}

/// Role of a recipient address
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecipientRole {
    /// Primary recipient
    To,

    /// Carbon copy
    Cc,

    /// Blind carbon copy; never rendered into the message headers
    Bcc,
}

/// Role of an originator address
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SenderRole {
    /// Author of the message. May hold several addresses.
    From,

    /// Where replies should go. May hold several addresses.
    ReplyTo,

    /// The single authoritative sender. Must be set by the caller whenever
    /// more than one `From` address is present.
    Sender,

    /// Address that receives bounce notifications. Single slot; the display
    /// name is ignored.
    ReturnPath,
}

impl SenderRole {
    /// Whether the role holds at most one address
    pub fn is_single(&self) -> bool {
        matches!(self, Self::Sender | Self::ReturnPath)
    }
}

/// One entry of an address list: a bare address or an address with a name.
///
/// Addresses are kept unvalidated here; the builder validates them on insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddressEntry {
    /// Only an email address, no name
    Bare(String),

    /// Email address and display name
    Named(String, String),
}

impl AddressEntry {
    /// The raw address
    pub fn address(&self) -> &str {
        match self {
            Self::Bare(address) | Self::Named(address, _) => address,
        }
    }

    /// The display name, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Bare(_) => None,
            Self::Named(_, name) => Some(name),
        }
    }
}

/// Anything that can be flattened into a list of [`AddressEntry`].
///
/// ```
/// use std::collections::BTreeMap;
/// use mailwork::domain::mail::{AddressEntry, IntoAddressEntries};
///
/// // A single address
/// assert_eq!(
///     "john.doe@domain.com".into_entries(),
///     vec![AddressEntry::Bare("john.doe@domain.com".into())],
/// );
///
/// // An address with a display name
/// assert_eq!(
///     ("john.doe@domain.com", "John Doe").into_entries(),
///     vec![AddressEntry::Named("john.doe@domain.com".into(), "John Doe".into())],
/// );
///
/// // Address to name maps
/// let map = BTreeMap::from([("jane.doe@domain.com", "Jane Doe")]);
/// assert_eq!(map.into_entries().len(), 1);
/// ```
pub trait IntoAddressEntries {
    /// Flatten into address entries, preserving order where the source has one
    fn into_entries(self) -> Vec<AddressEntry>;
}

impl IntoAddressEntries for AddressEntry {
    fn into_entries(self) -> Vec<AddressEntry> {
        vec![self]
    }
}

impl IntoAddressEntries for &str {
    fn into_entries(self) -> Vec<AddressEntry> {
        vec![AddressEntry::Bare(self.to_string())]
    }
}

impl IntoAddressEntries for String {
    fn into_entries(self) -> Vec<AddressEntry> {
        vec![AddressEntry::Bare(self)]
    }
}

impl IntoAddressEntries for &String {
    fn into_entries(self) -> Vec<AddressEntry> {
        vec![AddressEntry::Bare(self.clone())]
    }
}

impl<A, N> IntoAddressEntries for (A, N)
where
    A: Into<String>,
    N: Into<String>,
{
    fn into_entries(self) -> Vec<AddressEntry> {
        vec![AddressEntry::Named(self.0.into(), self.1.into())]
    }
}

impl<T: IntoAddressEntries> IntoAddressEntries for Vec<T> {
    fn into_entries(self) -> Vec<AddressEntry> {
        self.into_iter().flat_map(IntoAddressEntries::into_entries).collect()
    }
}

impl<T: IntoAddressEntries, const N: usize> IntoAddressEntries for [T; N] {
    fn into_entries(self) -> Vec<AddressEntry> {
        self.into_iter().flat_map(IntoAddressEntries::into_entries).collect()
    }
}

impl<A, N> IntoAddressEntries for BTreeMap<A, N>
where
    A: Into<String>,
    N: Into<String>,
{
    fn into_entries(self) -> Vec<AddressEntry> {
        self.into_iter()
            .map(|(address, name)| AddressEntry::Named(address.into(), name.into()))
            .collect()
    }
}

impl<A, N, S> IntoAddressEntries for HashMap<A, N, S>
where
    A: Into<String>,
    N: Into<String>,
{
    fn into_entries(self) -> Vec<AddressEntry> {
        self.into_iter()
            .map(|(address, name)| AddressEntry::Named(address.into(), name.into()))
            .collect()
    }
}

impl From<&str> for AddressEntry {
    fn from(address: &str) -> Self {
        Self::Bare(address.to_string())
    }
}

impl<A: Into<String>, N: Into<String>> From<(A, N)> for AddressEntry {
    fn from((address, name): (A, N)) -> Self {
        Self::Named(address.into(), name.into())
    }
}
