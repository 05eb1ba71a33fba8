//! Mail errors

use std::path::PathBuf;

use thiserror::Error;

use super::{ConfigError, EmailAddress, EmailAddressError, MessageBuilder};

/// Errors raised while composing or sending a message
#[derive(Debug, Error)]
pub enum MailError {
    /// A to, cc or bcc address is malformed
    #[error("invalid recipient address \"{address}\"")]
    InvalidRecipient {
        /// The rejected input
        address: String,

        /// Why it was rejected
        #[source]
        source: EmailAddressError,
    },

    /// A from, reply-to, sender or return-path address is malformed
    #[error("invalid sender address \"{address}\"")]
    InvalidSender {
        /// The rejected input
        address: String,

        /// Why it was rejected
        #[source]
        source: EmailAddressError,
    },

    /// An attached file does not exist or cannot be read
    #[error("attachment not found: {}", .path.display())]
    AttachmentNotFound {
        /// The attached path
        path: PathBuf,

        /// The filesystem error
        #[source]
        source: std::io::Error,
    },

    /// A MIME type could not be parsed
    #[error("unknown MIME type \"{0}\"")]
    UnknownMimeType(String),

    /// The message has no recipients
    #[error("the message has no recipients")]
    NoRecipients,

    /// The message has no from address
    #[error("the message has no from address")]
    NoSenders,

    /// The message has no plain text body
    #[error("the message has no text/plain body")]
    MissingBody,

    /// The configuration group could not be turned into a transport
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The transport failed to deliver the message
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// A [`MessageBuilder`] setter rejected its input.
///
/// The builder comes back with every change made before the rejected input,
/// so the caller can correct the input or carry on without it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct BuildError {
    builder: Box<MessageBuilder>,
    #[source]
    error: MailError,
}

impl BuildError {
    pub(super) fn new(builder: MessageBuilder, error: MailError) -> Self {
        Self {
            builder: Box::new(builder),
            error,
        }
    }

    /// Why the input was rejected
    pub fn error(&self) -> &MailError {
        &self.error
    }

    /// The builder as it was when the input was rejected
    pub fn builder(&self) -> &MessageBuilder {
        &self.builder
    }

    /// Takes the builder back, dropping the error
    pub fn into_builder(self) -> MessageBuilder {
        *self.builder
    }

    /// Splits into the builder and the error
    pub fn into_parts(self) -> (MessageBuilder, MailError) {
        (*self.builder, self.error)
    }
}

impl From<BuildError> for MailError {
    fn from(err: BuildError) -> Self {
        err.error
    }
}

/// A transport rejected or failed to send a message
#[derive(Debug, Error)]
#[error("{transport} transport could not deliver the message: {reason}")]
pub struct DeliveryError {
    transport: &'static str,
    reason: String,
    code: Option<i32>,
    transient: bool,
    rejected: Vec<EmailAddress>,
    #[source]
    source: Option<anyhow::Error>,
}

impl DeliveryError {
    /// Creates a permanent delivery error with no status code
    pub fn new(transport: &'static str, reason: impl Into<String>) -> Self {
        Self {
            transport,
            reason: reason.into(),
            code: None,
            transient: false,
            rejected: Vec::new(),
            source: None,
        }
    }

    /// Sets the status code reported by the transport
    pub fn with_code(mut self, code: Option<i32>) -> Self {
        self.code = code;
        self
    }

    /// Marks the failure as temporary
    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Sets the addresses that were refused
    pub fn with_rejected(mut self, rejected: Vec<EmailAddress>) -> Self {
        self.rejected = rejected;
        self
    }

    /// Sets the underlying cause
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Name of the transport that failed
    pub fn transport(&self) -> &'static str {
        self.transport
    }

    /// Human readable reason, as reported by the transport
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// SMTP reply code or process exit status, when the transport reported one
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Whether retrying later may succeed
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Recipient addresses that were not accepted
    pub fn rejected(&self) -> &[EmailAddress] {
        &self.rejected
    }
}
