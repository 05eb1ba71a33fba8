//! Fluent message builder
//!
//! ```
//! use mailwork::domain::mail::{MailError, MessageBuilder};
//!
//! # fn main() -> Result<(), MailError> {
//! let email = MessageBuilder::create(Some("Weekly report"), Some("See attached."), None)?
//!     .message("<p>See attached.</p>", Some("text/html"))?
//!     .to(("john.doe@domain.com", "John Doe"))?
//!     .cc(vec!["frank.doe@domain.com", "jane.doe@domain.com"])?
//!     .from("reports@domain.com")?
//!     .attach_content("a,b\n1,2\n", "report.csv", None)?;
//!
//! assert_eq!(email.as_message().recipients().len(), 3);
//! # Ok(())
//! # }
//! ```

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use super::{
    mime_types::{mime_for_file_name, parse_mime_type},
    Attachment, AttachmentBody, BodyPart, BuildError, Delivery, EmailAddress, IntoAddressEntries, MailError,
    Mailbox, Message, RecipientRole, SenderRole, TransportFactory, TransportRegistry, TEXT_PLAIN,
};

/// Builds a single outgoing message and hands it to a transport.
///
/// Setters consume and return the builder so calls can be chained. Setters
/// that validate their input return a [`Result`], and fail before anything
/// reaches a transport. Their [`BuildError`] hands the builder back, so a
/// rejected address or attachment does not cost the rest of the message.
#[derive(Clone, Debug, Default)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    /// An empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// A message with an optional subject and first body part.
    ///
    /// A body without a MIME type becomes the plain text body.
    pub fn create(
        subject: Option<&str>,
        body: Option<&str>,
        mime_type: Option<&str>,
    ) -> Result<Self, MailError> {
        let mut builder = Self::new();

        if let Some(subject) = subject {
            builder = builder.subject(subject);
        }

        if let Some(body) = body {
            builder = builder.message(body, mime_type)?;
        }

        Ok(builder)
    }

    /// Replaces the subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.message.set_subject(subject.into());
        self
    }

    /// Sets a body part.
    ///
    /// Without a MIME type, or with `text/plain`, this replaces the plain text
    /// body. Any other MIME type appends an alternative part; calling this
    /// twice with the same MIME type appends two parts.
    pub fn message(mut self, body: impl Into<String>, mime_type: Option<&str>) -> Result<Self, BuildError> {
        let mime_type = match mime_type.map(parse_mime_type).transpose() {
            Ok(mime_type) => mime_type,
            Err(error) => return Err(BuildError::new(self, error)),
        };

        match mime_type {
            Some(mime_type) if !is_plain_text(&mime_type) => {
                self.message.push_alternative(BodyPart {
                    content: body.into(),
                    mime_type,
                });
            }
            _ => self.message.set_body(body.into()),
        }

        Ok(self)
    }

    /// Adds one or more recipients under `role`.
    ///
    /// Accepts a single address, an `(address, name)` pair, or any list or
    /// map of those (see [`IntoAddressEntries`]). Stops at the first malformed
    /// address; the builder in the error holds the entries before it.
    pub fn recipient(mut self, role: RecipientRole, addresses: impl IntoAddressEntries) -> Result<Self, BuildError> {
        for entry in addresses.into_entries() {
            match EmailAddress::new(entry.address()) {
                Ok(address) => self
                    .message
                    .insert_recipient(role, Mailbox::new(address, entry.name().map(str::to_string))),
                Err(source) => {
                    let error = MailError::InvalidRecipient {
                        address: entry.address().to_string(),
                        source,
                    };

                    return Err(BuildError::new(self, error));
                }
            }
        }

        Ok(self)
    }

    /// Adds "to" recipients
    ///
    /// ```
    /// # use mailwork::domain::mail::{MailError, MessageBuilder};
    /// # fn main() -> Result<(), MailError> {
    /// // A single recipient
    /// let email = MessageBuilder::new().to(("john.doe@domain.com", "John Doe"))?;
    ///
    /// // Multiple entries
    /// let email = email.to(vec!["frank.doe@domain.com", "jane.doe@domain.com"])?;
    /// # assert_eq!(email.as_message().recipients().len(), 3);
    /// # Ok(())
    /// # }
    /// ```
    pub fn to(self, addresses: impl IntoAddressEntries) -> Result<Self, BuildError> {
        self.recipient(RecipientRole::To, addresses)
    }

    /// Adds "carbon copy" recipients
    pub fn cc(self, addresses: impl IntoAddressEntries) -> Result<Self, BuildError> {
        self.recipient(RecipientRole::Cc, addresses)
    }

    /// Adds "blind carbon copy" recipients
    pub fn bcc(self, addresses: impl IntoAddressEntries) -> Result<Self, BuildError> {
        self.recipient(RecipientRole::Bcc, addresses)
    }

    /// Adds one or more originator addresses under `role`, with the same input
    /// shapes as [`MessageBuilder::recipient`]. Single slot roles keep the last
    /// address given.
    pub fn originator(mut self, role: SenderRole, addresses: impl IntoAddressEntries) -> Result<Self, BuildError> {
        for entry in addresses.into_entries() {
            let address = match EmailAddress::new(entry.address()) {
                Ok(address) => address,
                Err(source) => {
                    let error = MailError::InvalidSender {
                        address: entry.address().to_string(),
                        source,
                    };

                    return Err(BuildError::new(self, error));
                }
            };

            let name = match role {
                SenderRole::ReturnPath => None,
                _ => entry.name().map(str::to_string),
            };

            self.message.insert_sender(role, Mailbox::new(address, name));
        }

        Ok(self)
    }

    /// Adds "from" addresses. When more than one is given, the caller must
    /// also set [`MessageBuilder::sender`]; this is not checked.
    pub fn from(self, addresses: impl IntoAddressEntries) -> Result<Self, BuildError> {
        self.originator(SenderRole::From, addresses)
    }

    /// Adds "reply to" addresses
    pub fn reply_to(self, addresses: impl IntoAddressEntries) -> Result<Self, BuildError> {
        self.originator(SenderRole::ReplyTo, addresses)
    }

    /// Sets the single authoritative sender, replacing any previous one.
    /// Required by RFC 5322 whenever the message has several "from" addresses.
    pub fn sender(self, email: &str, name: Option<&str>) -> Result<Self, BuildError> {
        match name {
            Some(name) => self.originator(SenderRole::Sender, (email, name)),
            None => self.originator(SenderRole::Sender, email),
        }
    }

    /// Sets the return path for bounce messages
    pub fn return_path(self, email: &str) -> Result<Self, BuildError> {
        self.originator(SenderRole::ReturnPath, email)
    }

    /// Attaches a file.
    ///
    /// The path must name a readable regular file now; its bytes are read
    /// when the message is sent.
    pub fn attach_file(mut self, path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();

        if let Err(error) = check_file(path) {
            return Err(BuildError::new(self, error));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        self.message.push_attachment(Attachment {
            mime_type: mime_for_file_name(&file_name).to_string(),
            file_name,
            body: AttachmentBody::File(path.to_path_buf()),
        });

        Ok(self)
    }

    /// Attaches in-memory content as a file.
    ///
    /// Without a MIME type one is guessed from the file name's extension,
    /// falling back to `application/octet-stream`.
    pub fn attach_content(
        mut self,
        data: impl Into<Vec<u8>>,
        file_name: &str,
        mime_type: Option<&str>,
    ) -> Result<Self, BuildError> {
        let mime_type = match mime_type.map(parse_mime_type) {
            Some(Ok(mime_type)) => mime_type,
            Some(Err(error)) => return Err(BuildError::new(self, error)),
            None => mime_for_file_name(file_name).to_string(),
        };

        self.message.push_attachment(Attachment {
            file_name: file_name.to_string(),
            mime_type,
            body: AttachmentBody::Bytes(data.into()),
        });

        Ok(self)
    }

    /// The message composed so far
    pub fn as_message(&self) -> &Message {
        &self.message
    }

    /// Sends the message through the transport configured for `group`.
    ///
    /// The message is validated and its attachments read before the
    /// transport is looked up, so invalid messages never reach a transport.
    /// Nothing is retried.
    ///
    /// # Returns
    /// - [`Ok`] with a [`Delivery`] listing accepted and, for transports that
    ///   support partial acceptance, rejected recipients.
    /// - [`Err`] with a [`MailError`]; delivery failures are
    ///   [`MailError::Delivery`].
    pub async fn send<F: TransportFactory>(
        &self,
        registry: &TransportRegistry<F>,
        group: &str,
    ) -> Result<Delivery, MailError> {
        self.message.validate()?;

        let message = self.message.clone().load_attachments().await?;
        let transport = registry.transport(group)?;

        debug!(
            "sending message to {} recipient(s) through {} transport of group \"{}\"",
            message.recipients().len(),
            transport.name(),
            group
        );

        let delivery = transport.deliver(&message).await?;

        if delivery.is_partial() {
            warn!(
                "{} of {} recipient(s) rejected by {} transport",
                delivery.rejected.len(),
                delivery.accepted.len() + delivery.rejected.len(),
                transport.name()
            );
        } else {
            info!(
                "message delivered to {} recipient(s) through group \"{}\"",
                delivery.accepted_count(),
                group
            );
        }

        Ok(delivery)
    }
}

/// The path must name a regular file that can be opened.
fn check_file(path: &Path) -> Result<(), MailError> {
    let not_found = |source| MailError::AttachmentNotFound {
        path: PathBuf::from(path),
        source,
    };

    let metadata = File::open(path)
        .and_then(|file| file.metadata())
        .map_err(not_found)?;

    if !metadata.is_file() {
        return Err(not_found(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }

    Ok(())
}

fn is_plain_text(mime_type: &str) -> bool {
    mime_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(TEXT_PLAIN))
        .unwrap_or(true)
}
