//! Email message

use std::{collections::HashSet, path::PathBuf};

use tracing::debug;

use super::{EmailAddress, MailError, Mailbox, RecipientRole, SenderRole};

/// MIME type of the primary body
pub const TEXT_PLAIN: &str = "text/plain";

/// A body part
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyPart {
    /// The content of the part
    pub content: String,

    /// The MIME type of the part
    pub mime_type: String,
}

/// A recipient address with its role
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    /// Whether this is a to, cc or bcc recipient
    pub role: RecipientRole,

    /// The recipient's mailbox
    pub mailbox: Mailbox,
}

/// An originator address with its role
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    /// Whether this is a from, reply-to, sender or return-path address
    pub role: SenderRole,

    /// The sender's mailbox
    pub mailbox: Mailbox,
}

/// Where the bytes of an attachment come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentBody {
    /// Read from the filesystem when the message is sent
    File(PathBuf),

    /// Held in memory
    Bytes(Vec<u8>),
}

/// A file attached to the message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// The file name presented to the recipient
    pub file_name: String,

    /// The MIME type of the content
    pub mime_type: String,

    /// The content
    pub body: AttachmentBody,
}

impl Attachment {
    /// Returns the attachment content, reading it from disk if it is file backed.
    pub fn contents(&self) -> Result<Vec<u8>, MailError> {
        match &self.body {
            AttachmentBody::Bytes(bytes) => Ok(bytes.clone()),
            AttachmentBody::File(path) => {
                std::fs::read(path).map_err(|source| MailError::AttachmentNotFound {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// An outgoing email message
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    subject: Option<String>,
    body: Option<String>,
    alternatives: Vec<BodyPart>,
    recipients: Vec<Recipient>,
    senders: Vec<Sender>,
    attachments: Vec<Attachment>,
}

impl Message {
    /// The subject, if set
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The primary plain text body, if set
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Alternative representations of the body, in the order they were added
    pub fn alternatives(&self) -> &[BodyPart] {
        &self.alternatives
    }

    /// All body parts, primary plain text body first
    pub fn parts(&self) -> Vec<BodyPart> {
        self.body
            .iter()
            .map(|content| BodyPart {
                content: content.clone(),
                mime_type: TEXT_PLAIN.to_string(),
            })
            .chain(self.alternatives.iter().cloned())
            .collect()
    }

    /// All recipients, in insertion order
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Recipients with the given role
    pub fn recipients_with(&self, role: RecipientRole) -> impl Iterator<Item = &Mailbox> + '_ {
        self.recipients
            .iter()
            .filter(move |r| r.role == role)
            .map(|r| &r.mailbox)
    }

    /// All originator addresses, in insertion order
    pub fn senders(&self) -> &[Sender] {
        &self.senders
    }

    /// Originator addresses with the given role
    pub fn senders_with(&self, role: SenderRole) -> impl Iterator<Item = &Mailbox> + '_ {
        self.senders
            .iter()
            .filter(move |s| s.role == role)
            .map(|s| &s.mailbox)
    }

    /// The `Sender` mailbox, if set
    pub fn sender(&self) -> Option<&Mailbox> {
        self.senders_with(SenderRole::Sender).next()
    }

    /// The bounce address, if set
    pub fn return_path(&self) -> Option<&EmailAddress> {
        self.senders_with(SenderRole::ReturnPath)
            .next()
            .map(|m| &m.address)
    }

    /// Attachments, in the order they were added
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// The address used for the SMTP `MAIL FROM`: the return path, else the
    /// sender, else the first from address.
    pub fn envelope_sender(&self) -> Option<&EmailAddress> {
        self.return_path()
            .or_else(|| self.sender().map(|m| &m.address))
            .or_else(|| self.senders_with(SenderRole::From).next().map(|m| &m.address))
    }

    /// Every to, cc and bcc address, in insertion order. An address listed
    /// under several roles appears once, compared without regard to case.
    pub fn envelope_recipients(&self) -> Vec<EmailAddress> {
        let mut seen = HashSet::new();

        self.recipients
            .iter()
            .map(|r| &r.mailbox.address)
            .filter(|address| seen.insert(address.as_str().to_ascii_lowercase()))
            .cloned()
            .collect()
    }

    /// Checks that the message can be handed to a transport.
    pub fn validate(&self) -> Result<(), MailError> {
        if self.recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }

        if self.senders_with(SenderRole::From).next().is_none() {
            return Err(MailError::NoSenders);
        }

        if self.body.is_none() {
            return Err(MailError::MissingBody);
        }

        Ok(())
    }

    /// Reads every file backed attachment into memory.
    pub async fn load_attachments(mut self) -> Result<Self, MailError> {
        for attachment in &mut self.attachments {
            if let AttachmentBody::File(path) = &attachment.body {
                debug!("reading attachment {}", path.display());

                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| MailError::AttachmentNotFound {
                        path: path.clone(),
                        source,
                    })?;

                attachment.body = AttachmentBody::Bytes(bytes);
            }
        }

        Ok(self)
    }

    pub(super) fn set_subject(&mut self, subject: String) {
        self.subject = Some(subject);
    }

    pub(super) fn set_body(&mut self, body: String) {
        self.body = Some(body);
    }

    pub(super) fn push_alternative(&mut self, part: BodyPart) {
        self.alternatives.push(part);
    }

    /// Adding an address twice under the same role only updates its name.
    pub(super) fn insert_recipient(&mut self, role: RecipientRole, mailbox: Mailbox) {
        match self
            .recipients
            .iter()
            .position(|r| r.role == role && r.mailbox.address == mailbox.address)
        {
            Some(index) => self.recipients[index].mailbox.name = mailbox.name,
            None => self.recipients.push(Recipient { role, mailbox }),
        }
    }

    /// Single slot roles replace their previous value.
    pub(super) fn insert_sender(&mut self, role: SenderRole, mailbox: Mailbox) {
        if role.is_single() {
            self.senders.retain(|s| s.role != role);
        }

        match self
            .senders
            .iter()
            .position(|s| s.role == role && s.mailbox.address == mailbox.address)
        {
            Some(index) => self.senders[index].mailbox.name = mailbox.name,
            None => self.senders.push(Sender { role, mailbox }),
        }
    }

    pub(super) fn push_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }
}
