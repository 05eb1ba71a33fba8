//! Rendering of domain messages with [`lettre`]

use lettre::{
    address::Envelope,
    message::{header::ContentType, Attachment as FileAttachment, MultiPart, SinglePart},
    Address, Message as Email,
};

use crate::domain::mail::{DeliveryError, Message, RecipientRole, SenderRole};

/// The SMTP envelope for a message. Bcc recipients are included here even
/// though they never appear in the headers.
pub fn envelope(message: &Message, transport: &'static str) -> Result<Envelope, DeliveryError> {
    let from = message.envelope_sender().map(|a| a.as_address().clone());
    let to = message
        .envelope_recipients()
        .into_iter()
        .map(Address::from)
        .collect();

    Envelope::new(from, to).map_err(|e| DeliveryError::new(transport, "invalid envelope").with_source(e))
}

/// Builds the [`lettre`] message, reading file backed attachments that were
/// not loaded yet.
pub fn build(message: &Message, transport: &'static str) -> Result<Email, DeliveryError> {
    let mut builder = Email::builder();

    for mailbox in message.senders_with(SenderRole::From) {
        builder = builder.from(mailbox.into());
    }

    for mailbox in message.senders_with(SenderRole::ReplyTo) {
        builder = builder.reply_to(mailbox.into());
    }

    if let Some(sender) = message.sender() {
        builder = builder.sender(sender.into());
    }

    for recipient in message.recipients() {
        let mailbox: lettre::message::Mailbox = (&recipient.mailbox).into();

        builder = match recipient.role {
            RecipientRole::To => builder.to(mailbox),
            RecipientRole::Cc => builder.cc(mailbox),
            RecipientRole::Bcc => builder.bcc(mailbox),
        };
    }

    if let Some(subject) = message.subject() {
        builder = builder.subject(subject);
    }

    builder = builder.envelope(envelope(message, transport)?);

    let invalid = |e: lettre::error::Error| {
        DeliveryError::new(transport, "could not render message").with_source(e)
    };

    match body(message, transport)? {
        Body::Single(part) => builder.singlepart(part).map_err(invalid),
        Body::Multi(part) => builder.multipart(part).map_err(invalid),
    }
}

enum Body {
    Single(SinglePart),
    Multi(MultiPart),
}

fn body(message: &Message, transport: &'static str) -> Result<Body, DeliveryError> {
    let plain = SinglePart::plain(message.body().unwrap_or_default().to_string());

    let text = match message.alternatives() {
        [] => Body::Single(plain),
        alternatives => {
            let mut multipart = MultiPart::alternative().singlepart(plain);

            for part in alternatives {
                multipart = multipart.singlepart(
                    SinglePart::builder()
                        .header(content_type(&part.mime_type, transport)?)
                        .body(part.content.clone()),
                );
            }

            Body::Multi(multipart)
        }
    };

    if message.attachments().is_empty() {
        return Ok(text);
    }

    let mut mixed = match text {
        Body::Single(part) => MultiPart::mixed().singlepart(part),
        Body::Multi(part) => MultiPart::mixed().multipart(part),
    };

    for attachment in message.attachments() {
        let contents = attachment.contents().map_err(|e| {
            DeliveryError::new(transport, format!("could not read attachment {}", attachment.file_name))
                .with_source(e)
        })?;

        mixed = mixed.singlepart(
            FileAttachment::new(attachment.file_name.clone())
                .body(contents, content_type(&attachment.mime_type, transport)?),
        );
    }

    Ok(Body::Multi(mixed))
}

/// Text parts without an explicit charset are sent as UTF-8.
fn content_type(mime_type: &str, transport: &'static str) -> Result<ContentType, DeliveryError> {
    let with_charset = if mime_type.trim_start().to_ascii_lowercase().starts_with("text/")
        && !mime_type.to_ascii_lowercase().contains("charset")
    {
        format!("{}; charset=utf-8", mime_type)
    } else {
        mime_type.to_string()
    };

    ContentType::parse(&with_charset).map_err(|e| {
        DeliveryError::new(transport, format!("invalid MIME type \"{}\"", mime_type)).with_source(e)
    })
}
