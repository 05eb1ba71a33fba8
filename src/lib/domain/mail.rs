//! Mail composition and delivery.

pub mod config;
mod builder;
mod dispatcher;
mod email_address;
mod errors;
mod mailbox;
mod message;
pub mod mime_types;
mod registry;
mod transport;

pub use builder::MessageBuilder;
pub use config::{ConfigError, MailConfig, TransportConfig, DEFAULT_GROUP};
pub use dispatcher::Dispatcher;
pub use email_address::{EmailAddress, EmailAddressError};
pub use errors::{BuildError, DeliveryError, MailError};
pub use mailbox::{AddressEntry, IntoAddressEntries, Mailbox, RecipientRole, SenderRole};
pub use message::{
    Attachment, AttachmentBody, BodyPart, Message, Recipient, Sender, TEXT_PLAIN,
};
pub use registry::{TransportFactory, TransportRegistry};
pub use transport::{Delivery, Transport};
