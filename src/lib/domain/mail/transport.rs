//! Transport module

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::mock;

use super::{DeliveryError, EmailAddress, Message};

/// Outcome of a delivery that at least one recipient accepted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients the transport accepted
    pub accepted: Vec<EmailAddress>,

    /// Recipients the transport refused
    pub rejected: Vec<EmailAddress>,

    /// When the transport accepted the message
    pub sent_at: DateTime<Utc>,
}

impl Delivery {
    /// A delivery accepted for every recipient
    pub fn accepted(recipients: Vec<EmailAddress>) -> Self {
        Self {
            accepted: recipients,
            rejected: Vec::new(),
            sent_at: Utc::now(),
        }
    }

    /// Number of recipients that accepted the message
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    /// Whether some recipients were refused
    pub fn is_partial(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Delivery mechanism for composed messages.
///
/// Implementations are shared between tasks once constructed, so
/// [`Transport::deliver`] must be safe to call concurrently.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Deliver a message
    ///
    /// # Arguments
    /// * `message` - A validated [`Message`] whose attachments are loaded.
    ///
    /// # Returns
    /// - [`Ok`] with a [`Delivery`] when at least one recipient accepted the
    ///   message. Refused addresses are listed in [`Delivery::rejected`].
    /// - [`Err`] with a [`DeliveryError`] when nothing was delivered.
    async fn deliver(&self, message: &Message) -> Result<Delivery, DeliveryError>;

    /// Short name used in logs and errors
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mock! {
    pub Transport {}

    #[async_trait]
    impl Transport for Transport {
        async fn deliver(&self, message: &Message) -> Result<Delivery, DeliveryError>;
        fn name(&self) -> &'static str;
    }
}
