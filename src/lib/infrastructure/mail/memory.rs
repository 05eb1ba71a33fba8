//! In-memory transport

use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::domain::mail::{Delivery, DeliveryError, EmailAddress, Message, Transport};

const NAME: &str = "memory";

/// Keeps delivered messages in memory instead of sending them.
///
/// Addresses passed to [`MemoryTransport::refuse`] are rejected, which makes
/// partial deliveries reproducible.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    outbox: Mutex<Vec<Message>>,
    refused: HashSet<String>,
}

impl MemoryTransport {
    /// Create an empty transport that accepts everyone
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse deliveries to `address`
    pub fn refuse(mut self, address: impl Into<String>) -> Self {
        self.refused.insert(address.into().to_lowercase());
        self
    }

    /// Messages delivered so far, oldest first
    pub fn messages(&self) -> Vec<Message> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn deliver(&self, message: &Message) -> Result<Delivery, DeliveryError> {
        let (rejected, accepted): (Vec<EmailAddress>, Vec<EmailAddress>) = message
            .envelope_recipients()
            .into_iter()
            .partition(|address| self.refused.contains(&address.as_str().to_lowercase()));

        if accepted.is_empty() {
            return Err(DeliveryError::new(NAME, "every recipient was refused")
                .with_code(Some(550))
                .with_rejected(rejected));
        }

        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());

        debug!("stored message for {} recipients", accepted.len());

        Ok(Delivery {
            accepted,
            rejected,
            sent_at: Utc::now(),
        })
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::domain::mail::{MailError, MessageBuilder};

    use super::*;

    fn message() -> Result<MessageBuilder, MailError> {
        Ok(MessageBuilder::create(Some("Hello"), Some("Hi"), None)?
            .to(vec!["a@example.com", "b@example.com"])?
            .bcc("c@example.com")?
            .from("from@example.com")?)
    }

    #[tokio::test]
    async fn test_delivered_messages_are_kept() -> TestResult {
        let transport = MemoryTransport::new();

        let delivery = transport.deliver(message()?.as_message()).await?;

        assert_eq!(delivery.accepted_count(), 3);
        assert!(!delivery.is_partial());
        assert_eq!(transport.messages().len(), 1);
        assert_eq!(transport.messages()[0].subject(), Some("Hello"));

        Ok(())
    }

    #[tokio::test]
    async fn test_refused_addresses_make_a_partial_delivery() -> TestResult {
        let transport = MemoryTransport::new().refuse("B@example.com");

        let delivery = transport.deliver(message()?.as_message()).await?;

        assert!(delivery.is_partial());
        assert_eq!(delivery.accepted_count(), 2);
        assert_eq!(delivery.rejected, vec![EmailAddress::new("b@example.com")?]);

        Ok(())
    }

    #[tokio::test]
    async fn test_address_in_to_and_cc_is_delivered_once() -> TestResult {
        let transport = MemoryTransport::new();

        let message = MessageBuilder::create(Some("Hello"), Some("Hi"), None)?
            .to("a@example.com")?
            .cc("a@example.com")?
            .from("from@example.com")?;

        let delivery = transport.deliver(message.as_message()).await?;

        assert_eq!(delivery.accepted, vec![EmailAddress::new("a@example.com")?]);
        assert_eq!(delivery.accepted_count(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_refusing_everyone_is_an_error() -> TestResult {
        let transport = MemoryTransport::new()
            .refuse("a@example.com")
            .refuse("b@example.com")
            .refuse("c@example.com");

        let result = transport.deliver(message()?.as_message()).await;

        assert!(matches!(result, Err(ref e) if e.rejected().len() == 3 && e.code() == Some(550)));
        assert!(transport.messages().is_empty());

        Ok(())
    }
}
