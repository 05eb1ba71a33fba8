//! Bounded concurrent sending

use std::sync::Arc;

use anyhow::anyhow;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::debug;

use super::{Delivery, MailError, MessageBuilder, TransportFactory, TransportRegistry};

/// Sends messages in the background with a cap on how many deliveries are in
/// flight at once.
#[derive(Debug)]
pub struct Dispatcher<F: TransportFactory> {
    registry: Arc<TransportRegistry<F>>,
    permits: Arc<Semaphore>,
}

impl<F: TransportFactory> Clone for Dispatcher<F> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            permits: Arc::clone(&self.permits),
        }
    }
}

impl<F: TransportFactory> Dispatcher<F> {
    /// Create a dispatcher allowing `max_in_flight` concurrent deliveries
    /// (at least one).
    pub fn new(registry: Arc<TransportRegistry<F>>, max_in_flight: usize) -> Self {
        Self {
            registry,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// The registry messages are sent through
    pub fn registry(&self) -> &TransportRegistry<F> {
        &self.registry
    }

    /// Sends one message, waiting for a free slot first
    pub async fn send(&self, message: &MessageBuilder, group: &str) -> Result<Delivery, MailError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| MailError::UnknownError(e.into()))?;

        message.send(&self.registry, group).await
    }

    /// Sends every message through `group`, each on its own task, and returns
    /// the results in the order the messages were given.
    pub async fn send_all(
        &self,
        messages: Vec<MessageBuilder>,
        group: &str,
    ) -> Vec<Result<Delivery, MailError>> {
        let total = messages.len();
        let mut tasks = JoinSet::new();

        for (index, message) in messages.into_iter().enumerate() {
            let dispatcher = self.clone();
            let group = group.to_string();

            tasks.spawn(async move { (index, dispatcher.send(&message, &group).await) });
        }

        let mut results: Vec<Option<Result<Delivery, MailError>>> = (0..total).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => debug!("send task did not complete: {}", e),
            }
        }

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| Err(MailError::UnknownError(anyhow!("send task did not complete"))))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use testresult::TestResult;

    use crate::domain::mail::{
        registry::MockTransportFactory, DeliveryError, MailConfig, Message, Transport,
        TransportConfig, DEFAULT_GROUP,
    };

    use super::*;

    /// Counts how many deliveries overlap
    #[derive(Debug, Default)]
    struct SlowTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn deliver(&self, message: &Message) -> Result<Delivery, DeliveryError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(20)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match message.subject() {
                Some("fail") => Err(DeliveryError::new("slow", "refused")),
                _ => Ok(Delivery::accepted(message.envelope_recipients())),
            }
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn dispatcher(transport: Arc<SlowTransport>, max_in_flight: usize) -> Dispatcher<MockTransportFactory> {
        let mut factory = MockTransportFactory::new();
        factory
            .expect_build()
            .times(1)
            .returning(move |_, _| Ok(transport.clone() as Arc<dyn Transport>));

        let registry = TransportRegistry::new(
            MailConfig::new().with_group(DEFAULT_GROUP, TransportConfig::default()),
            factory,
        );

        Dispatcher::new(Arc::new(registry), max_in_flight)
    }

    fn message(subject: &str) -> Result<MessageBuilder, MailError> {
        Ok(MessageBuilder::create(Some(subject), Some("body"), None)?
            .to("to@example.com")?
            .from("from@example.com")?)
    }

    #[tokio::test]
    async fn test_send_all_respects_the_limit() -> TestResult {
        let transport = Arc::new(SlowTransport::default());
        let dispatcher = dispatcher(Arc::clone(&transport), 2);

        let messages = (0..8)
            .map(|i| message(&format!("message {}", i)))
            .collect::<Result<Vec<_>, _>>()?;

        let results = dispatcher.send_all(messages, DEFAULT_GROUP).await;

        assert_eq!(results.len(), 8);
        assert!(results.iter().all(Result::is_ok));
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_send_all_keeps_input_order() -> TestResult {
        let transport = Arc::new(SlowTransport::default());
        let dispatcher = dispatcher(transport, 4);

        let messages = vec![message("ok")?, message("fail")?, message("ok")?];

        let results = dispatcher.send_all(messages, DEFAULT_GROUP).await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(MailError::Delivery(_))));
        assert!(results[2].is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn test_zero_limit_still_sends() -> TestResult {
        let transport = Arc::new(SlowTransport::default());
        let dispatcher = dispatcher(Arc::clone(&transport), 0);

        let delivery = dispatcher.send(&message("ok")?, DEFAULT_GROUP).await?;

        assert_eq!(delivery.accepted_count(), 1);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 1);

        Ok(())
    }
}
