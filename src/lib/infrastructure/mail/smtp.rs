//! SMTP transport implementation

use async_trait::async_trait;
use lettre::{
    transport::smtp::{authentication::Credentials, AsyncSmtpTransportBuilder, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::domain::mail::{
    config::{Encryption, SmtpConfig},
    Delivery, DeliveryError, Message, Transport,
};

use super::lettre_message;

const NAME: &str = "smtp";

/// SMTP transport
///
/// The connection pool is created on the first delivery, inside the Tokio
/// runtime that sends the message. Creating the transport needs no runtime.
pub struct SmtpTransport {
    config: SmtpConfig,
    transport: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpTransport {
    /// Create a new SMTP transport. No connection is made until the first
    /// message is sent.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        relay(config)?;

        Ok(Self {
            config: config.clone(),
            transport: OnceCell::new(),
        })
    }

    /// Whether the connection pool has been created
    pub fn is_connected(&self) -> bool {
        self.transport.initialized()
    }

    async fn transport(&self) -> Result<&AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        self.transport
            .get_or_try_init(|| async {
                debug!("creating SMTP connection pool for {}", self.config.hostname);

                relay(&self.config).map(AsyncSmtpTransportBuilder::build)
            })
            .await
            .map_err(|e| DeliveryError::new(NAME, e.to_string()).with_source(e))
    }
}

fn relay(config: &SmtpConfig) -> Result<AsyncSmtpTransportBuilder, SmtpError> {
    let mut relay = match config.encryption {
        Encryption::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.hostname)?,
        Encryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.hostname)?,
        Encryption::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.hostname),
    };

    if let Some(port) = config.port {
        relay = relay.port(port);
    }

    if let Some(credentials) = &config.credentials {
        relay = relay.credentials(Credentials::new(
            credentials.username.clone(),
            credentials.password.expose().to_string(),
        ));
    }

    if let Some(timeout) = config.timeout {
        relay = relay.timeout(Some(timeout));
    }

    Ok(relay)
}

impl std::fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn deliver(&self, message: &Message) -> Result<Delivery, DeliveryError> {
        let email = lettre_message::build(message, NAME)?;

        match self.transport().await?.send(email).await {
            Ok(response) => {
                debug!("{} accepted message with {}", self.config.hostname, response.code());

                Ok(Delivery::accepted(message.envelope_recipients()))
            }
            Err(e) => {
                warn!("{} refused message: {}", self.config.hostname, e);

                // lettre aborts the whole transaction on a refused recipient,
                // so a permanent failure means nobody received the message.
                let rejected = if e.is_permanent() {
                    message.envelope_recipients()
                } else {
                    Vec::new()
                };

                Err(DeliveryError::new(NAME, e.to_string())
                    .with_code(e.status().and_then(|code| code.to_string().parse().ok()))
                    .with_transient(e.is_transient())
                    .with_rejected(rejected)
                    .with_source(e))
            }
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use testresult::TestResult;

    use crate::domain::mail::{
        config::{Secret, SmtpCredentials},
        MessageBuilder,
    };

    use super::*;

    #[test]
    fn test_build_for_every_encryption_mode() -> TestResult {
        for encryption in [Encryption::None, Encryption::Ssl, Encryption::Tls] {
            let config = SmtpConfig {
                encryption,
                port: Some(2525),
                credentials: Some(SmtpCredentials {
                    username: "mailer".into(),
                    password: Secret::new("hunter2"),
                }),
                timeout: Some(Duration::from_secs(5)),
                ..SmtpConfig::new("smtp.example.com")
            };

            let transport = SmtpTransport::new(&config)?;

            assert_eq!(transport.name(), "smtp");
            assert!(!transport.is_connected());
            assert!(!format!("{:?}", transport).contains("hunter2"));
        }

        Ok(())
    }

    #[test]
    fn test_build_and_drop_outside_a_runtime() -> TestResult {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    SmtpTransport::new(&SmtpConfig::new("smtp.example.com")).map(|t| t.is_connected())
                })
            })
            .collect();

        for handle in handles {
            assert!(!handle.join().expect("builder thread panicked")?);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_delivery_error() -> TestResult {
        let config = SmtpConfig {
            port: Some(1),
            timeout: Some(Duration::from_secs(2)),
            ..SmtpConfig::new("127.0.0.1")
        };

        let transport = SmtpTransport::new(&config)?;

        let message = MessageBuilder::create(Some("Hello"), Some("Hi"), None)?
            .to("to@example.com")?
            .from("from@example.com")?;

        let result = transport.deliver(message.as_message()).await;

        assert!(transport.is_connected());

        match result {
            Err(err) => {
                assert_eq!(err.transport(), "smtp");
                assert_eq!(err.code(), None);
                assert!(err.rejected().is_empty());
            }
            Ok(delivery) => panic!("expected a delivery error, got {:?}", delivery),
        }

        Ok(())
    }
}
