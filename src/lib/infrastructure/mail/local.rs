//! Local mail command transport
//!
//! Hands the rendered message to the system mail command, passing the
//! configured extra parameters through.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::mail::{config::LocalConfig, Delivery, DeliveryError, Message, Transport};

use super::command::{MailCommand, DEFAULT_PROGRAM};

const NAME: &str = "local";

/// Local mail command transport
#[derive(Clone, Debug)]
pub struct LocalTransport {
    command: MailCommand,
}

impl LocalTransport {
    /// Create a transport running the system mail command with the configured
    /// extra parameters
    pub fn new(config: &LocalConfig) -> Self {
        Self::with_program(DEFAULT_PROGRAM, config)
    }

    /// Create a transport running `program` instead of the system mail command
    pub fn with_program(program: impl Into<PathBuf>, config: &LocalConfig) -> Self {
        let params = config
            .params
            .as_deref()
            .map(|params| params.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Self {
            command: MailCommand::new(program, params),
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn deliver(&self, message: &Message) -> Result<Delivery, DeliveryError> {
        self.command.run(NAME, message).await
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
