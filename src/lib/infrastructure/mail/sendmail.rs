//! Sendmail transport implementation

use async_trait::async_trait;

use crate::domain::mail::{config::SendmailConfig, Delivery, DeliveryError, Message, Transport};

use super::command::{MailCommand, DEFAULT_PROGRAM};

const NAME: &str = "sendmail";

/// Pipes messages to a sendmail compatible command
#[derive(Clone, Debug)]
pub struct SendmailTransport {
    command: MailCommand,
}

impl SendmailTransport {
    /// Create a transport running the configured command line, or the system
    /// sendmail.
    ///
    /// The arguments of the command line are kept and the envelope is
    /// appended: `<program> -i <args> -f <sender> -- <recipients>`.
    pub fn new(config: &SendmailConfig) -> Self {
        let command = match config.command.as_deref() {
            Some(command_line) => MailCommand::parse(command_line),
            None => MailCommand::new(DEFAULT_PROGRAM, Vec::new()),
        };

        Self { command }
    }
}

#[async_trait]
impl Transport for SendmailTransport {
    async fn deliver(&self, message: &Message) -> Result<Delivery, DeliveryError> {
        self.command.run(NAME, message).await
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
