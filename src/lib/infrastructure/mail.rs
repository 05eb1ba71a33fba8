//! Mail transports backed by [`lettre`] and local commands

use std::sync::Arc;

use tracing::info;

use crate::domain::mail::{config::ConfigError, Transport, TransportConfig, TransportFactory};

mod command;
mod lettre_message;
mod local;
mod memory;
mod sendmail;
mod smtp;

pub use command::DEFAULT_PROGRAM;
pub use lettre_message::{build as build_lettre_message, envelope as lettre_envelope};
pub use local::LocalTransport;
pub use memory::MemoryTransport;
pub use sendmail::SendmailTransport;
pub use smtp::SmtpTransport;

/// Builds the transport matching each group's driver.
///
/// Building needs no async runtime; transports connect on first delivery.
#[derive(Clone, Copy, Debug, Default)]
pub struct LettreTransportFactory;

impl TransportFactory for LettreTransportFactory {
    fn build(&self, group: &str, config: &TransportConfig) -> Result<Arc<dyn Transport>, ConfigError> {
        info!("creating {} transport for group \"{}\"", config.driver(), group);

        let transport: Arc<dyn Transport> = match config {
            TransportConfig::Smtp(smtp) => {
                Arc::new(SmtpTransport::new(smtp).map_err(|e| ConfigError::InvalidOption {
                    group: group.to_string(),
                    option: "hostname",
                    reason: e.to_string(),
                })?)
            }
            TransportConfig::Sendmail(sendmail) => Arc::new(SendmailTransport::new(sendmail)),
            TransportConfig::Local(local) => Arc::new(LocalTransport::new(local)),
        };

        Ok(transport)
    }
}
