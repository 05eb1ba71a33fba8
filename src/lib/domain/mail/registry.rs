//! Transport registry
//!
//! Turns configuration group names into transports, building each one at most
//! once. Transports live as long as the registry; there is no eviction, so a
//! configuration change needs a new registry.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

#[cfg(test)]
use mockall::mock;
use tracing::{debug, info};

use super::{ConfigError, MailConfig, MailError, Transport, TransportConfig};

/// Builds a transport from a validated configuration
pub trait TransportFactory: Send + Sync + 'static {
    /// Build the transport for `group`
    ///
    /// # Arguments
    /// * `group` - The configuration group name, for logs and errors.
    /// * `config` - The group's [`TransportConfig`].
    fn build(&self, group: &str, config: &TransportConfig) -> Result<Arc<dyn Transport>, ConfigError>;
}

#[cfg(test)]
mock! {
    pub TransportFactory {}

    impl TransportFactory for TransportFactory {
        fn build(&self, group: &str, config: &TransportConfig) -> Result<Arc<dyn Transport>, ConfigError>;
    }
}

/// Lazily built, cached transports keyed by configuration group.
///
/// Construct one at startup and share it (by reference or [`Arc`]) with
/// everything that sends mail.
pub struct TransportRegistry<F: TransportFactory> {
    config: MailConfig,
    factory: F,
    transports: Mutex<HashMap<String, Arc<dyn Transport>>>,
}

impl<F: TransportFactory> TransportRegistry<F> {
    /// Create a registry with no transports built yet
    pub fn new(config: MailConfig, factory: F) -> Self {
        Self {
            config,
            factory,
            transports: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration the registry builds from
    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    /// Returns the transport for `group`, building it on first use.
    ///
    /// Concurrent callers asking for the same group all receive the same
    /// instance and the factory runs once. A failed build is not cached.
    pub fn transport(&self, group: &str) -> Result<Arc<dyn Transport>, MailError> {
        let mut transports = self
            .transports
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(transport) = transports.get(group) {
            debug!("using cached {} transport for group \"{}\"", transport.name(), group);

            return Ok(Arc::clone(transport));
        }

        let config = self.config.group(group)?;
        let transport = self.factory.build(group, config)?;

        info!(
            "built {} transport for mail group \"{}\"",
            transport.name(),
            group
        );

        transports.insert(group.to_string(), Arc::clone(&transport));

        Ok(transport)
    }
}

impl<F: TransportFactory> fmt::Debug for TransportRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let built: Vec<String> = self
            .transports
            .lock()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();

        f.debug_struct("TransportRegistry")
            .field("config", &self.config)
            .field("factory", &"TransportFactory")
            .field("transports", &built)
            .finish()
    }
}
