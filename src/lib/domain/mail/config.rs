//! Transport configuration
//!
//! Configuration is a map of named groups, each selecting a driver:
//!
//! ```json
//! {
//!   "default": {
//!     "driver": "smtp",
//!     "options": { "hostname": "smtp.example.com", "port": 587, "encryption": "tls" }
//!   },
//!   "notifications": { "driver": "sendmail", "options": { "command": "/usr/sbin/sendmail -odb" } }
//! }
//! ```
//!
//! Groups are validated when the configuration is loaded. Driver names are
//! case-insensitive. A missing driver, or one that is not recognised, selects
//! the local driver.

use std::{collections::HashMap, fmt, path::Path, str::FromStr, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the configuration group used when none is given
pub const DEFAULT_GROUP: &str = "default";

/// Errors in the mail configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No group with that name is configured
    #[error("mail configuration group \"{0}\" is not defined")]
    UnknownGroup(String),

    /// A required option is missing
    #[error("mail configuration group \"{group}\" is missing required option \"{option}\"")]
    MissingOption {
        /// The group being loaded
        group: String,

        /// The missing option
        option: &'static str,
    },

    /// An option has an unusable value
    #[error("invalid option \"{option}\" in mail configuration group \"{group}\": {reason}")]
    InvalidOption {
        /// The group being loaded
        group: String,

        /// The offending option
        option: &'static str,

        /// What is wrong with it
        reason: String,
    },

    /// The configuration file could not be read
    #[error("could not read mail configuration")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON of the expected shape
    #[error("could not parse mail configuration")]
    Parse(#[from] serde_json::Error),
}

/// SMTP connection security
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encryption {
    /// Plain text connection
    #[default]
    None,

    /// TLS from the first byte (SMTPS)
    Ssl,

    /// Plain connection upgraded with STARTTLS
    Tls,
}

impl FromStr for Encryption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "ssl" => Ok(Self::Ssl),
            "tls" | "starttls" => Ok(Self::Tls),
            other => Err(format!("expected one of none, ssl, tls but got \"{}\"", other)),
        }
    }
}

/// A value that must not show up in logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The secret value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

/// SMTP login
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpCredentials {
    /// The SMTP username
    pub username: String,

    /// The SMTP password
    pub password: Secret,
}

/// SMTP driver options
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpConfig {
    /// The SMTP host
    pub hostname: String,

    /// The SMTP port; the default depends on `encryption`
    pub port: Option<u16>,

    /// Connection security
    pub encryption: Encryption,

    /// Login, if the server requires authentication
    pub credentials: Option<SmtpCredentials>,

    /// Network timeout; the transport default applies when absent
    pub timeout: Option<Duration>,
}

impl SmtpConfig {
    /// Plain text SMTP to `hostname` with every other option at its default
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: None,
            encryption: Encryption::None,
            credentials: None,
            timeout: None,
        }
    }
}

/// Sendmail driver options
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendmailConfig {
    /// Command line to run instead of the system sendmail. Its arguments are
    /// passed on every delivery, ahead of the envelope.
    pub command: Option<String>,
}

/// Local driver options
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalConfig {
    /// Extra parameters for the local mail command, whitespace separated
    pub params: Option<String>,
}

/// A validated transport configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportConfig {
    /// Deliver through an SMTP server
    Smtp(SmtpConfig),

    /// Deliver through a sendmail compatible command
    Sendmail(SendmailConfig),

    /// Deliver through the local mail facility
    Local(LocalConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Local(LocalConfig::default())
    }
}

impl TransportConfig {
    /// The driver name, as written in the configuration
    pub fn driver(&self) -> &'static str {
        match self {
            Self::Smtp(_) => "smtp",
            Self::Sendmail(_) => "sendmail",
            Self::Local(_) => "local",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawGroup {
    driver: Option<String>,

    #[serde(default)]
    options: RawOptions,
}

#[derive(Debug, Default, Deserialize)]
struct RawOptions {
    hostname: Option<String>,
    port: Option<u16>,
    encryption: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<u64>,
    command: Option<String>,
    params: Option<String>,
}

impl RawGroup {
    fn validate(self, group: &str) -> Result<TransportConfig, ConfigError> {
        let options = self.options;

        let driver = self.driver.map(|d| d.trim().to_ascii_lowercase());

        match driver.as_deref() {
            Some("smtp") => {
                let hostname = options
                    .hostname
                    .filter(|h| !h.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingOption {
                        group: group.to_string(),
                        option: "hostname",
                    })?;

                let encryption = options
                    .encryption
                    .as_deref()
                    .map(str::parse::<Encryption>)
                    .transpose()
                    .map_err(|reason| ConfigError::InvalidOption {
                        group: group.to_string(),
                        option: "encryption",
                        reason,
                    })?
                    .unwrap_or_default();

                let credentials = match (options.username, options.password) {
                    (Some(username), Some(password)) => Some(SmtpCredentials {
                        username,
                        password: Secret::new(password),
                    }),
                    (None, None) => None,
                    (Some(_), None) => {
                        return Err(ConfigError::MissingOption {
                            group: group.to_string(),
                            option: "password",
                        })
                    }
                    (None, Some(_)) => {
                        return Err(ConfigError::MissingOption {
                            group: group.to_string(),
                            option: "username",
                        })
                    }
                };

                Ok(TransportConfig::Smtp(SmtpConfig {
                    hostname,
                    port: options.port,
                    encryption,
                    credentials,
                    timeout: options.timeout.map(Duration::from_secs),
                }))
            }
            Some("sendmail") => {
                let command = options.command.filter(|c| !c.trim().is_empty());

                // The message is piped on stdin with the recipients on the
                // command line, which these modes do not accept.
                if let Some(mode) = command
                    .iter()
                    .flat_map(|c| c.split_whitespace())
                    .find(|arg| matches!(*arg, "-bs" | "-t"))
                {
                    return Err(ConfigError::InvalidOption {
                        group: group.to_string(),
                        option: "command",
                        reason: format!("sendmail mode \"{}\" is not supported", mode),
                    });
                }

                Ok(TransportConfig::Sendmail(SendmailConfig { command }))
            }
            Some("local") | None => Ok(TransportConfig::Local(LocalConfig {
                params: options.params,
            })),
            Some(other) => {
                warn!(
                    "mail configuration group \"{}\" names unknown driver \"{}\", using local",
                    group, other
                );

                Ok(TransportConfig::Local(LocalConfig {
                    params: options.params,
                }))
            }
        }
    }
}

/// Named transport configurations
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailConfig {
    groups: HashMap<String, TransportConfig>,
}

impl MailConfig {
    /// An empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a group
    pub fn with_group(mut self, name: impl Into<String>, config: TransportConfig) -> Self {
        self.groups.insert(name.into(), config);
        self
    }

    /// Looks up a group by name
    pub fn group(&self, name: &str) -> Result<&TransportConfig, ConfigError> {
        self.groups
            .get(name)
            .ok_or_else(|| ConfigError::UnknownGroup(name.to_string()))
    }

    /// Names of the configured groups
    pub fn group_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.keys().map(String::as_str)
    }

    /// Parses and validates a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, RawGroup> = serde_json::from_str(json)?;

        let groups = raw
            .into_iter()
            .map(|(name, group)| {
                let config = group.validate(&name)?;
                debug!("loaded mail group \"{}\" ({})", name, config.driver());
                Ok((name, config))
            })
            .collect::<Result<_, ConfigError>>()?;

        Ok(Self { groups })
    }

    /// Reads, parses and validates a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;

        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use testresult::TestResult;

    use super::*;

    #[test]
    fn test_smtp_group_with_all_options() -> TestResult {
        let config = MailConfig::from_json(
            r#"{
                "default": {
                    "driver": "smtp",
                    "options": {
                        "hostname": "smtp.example.com",
                        "port": 2525,
                        "encryption": "TLS",
                        "username": "mailer",
                        "password": "hunter2",
                        "timeout": 15
                    }
                }
            }"#,
        )?;

        let expected = TransportConfig::Smtp(SmtpConfig {
            hostname: "smtp.example.com".into(),
            port: Some(2525),
            encryption: Encryption::Tls,
            credentials: Some(SmtpCredentials {
                username: "mailer".into(),
                password: Secret::new("hunter2"),
            }),
            timeout: Some(Duration::from_secs(15)),
        });

        assert_eq!(config.group(DEFAULT_GROUP)?, &expected);

        Ok(())
    }

    #[test]
    fn test_smtp_without_hostname_is_rejected() {
        let result = MailConfig::from_json(r#"{ "default": { "driver": "smtp", "options": {} } }"#);

        assert!(matches!(
            result,
            Err(ConfigError::MissingOption { option: "hostname", .. })
        ));
    }

    #[test]
    fn test_smtp_username_requires_password() {
        let result = MailConfig::from_json(
            r#"{ "default": { "driver": "smtp", "options": { "hostname": "h", "username": "u" } } }"#,
        );

        assert!(matches!(
            result,
            Err(ConfigError::MissingOption { option: "password", .. })
        ));
    }

    #[test]
    fn test_smtp_invalid_encryption_is_rejected() {
        let result = MailConfig::from_json(
            r#"{ "default": { "driver": "smtp", "options": { "hostname": "h", "encryption": "rot13" } } }"#,
        );

        assert!(matches!(
            result,
            Err(ConfigError::InvalidOption { option: "encryption", .. })
        ));
    }

    #[test]
    fn test_null_encryption_means_none() -> TestResult {
        let config = MailConfig::from_json(
            r#"{ "default": { "driver": "smtp", "options": { "hostname": "h", "encryption": null } } }"#,
        )?;

        assert!(matches!(
            config.group(DEFAULT_GROUP)?,
            TransportConfig::Smtp(SmtpConfig { encryption: Encryption::None, .. })
        ));

        Ok(())
    }

    #[test]
    fn test_sendmail_group() -> TestResult {
        let config = MailConfig::from_json(
            r#"{ "bulk": { "driver": "sendmail", "options": { "command": "/usr/lib/sendmail" } } }"#,
        )?;

        assert_eq!(
            config.group("bulk")?,
            &TransportConfig::Sendmail(SendmailConfig {
                command: Some("/usr/lib/sendmail".into())
            })
        );

        Ok(())
    }

    #[test]
    fn test_sendmail_command_keeps_arguments() -> TestResult {
        let config = MailConfig::from_json(
            r#"{ "bulk": { "driver": "sendmail", "options": { "command": "/usr/sbin/sendmail -odb" } } }"#,
        )?;

        assert_eq!(
            config.group("bulk")?,
            &TransportConfig::Sendmail(SendmailConfig {
                command: Some("/usr/sbin/sendmail -odb".into())
            })
        );

        Ok(())
    }

    #[test]
    fn test_sendmail_modes_without_stdin_delivery_are_rejected() {
        for command in ["/usr/sbin/sendmail -bs", "/usr/sbin/sendmail -oi -t"] {
            let json = format!(
                r#"{{ "bulk": {{ "driver": "sendmail", "options": {{ "command": "{}" }} }} }}"#,
                command
            );

            assert!(matches!(
                MailConfig::from_json(&json),
                Err(ConfigError::InvalidOption { option: "command", .. })
            ));
        }
    }

    #[test]
    fn test_driver_names_are_case_insensitive() -> TestResult {
        let config = MailConfig::from_json(
            r#"{
                "default": { "driver": "SMTP", "options": { "hostname": "smtp.example.com" } },
                "bulk": { "driver": " Sendmail " }
            }"#,
        )?;

        assert_eq!(
            config.group(DEFAULT_GROUP)?,
            &TransportConfig::Smtp(SmtpConfig::new("smtp.example.com"))
        );
        assert_eq!(config.group("bulk")?, &TransportConfig::Sendmail(SendmailConfig::default()));

        Ok(())
    }

    #[test]
    fn test_missing_driver_defaults_to_local() -> TestResult {
        let config = MailConfig::from_json(r#"{ "default": { "options": { "params": "-fme@example.com" } } }"#)?;

        assert_eq!(
            config.group(DEFAULT_GROUP)?,
            &TransportConfig::Local(LocalConfig {
                params: Some("-fme@example.com".into())
            })
        );

        Ok(())
    }

    #[test]
    fn test_unknown_driver_falls_back_to_local() -> TestResult {
        let config = MailConfig::from_json(r#"{ "default": { "driver": "carrier-pigeon" } }"#)?;

        assert_eq!(config.group(DEFAULT_GROUP)?, &TransportConfig::default());

        Ok(())
    }

    #[test]
    fn test_unknown_group() -> TestResult {
        let config = MailConfig::from_json(r#"{ "default": {} }"#)?;

        assert!(matches!(
            config.group("notifications"),
            Err(ConfigError::UnknownGroup(name)) if name == "notifications"
        ));

        Ok(())
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(MailConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{ "default": {{ "driver": "local" }} }}"#)?;

        let config = MailConfig::load(file.path())?;

        assert_eq!(config.group_names().collect::<Vec<_>>(), ["default"]);

        Ok(())
    }

    #[test]
    fn test_secret_is_obfuscated() {
        let secret = Secret::new("hunter2");

        assert_eq!(format!("{}", secret), "********");
        assert_eq!(format!("{:?}", secret), "********");
        assert_eq!(secret.expose(), "hunter2");
    }
}
