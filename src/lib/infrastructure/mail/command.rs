//! Delivery through a sendmail compatible program

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, warn};

use crate::domain::mail::{Delivery, DeliveryError, Message};

use super::lettre_message;

/// The system mail command
pub const DEFAULT_PROGRAM: &str = "/usr/sbin/sendmail";

/// A sendmail compatible program and the arguments it is always given.
///
/// The message is written to the program's stdin and the envelope is passed
/// on the command line as `<program> -i <args> -f <sender> -- <recipients>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct MailCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl MailCommand {
    pub(super) fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a command line on whitespace. An empty line runs the system
    /// mail command.
    pub(super) fn parse(command_line: &str) -> Self {
        let mut words = command_line.split_whitespace().map(str::to_string);

        match words.next() {
            Some(program) => Self::new(program, words.collect()),
            None => Self::new(DEFAULT_PROGRAM, Vec::new()),
        }
    }

    pub(super) fn program(&self) -> &Path {
        &self.program
    }

    pub(super) fn args(&self) -> &[String] {
        &self.args
    }

    pub(super) fn arguments(&self, message: &Message) -> Vec<String> {
        let mut args = vec!["-i".to_string()];
        args.extend(self.args.iter().cloned());

        // A sender given in the arguments wins over the envelope sender.
        if !self.args.iter().any(|a| a.starts_with("-f")) {
            if let Some(sender) = message.envelope_sender() {
                args.push("-f".to_string());
                args.push(sender.to_string());
            }
        }

        args.push("--".to_string());
        args.extend(message.envelope_recipients().iter().map(ToString::to_string));

        args
    }

    /// Runs the program with the rendered message on stdin. A non-zero exit
    /// status fails the delivery for every recipient.
    pub(super) async fn run(&self, transport: &'static str, message: &Message) -> Result<Delivery, DeliveryError> {
        let raw = lettre_message::build(message, transport)?.formatted();
        let args = self.arguments(message);

        debug!("running {} {}", self.program.display(), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DeliveryError::new(transport, format!("could not run {}", self.program.display()))
                    .with_rejected(message.envelope_recipients())
                    .with_source(e)
            })?;

        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&raw).await,
            None => Ok(()),
        };

        let output = child.wait_with_output().await.map_err(|e| {
            DeliveryError::new(transport, format!("{} did not finish", self.program.display()))
                .with_rejected(message.envelope_recipients())
                .with_source(e)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("{} failed with {}: {}", self.program.display(), output.status, stderr);

            return Err(DeliveryError::new(
                transport,
                format!("{} exited with {}", self.program.display(), output.status),
            )
            .with_code(output.status.code())
            .with_rejected(message.envelope_recipients())
            .with_source(anyhow::anyhow!(stderr)));
        }

        written.map_err(|e| {
            DeliveryError::new(transport, "could not write message")
                .with_rejected(message.envelope_recipients())
                .with_source(e)
        })?;

        Ok(Delivery::accepted(message.envelope_recipients()))
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::domain::mail::MessageBuilder;

    use super::*;

    fn message() -> TestResult<MessageBuilder> {
        Ok(MessageBuilder::create(Some("Hello"), Some("Hi"), None)?
            .to(vec!["a@example.com", "b@example.com"])?
            .from("from@example.com")?)
    }

    #[test]
    fn test_parse_keeps_arguments() {
        let command = MailCommand::parse("  /usr/lib/sendmail   -odb -oem ");

        assert_eq!(command.program(), Path::new("/usr/lib/sendmail"));
        assert_eq!(command.args(), ["-odb", "-oem"]);
    }

    #[test]
    fn test_parse_empty_line_uses_system_command() {
        assert_eq!(MailCommand::parse("   "), MailCommand::new(DEFAULT_PROGRAM, Vec::new()));
    }

    #[test]
    fn test_arguments_include_envelope() -> TestResult {
        let command = MailCommand::new("sendmail", vec!["-oi".into(), "-odb".into()]);

        let args = command.arguments(message()?.as_message());

        assert_eq!(
            args,
            [
                "-i",
                "-oi",
                "-odb",
                "-f",
                "from@example.com",
                "--",
                "a@example.com",
                "b@example.com"
            ]
        );

        Ok(())
    }

    #[test]
    fn test_sender_argument_replaces_envelope_sender() -> TestResult {
        let command = MailCommand::parse("sendmail -fwebmaster@example.com");

        let args = command.arguments(message()?.as_message());

        assert_eq!(args[1], "-fwebmaster@example.com");
        assert!(!args.contains(&"-f".to_string()));

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_program_is_a_delivery_error() -> TestResult {
        let command = MailCommand::new("/definitely/not/a/mailer", Vec::new());

        let result = command.run("test", message()?.as_message()).await;

        assert!(matches!(result, Err(ref e) if e.rejected().len() == 2 && e.transport() == "test"));

        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_program_reports_exit_status() -> TestResult {
        let command = MailCommand::new("false", Vec::new());

        let result = command.run("test", message()?.as_message()).await;

        match result {
            Err(err) => assert_eq!(err.code(), Some(1)),
            Ok(delivery) => panic!("expected a delivery error, got {:?}", delivery),
        }

        Ok(())
    }
}
