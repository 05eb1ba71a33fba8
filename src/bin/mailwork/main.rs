#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Command line mailer

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mailwork::{
    domain::mail::{MailConfig, MessageBuilder, TransportConfig, TransportRegistry, DEFAULT_GROUP},
    infrastructure::mail::LettreTransportFactory,
};
use tracing::info;

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
#[clap(about = "Compose a message and send it through a configured transport")]
pub struct Args {
    /// JSON file with the transport groups. Without it the local mail command is used.
    #[clap(long, env = "MAIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// The transport group to send through
    #[clap(long, env = "MAIL_GROUP", default_value = DEFAULT_GROUP)]
    pub group: String,

    /// The from address
    #[clap(long, env = "MAIL_FROM")]
    pub from: String,

    /// Reply-to addresses
    #[clap(long)]
    pub reply_to: Vec<String>,

    /// To addresses
    #[clap(long, required = true)]
    pub to: Vec<String>,

    /// Cc addresses
    #[clap(long)]
    pub cc: Vec<String>,

    /// Bcc addresses
    #[clap(long)]
    pub bcc: Vec<String>,

    /// The subject
    #[clap(long)]
    pub subject: Option<String>,

    /// The plain text body
    #[clap(long, default_value = "")]
    pub body: String,

    /// An HTML alternative to the body
    #[clap(long)]
    pub html: Option<String>,

    /// Files to attach
    #[clap(long)]
    pub attach: Vec<PathBuf>,
}

impl Args {
    fn message(&self) -> Result<MessageBuilder> {
        let mut message = MessageBuilder::create(self.subject.as_deref(), Some(self.body.as_str()), None)?
            .from(self.from.as_str())?
            .reply_to(self.reply_to.clone())?
            .to(self.to.clone())?
            .cc(self.cc.clone())?
            .bcc(self.bcc.clone())?;

        if let Some(html) = &self.html {
            message = message.message(html.as_str(), Some("text/html"))?;
        }

        for path in &self.attach {
            message = message.attach_file(path)?;
        }

        Ok(message)
    }

    fn mail_config(&self) -> Result<MailConfig> {
        Ok(match &self.config {
            Some(path) => MailConfig::load(path)?,
            None => MailConfig::new().with_group(self.group.as_str(), TransportConfig::default()),
        })
    }
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let registry = TransportRegistry::new(args.mail_config()?, LettreTransportFactory);
    let delivery = args.message()?.send(&registry, &args.group).await?;

    info!("sent at {}", delivery.sent_at);

    for address in &delivery.accepted {
        println!("accepted {}", address);
    }

    for address in &delivery.rejected {
        println!("rejected {}", address);
    }

    Ok(())
}
