//! E-mail delivery of compiled books.
//!
//! Kindle personal documents addresses convert attachments when the
//! subject line is `convert`, so every message uses it.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use crate::book::GlobalSettings;
use crate::error::{Error, Result};
use crate::export::Artifact;

pub const SUBJECT: &str = "convert";
pub const BODY: &str = "Sent from JugaadPress";

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Mail account used to send.
#[derive(Debug, Clone)]
pub struct Sender {
    pub email: String,
    pub password: String,
}

impl Sender {
    /// Sender and destination from the user's settings.
    ///
    /// Fails with [`Error::InvalidInput`] when anything is missing.
    pub fn from_settings(settings: &GlobalSettings) -> Result<(Sender, String)> {
        if !settings.is_mail_configured() {
            return Err(Error::InvalidInput(
                "email settings not configured. Please configure in Settings.".into(),
            ));
        }
        let sender = Sender {
            email: settings.sender_email.trim().to_string(),
            password: settings.app_password.clone(),
        };
        Ok((sender, settings.destination_email.trim().to_string()))
    }
}

/// Sends an artifact to an address.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(
        &self,
        sender: &Sender,
        artifact: &Artifact,
        filename: &str,
        destination: &str,
    ) -> Result<()>;
}

/// Build the message: plain-text body plus the artifact as attachment.
pub fn build_message(
    sender: &str,
    artifact: &Artifact,
    filename: &str,
    destination: &str,
) -> Result<Message> {
    let from: Mailbox = sender
        .parse()
        .map_err(|e| Error::InvalidInput(format!("invalid sender address: {e}")))?;
    let to: Mailbox = destination
        .parse()
        .map_err(|e| Error::InvalidInput(format!("invalid destination address: {e}")))?;
    let content_type = ContentType::parse(artifact.content_type())
        .map_err(|e| Error::Mail(format!("invalid content type: {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(SUBJECT)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(BODY.to_string()))
                .singlepart(
                    Attachment::new(filename.to_string()).body(artifact.data.clone(), content_type),
                ),
        )
        .map_err(|e| Error::Mail(e.to_string()))
}

/// SMTP over implicit TLS.
#[derive(Debug, Clone)]
pub struct SmtpDelivery {
    host: String,
    port: u16,
}

impl SmtpDelivery {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for SmtpDelivery {
    fn default() -> Self {
        Self::new(DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT)
    }
}

#[async_trait]
impl Delivery for SmtpDelivery {
    async fn deliver(
        &self,
        sender: &Sender,
        artifact: &Artifact,
        filename: &str,
        destination: &str,
    ) -> Result<()> {
        let message = build_message(&sender.email, artifact, filename, destination)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
            .map_err(|e| Error::Mail(e.to_string()))?
            .port(self.port)
            .credentials(Credentials::new(
                sender.email.clone(),
                sender.password.clone(),
            ))
            .build();

        match transport.send(message).await {
            Ok(_) => {
                info!("Sent {} to {}", filename, destination);
                Ok(())
            }
            Err(e) => {
                error!("SMTP delivery to {} failed: {}", destination, e);
                Err(Error::Mail(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::Format;

    fn artifact() -> Artifact {
        Artifact {
            format: Format::Epub,
            data: b"PK\x03\x04epub".to_vec(),
        }
    }

    #[test]
    fn test_message_shape() {
        let message =
            build_message("me@example.com", &artifact(), "Notes.epub", "me@kindle.com").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: convert"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("Sent from JugaadPress"));
        assert!(raw.contains("application/epub+zip"));
        assert!(raw.contains("Notes.epub"));
    }

    #[test]
    fn test_bad_address() {
        assert!(matches!(
            build_message("not an address", &artifact(), "a.epub", "me@kindle.com"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sender_from_settings() {
        let mut settings = GlobalSettings {
            sender_email: " me@example.com ".into(),
            app_password: "abcd efgh".into(),
            destination_email: "me@kindle.com".into(),
        };
        let (sender, destination) = Sender::from_settings(&settings).unwrap();
        assert_eq!(sender.email, "me@example.com");
        assert_eq!(destination, "me@kindle.com");

        settings.destination_email.clear();
        assert!(matches!(
            Sender::from_settings(&settings),
            Err(Error::InvalidInput(_))
        ));
    }
}
