use crate::notify::Notifier;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Connection and addressing details for [`SmtpNotifier`]
#[derive(Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub sender: String,
    pub password: String,
    pub recipient: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("password", &"[REDACTED]")
            .field("recipient", &self.recipient)
            .finish()
    }
}

/// Sends publication notices over SMTP with STARTTLS
pub struct SmtpNotifier {
    settings: SmtpSettings,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    /// Addresses are parsed up front so a bad address fails at startup
    pub fn new(settings: SmtpSettings) -> Result<Self> {
        let from = parse_mailbox(&settings.sender, "sender")?;
        let to = parse_mailbox(&settings.recipient, "recipient")?;

        if settings.server.trim().is_empty() {
            return Err(AppError::Configuration("SMTP server is empty".to_string()));
        }

        Ok(Self { settings, from, to })
    }

    /// Build the message: subject is the title, body is the URL
    fn message(&self, title: &str, url: &str) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(title)
            .header(ContentType::TEXT_PLAIN)
            .body(format!("{}\n", url))
            .map_err(|e| AppError::Notify(format!("failed to build email: {}", e)))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, title: &str, url: &str) -> Result<()> {
        tracing::info!(
            server = %self.settings.server,
            port = self.settings.port,
            recipient = %self.settings.recipient,
            subject = %title,
            "sending_email"
        );

        let email = self.message(title, url)?;
        let credentials = Credentials::new(
            self.settings.sender.clone(),
            self.settings.password.clone(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.server)
            .map_err(|e| AppError::Notify(format!("SMTP relay error: {}", e)))?
            .port(self.settings.port)
            .credentials(credentials)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| AppError::Notify(format!("SMTP send error: {}", e)))?;

        tracing::info!("email_sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str, role: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse()
        .map_err(|e| AppError::Configuration(format!("invalid {} address '{}': {}", role, address, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            server: "smtp.example.com".to_string(),
            port: 587,
            sender: "bot@example.com".to_string(),
            password: "secret".to_string(),
            recipient: "reader@example.com".to_string(),
        }
    }

    #[test]
    fn test_message_subject_and_body() {
        let notifier = SmtpNotifier::new(settings()).unwrap();
        let message = notifier
            .message("Forth Report", "https://telegra.ph/Forth-01-01")
            .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Forth Report"));
        assert!(raw.contains("To: reader@example.com"));
        assert!(raw.contains("https://telegra.ph/Forth-01-01"));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut bad = settings();
        bad.recipient = "not an address".to_string();
        assert!(matches!(SmtpNotifier::new(bad), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", settings());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
