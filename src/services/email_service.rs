use crate::config::app::{SmtpEncryption, SmtpSettings};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Delivers verification links. Rendering the message is the notifier's job;
/// callers only hand over the address and the finished link.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification(&self, to_email: &str, verification_link: &str)
        -> Result<(), EmailError>;
}

/// Writes the link to the log instead of sending mail. Used when SMTP is not
/// configured.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_verification(
        &self,
        to_email: &str,
        verification_link: &str,
    ) -> Result<(), EmailError> {
        tracing::info!("📧 [LOG EMAIL] Verification email to: {}", to_email);
        tracing::info!("   Subject: DoGether email verification");
        tracing::info!("   Verification link: {}", verification_link);
        Ok(())
    }
}

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, EmailError> {
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());

        let mailer = match settings.encryption {
            SmtpEncryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP relay error: {}", e)))?
                .port(settings.port)
                .credentials(credentials)
                .build(),
            SmtpEncryption::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                    .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
                    .port(settings.port)
                    .credentials(credentials)
                    .build()
            }
            SmtpEncryption::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                    .port(settings.port)
                    .credentials(credentials)
                    .build()
            }
        };

        Ok(Self {
            mailer,
            from_email: settings.from_email.clone(),
            from_name: settings.from_name.clone(),
        })
    }
}

pub fn render_verification_email(verification_link: &str) -> String {
    format!(
        r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px; color: #333;">
    <h1 style="color: #667eea;">DoGether</h1>
    <p>Thank you for signing up. Please verify your email address by clicking the button below:</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{link}" style="background-color: #667eea; color: white; padding: 15px 30px; text-decoration: none; border-radius: 5px; display: inline-block;">Verify Email Address</a>
    </p>
    <p style="color: #666; font-size: 14px;">Or copy and paste this link into your browser:</p>
    <p style="color: #666; font-size: 14px; word-break: break-all;">{link}</p>
    <p style="color: #999; font-size: 12px; margin-top: 40px;">This link will expire in 24 hours. If you did not request it, you can ignore this email.</p>
</body>
</html>
"#,
        link = verification_link
    )
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_verification(
        &self,
        to_email: &str,
        verification_link: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_email)
                    .parse()
                    .map_err(|e| {
                        EmailError::MessageBuild(format!("Invalid from address: {}", e))
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?)
            .subject("DoGether email verification")
            .header(ContentType::TEXT_HTML)
            .body(render_verification_email(verification_link))
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

pub fn create_notifier(smtp: Option<&SmtpSettings>) -> Arc<dyn Notifier> {
    match smtp {
        Some(settings) => match SmtpNotifier::new(settings) {
            Ok(notifier) => {
                tracing::info!("Using SMTP notifier via {}", settings.host);
                Arc::new(notifier)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SMTP notifier: {}. Falling back to logging notifier",
                    e
                );
                Arc::new(LoggingNotifier)
            }
        },
        None => {
            tracing::info!(
                "SMTP not configured. Using logging notifier (links will be written to the log)"
            );
            Arc::new(LoggingNotifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_notifier_always_succeeds() {
        let notifier = LoggingNotifier;
        let result = notifier
            .send_verification("a@x.com", "http://localhost:3000/verify-email?token=abc")
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn template_embeds_link_twice() {
        let link = "https://dogether.example/verify-email?token=abc.def.ghi";
        let body = render_verification_email(link);
        assert_eq!(body.matches(link).count(), 2);
    }

    #[tokio::test]
    async fn unconfigured_smtp_falls_back_to_logging() {
        let notifier = create_notifier(None);
        assert!(notifier
            .send_verification("a@x.com", "http://localhost/verify-email?token=t")
            .await
            .is_ok());
    }
}
