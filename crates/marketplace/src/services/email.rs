//! Transactional email: password reset codes and welcome messages.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and plain-text templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetEmailHtml<'a> {
    name: &'a str,
    code: &'a str,
    expires_minutes: i64,
    base_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetEmailText<'a> {
    name: &'a str,
    code: &'a str,
    expires_minutes: i64,
    base_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    name: &'a str,
    is_seller: bool,
    base_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    name: &'a str,
    is_seller: bool,
    base_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    base_url: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, base_url: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send a password reset code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        code: &str,
        expires_minutes: i64,
    ) -> Result<(), EmailError> {
        let base_url = self.base_url.as_str();
        let html = PasswordResetEmailHtml {
            name,
            code,
            expires_minutes,
            base_url,
        }
        .render()?;
        let text = PasswordResetEmailText {
            name,
            code,
            expires_minutes,
            base_url,
        }
        .render()?;

        self.send_multipart_email(to, "Your Harvest Market password reset code", &text, &html)
            .await
    }

    /// Send a welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_welcome(&self, to: &str, name: &str, is_seller: bool) -> Result<(), EmailError> {
        let base_url = self.base_url.as_str();
        let html = WelcomeEmailHtml {
            name,
            is_seller,
            base_url,
        }
        .render()?;
        let text = WelcomeEmailText {
            name,
            is_seller,
            base_url,
        }
        .render()?;

        self.send_multipart_email(to, "Welcome to Harvest Market", &text, &html)
            .await
    }

    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(subject = %subject, "Email sent");
        Ok(())
    }
}

/// Generate a 6-digit one-time code.
#[must_use]
pub fn generate_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..1_000_000).contains(&n));
        }
    }

    #[test]
    fn test_password_reset_templates_render_code() {
        let text = PasswordResetEmailText {
            name: "Ada",
            code: "493021",
            expires_minutes: 15,
            base_url: "https://harvest.example",
        }
        .render()
        .unwrap();
        assert!(text.contains("493021"));
        assert!(text.contains("15 minutes"));

        let html = PasswordResetEmailHtml {
            name: "<b>Ada</b>",
            code: "493021",
            expires_minutes: 15,
            base_url: "https://harvest.example",
        }
        .render()
        .unwrap();
        assert!(html.contains("493021"));
        assert!(!html.contains("<b>Ada</b>"));
    }

    #[test]
    fn test_welcome_mentions_store_for_sellers() {
        let seller = WelcomeEmailText {
            name: "Ada",
            is_seller: true,
            base_url: "https://harvest.example",
        }
        .render()
        .unwrap();
        assert!(seller.contains("seller dashboard"));

        let buyer = WelcomeEmailText {
            name: "Ada",
            is_seller: false,
            base_url: "https://harvest.example",
        }
        .render()
        .unwrap();
        assert!(!buyer.contains("seller dashboard"));
    }
}
