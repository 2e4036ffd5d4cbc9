//! Outgoing email.
//!
//! Handlers build an [`EmailMessage`] and hand it to an [`EmailSender`].
//! [`TracingEmailSender`] records the send in the logs without contacting a
//! mail server; [`mock::MockEmailSender`] captures messages for tests.

use crate::config::EmailConfig;
use crate::errors::ApiError;
use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

/// Template every API-originated email is forced onto.
pub const TEST_TEMPLATE: &str = "Test";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    pub name: String,
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    pub body: String,
}

/// Build the fixed test-template email for one recipient.
pub fn build_test_email(from: EmailAddress, to: EmailAddress) -> EmailMessage {
    let body = format!(
        "Hello {},\n\nThis is a test email sent from the API.\n\nRegards,\n{}",
        to.name, from.name
    );

    EmailMessage {
        from,
        to: vec![to],
        subject: "Test Email".to_string(),
        body,
    }
}

/// Email delivery seam.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be handed off.
    async fn send(&self, message: &EmailMessage) -> Result<(), ApiError>;

    /// Sender identity used in the From header.
    fn sender(&self) -> EmailAddress;
}

/// Sender that only logs.
#[derive(Debug, Clone)]
pub struct TracingEmailSender {
    from: EmailAddress,
}

impl TracingEmailSender {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            from: EmailAddress::new(&config.from_name, &config.from_address),
        }
    }
}

#[async_trait]
impl EmailSender for TracingEmailSender {
    #[instrument(skip_all, name = "api.email.send")]
    async fn send(&self, message: &EmailMessage) -> Result<(), ApiError> {
        // Recipient addresses are not logged
        tracing::info!(
            target: "api.email",
            subject = %message.subject,
            recipients = message.to.len(),
            "Email handed off"
        );
        Ok(())
    }

    fn sender(&self) -> EmailAddress {
        self.from.clone()
    }
}

/// Mock email sender module for testing.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Captures sent messages; optionally fails every send.
    #[derive(Debug, Default)]
    pub struct MockEmailSender {
        sent: Mutex<Vec<EmailMessage>>,
        return_error: bool,
    }

    impl MockEmailSender {
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a mock whose every send fails.
        pub fn failing() -> Self {
            Self {
                sent: Mutex::default(),
                return_error: true,
            }
        }

        /// Messages sent so far.
        pub fn sent(&self) -> Vec<EmailMessage> {
            self.sent
                .lock()
                .map(|sent| sent.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl EmailSender for MockEmailSender {
        async fn send(&self, message: &EmailMessage) -> Result<(), ApiError> {
            if self.return_error {
                return Err(ApiError::Internal(anyhow::anyhow!("mock mail server unavailable")));
            }

            self.sent
                .lock()
                .map_err(|_| ApiError::Internal(anyhow::anyhow!("mock sender lock poisoned")))?
                .push(message.clone());
            Ok(())
        }

        fn sender(&self) -> EmailAddress {
            EmailAddress::new("API Tests", "noreply@example.com")
        }
    }
}
