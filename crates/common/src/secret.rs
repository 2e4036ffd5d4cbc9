//! Secret types for values that must never reach a log line.
//!
//! Re-exports the [`secrecy`] wrappers. `SecretString` implements `Debug`
//! with redaction, so a config struct that derives `Debug` stays safe to log
//! even when it carries the JWT signing secret or the SMTP password.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SmtpSettings {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let settings = SmtpSettings {
//!     username: "mailer".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! let rendered = format!("{settings:?}");
//! assert!(!rendered.contains("hunter2"));
//!
//! // Reading the value is always explicit.
//! assert_eq!(settings.password.expose_secret(), "hunter2");
//! ```
//!
//! Use `SecretString` for:
//! - The HS256 token signing secret
//! - SMTP credentials
//! - Database URLs that embed passwords

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("jwt-signing-secret");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("jwt-signing-secret"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("smtp-password");
        assert_eq!(secret.expose_secret(), "smtp-password");
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct SmtpSettings {
            server: String,
            password: SecretString,
        }

        let settings = SmtpSettings {
            server: "smtp.example.com".to_string(),
            password: SecretString::from("super-secret"),
        };

        let debug_str = format!("{settings:?}");

        assert!(debug_str.contains("smtp.example.com"));
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("super-secret"));
    }

    #[test]
    fn test_deserialize() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct SigningConfig {
            issuer: String,
            secret: SecretString,
        }

        let json = r#"{"issuer": "api", "secret": "my-secret-value"}"#;
        let config: SigningConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(config.secret.expose_secret(), "my-secret-value");

        let debug = format!("{config:?}");
        assert!(!debug.contains("my-secret-value"));
        assert!(debug.contains("REDACTED"));
    }
}
