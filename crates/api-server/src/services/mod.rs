//! Service layer.
//!
//! # Components
//!
//! - `email` - Outgoing email seam and its implementations

pub mod email;

pub use email::mock::MockEmailSender;
pub use email::{build_test_email, EmailAddress, EmailMessage, EmailSender, TracingEmailSender};
