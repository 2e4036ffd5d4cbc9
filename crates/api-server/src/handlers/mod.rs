//! HTTP request handlers.

pub mod email;
pub mod health;
pub mod metrics;
pub mod user_profile;

pub use email::send_email;
pub use health::health_check;
pub use metrics::metrics_handler;
pub use user_profile::get_user_profile;
