//! # API Test Utilities
//!
//! Shared test utilities for the API server.
//!
//! This crate provides:
//! - Server test harness (`TestApiServer` for E2E tests)
//! - Bearer token minting for authenticated requests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use api_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestApiServer::spawn().await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/userprofile/get", server.url()))
//!         .bearer_auth(TestApiServer::token_for("3f1c0e2a-8a57-4c1b-9d7e-2b6b9d1f0a11"))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
