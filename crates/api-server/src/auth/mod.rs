//! Bearer token authentication.
//!
//! # Components
//!
//! - `claims` - Claims structure for validated tokens
//! - `jwt` - HS256 token validation

pub mod claims;
pub mod jwt;

pub use claims::Claims;
pub use jwt::JwtValidator;
