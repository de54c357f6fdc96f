//! Client authentication
//!
//! Extracts Basic credentials from `Authorization` and `Proxy-Authorization`
//! and checks them against the configured credential.

pub mod authenticator;
pub mod credentials;

pub use authenticator::{Authenticator, Decision};
pub use credentials::{Candidates, Credential, CredentialExtractor};
