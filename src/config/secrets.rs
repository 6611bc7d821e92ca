//! Secret handling utilities.
//!
//! Re-exports secrecy types used for sink credentials.

pub use secrecy::{ExposeSecret, SecretString};
