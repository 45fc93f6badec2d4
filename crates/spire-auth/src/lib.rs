//! # Spire Auth
//!
//! Bearer-token validation for the Spire dispatch framework.
//!
//! [`TokenValidator`] verifies JWT bearer tokens (signature, issuer,
//! audience, expiry with clock-skew leeway), folds their claims into a
//! [`ClaimSet`](spire_core::ClaimSet), and discriminates user from service
//! principals. Every failure mode yields `None`; token validation never
//! errors and never panics.

#![doc(html_root_url = "https://docs.rs/spire-auth/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod validator;

pub use error::{AuthError, AuthResult};
pub use validator::{KeyMaterial, TokenValidator};
