//! Bearer credential management for the upstream recognition service.
//!
//! - `Authenticator` performs the actual credential exchange
//! - `HttpAuthenticator` talks to `POST /v1/authenticate`
//! - `TokenCache` hands out a live credential, refreshing on demand

mod client;
mod token;

pub use client::{AuthResponse, HttpAuthenticator};
pub use token::{Authenticator, Credential, TokenCache};
