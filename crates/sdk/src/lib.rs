//! # xbridge SDK
//!
//! Async client for the subset of the X (Twitter) REST API that the xbridge
//! tool server exposes.
//!
//! Requests are signed with OAuth 1.0a when user credentials are present and
//! with an app bearer token otherwise. Each request is attempted exactly
//! once; every reply and every error carries the `x-rate-limit-*` headers so
//! callers can keep their own budget.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xbridge_sdk::{XClient, XResult};
//! use xbridge_core::CredentialBundle;
//!
//! #[tokio::main]
//! async fn main() -> XResult<()> {
//!     let client = XClient::builder()
//!         .credentials(CredentialBundle::from_env())
//!         .build()?;
//!
//!     let user = client.users().by_username("jack").await?;
//!     println!("{} has id {}", user.data.username.unwrap_or_default(), user.data.id);
//!     println!("{:?} calls left in this window", user.rate_limit.remaining);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod oauth;
pub mod transport;
pub mod types;

pub use client::{XClient, XClientBuilder};
pub use config::ClientConfig;
pub use error::{XError, XResult};
pub use transport::{Auth, Reply};
