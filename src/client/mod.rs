//! Request/response clients over an established session.
//!
//! Both clients share [`core::ClientCore`] for request sequencing and
//! response matching; they differ only in how callers wait.

#[cfg(feature = "blocking")]
pub(crate) mod blocking;

pub(crate) mod config;
pub(crate) mod core;

#[cfg(feature = "async")]
pub(crate) mod tokio;

#[cfg(feature = "blocking")]
pub use blocking::{AppService, ChassisService, Client, ClientBuilder};

#[cfg(feature = "async")]
pub use self::tokio::{AsyncClient, AsyncClientBuilder};
