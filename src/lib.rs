#![deny(unsafe_code)]
#![warn(missing_docs)]
// Without a client only the codec and typed commands are reachable.
#![cfg_attr(not(any(feature = "blocking", feature = "async")), allow(dead_code))]

//! An IPMI v2.0 (RMCP+) remote console.
//!
//! The crate implements:
//! - the IPMI message envelope codec with both checksums
//! - network function / operation dispatch
//! - RMCP+ Open Session and RAKP 1-4 key exchange (HMAC-SHA1, HMAC-SHA256)
//! - integrity (HMAC-SHA1-96, HMAC-SHA256-128)
//! - confidentiality (AES-CBC-128)
//! - blocking and tokio clients sharing one session across callers
//!
//! Most users only need [`Client`] (or `AsyncClient` with the `async`
//! feature) and the typed commands in [`commands`]. The codec modules are
//! public for tools that build or inspect raw messages.

pub mod algorithm;
pub mod commands;
pub mod confidentiality;
pub mod message;
pub mod operation;
pub mod transport;

mod crypto;
mod error;
mod types;

#[cfg(any(feature = "blocking", feature = "async"))]
mod client;
#[cfg(any(feature = "blocking", feature = "async"))]
mod debug;
#[cfg(any(feature = "blocking", feature = "async"))]
mod observe;
#[cfg(any(feature = "blocking", feature = "async"))]
mod protocol;
#[cfg(any(feature = "blocking", feature = "async"))]
mod session;

#[cfg(all(test, any(feature = "blocking", feature = "async")))]
mod testing;

#[cfg(feature = "blocking")]
pub use crate::client::{AppService, ChassisService, Client, ClientBuilder};
#[cfg(feature = "async")]
pub use crate::client::{AsyncClient, AsyncClientBuilder};
pub use crate::error::{Error, Result};
#[cfg(any(feature = "blocking", feature = "async"))]
pub use crate::session::SessionState;
pub use crate::types::{
    AuthTypes, ChannelAuthCapabilities, ChassisControl, ChassisFlags, ChassisStatus, DeviceId,
    FrontPanelButtons, IdentifyState, IpmiVersion, LastPowerEvent, LoginModes, OemAuth,
    PanelButton, PowerRestorePolicy, PowerState, PrivilegeLevel, RawResponse, SystemGuid,
};
