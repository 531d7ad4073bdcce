//! Ambient services shared by the revoke crates.
//!
//! - [`config`]: validated run settings (`RevokeConfig`)
//! - [`events`]: broadcast bus for run progress
//! - [`logging`]: subscriber setup and redaction
//! - [`notify`]: completion notifier that writes to the log
//!
//! Nothing here knows how a permission is removed; that lives in `core-revoke`.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod notify;

pub use error::{Error, Result};
