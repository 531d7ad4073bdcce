//! # Google Drive Provider
//!
//! Implements `ItemSource` and `SharingApi` for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated listing of files and folders across My Drive and shared drives
//! - Permission inspection (link sharing, editors, viewers) excluding the owner
//! - Permission deletion, treating an already-removed permission as success
//! - Status classification so throttling and 5xx responses read as transient
//!
//! Authentication is out of scope: the connector is handed an issued OAuth
//! access token.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};
