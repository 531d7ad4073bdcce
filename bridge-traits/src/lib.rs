//! # Host Bridge Traits
//!
//! Capability traits the revocation engine depends on, implemented per host.
//!
//! ## Overview
//!
//! The engine never talks to a storage provider, a database or a timer
//! directly. Each external collaborator is one trait here, and concrete
//! adapters live in `bridge-desktop` (sqlite, reqwest, tokio) and
//! `provider-google-drive` (Drive v3).
//!
//! ## Traits
//!
//! ### Remote
//! - [`HttpClient`](http::HttpClient) - Single-attempt HTTP execution
//! - [`ItemSource`](sharing::ItemSource) - Paginated file/folder listing
//! - [`SharingApi`](sharing::SharingApi) - Per-item sharing inspection and mutation
//!
//! ### Persistence
//! - [`StateStore`](storage::StateStore) - Key-value run state
//! - [`AuditLog`](storage::AuditLog) - Append-only removal and error records
//!
//! ### Platform Integration
//! - [`Scheduler`](background::Scheduler) - Non-overlapping recurring tasks
//! - [`Notifier`](notification::Notifier) - Fire-and-forget completion notice
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! Every trait returns [`BridgeError`](error::BridgeError). Remote adapters
//! must classify failures so that [`BridgeError::is_transient`] is accurate:
//! throttling, 5xx and transport failures are transient, everything else is
//! not.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so implementations can be shared across
//! async tasks behind `Arc`.

pub mod background;
pub mod error;
pub mod http;
pub mod notification;
pub mod sharing;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{Scheduler, TaskHandler, TaskId};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use notification::{Notifier, RunSummary};
pub use sharing::{Grantee, GranteeRole, Item, ItemKind, ItemPage, ItemSource, SharingAccess, SharingApi};
pub use storage::{AuditCounts, AuditLog, ErrorRecord, RemovalRecord, RevocationKind, StateStore};
pub use time::{Clock, SystemClock};
