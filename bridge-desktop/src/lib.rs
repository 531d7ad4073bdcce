//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `StateStore` using a SQLite key-value table
//! - `AuditLog` using two append-only SQLite tables
//! - `Scheduler` using Tokio tasks
//!
//! The state store and the audit log can share one database file; open a
//! pool with [`db::connect_file`] and hand it to both `with_pool`
//! constructors.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{db, SqliteAuditLog, SqliteStateStore, TokioScheduler};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let pool = db::connect_file("state.db".as_ref()).await?;
//!     let state = SqliteStateStore::with_pool(pool.clone()).await?;
//!     let audit = SqliteAuditLog::with_pool(pool).await?;
//!     let scheduler = TokioScheduler::new();
//!     Ok(())
//! }
//! ```

mod audit_log;
mod background;
pub mod db;
mod http;
mod state_store;

pub use audit_log::SqliteAuditLog;
pub use background::TokioScheduler;
pub use http::ReqwestHttpClient;
pub use state_store::SqliteStateStore;
