use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevokeError {
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid resume cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid run phase: {0}")]
    InvalidPhase(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The account could not be reached before the run touched any state.
    #[error("Preflight check failed: {0}")]
    Preflight(String),

    /// The run cannot go on without outside help, e.g. a new credential.
    /// Progress up to the last finished item is kept.
    #[error("Run halted: {0}")]
    Halted(String),

    /// Another process holds the run lease.
    #[error("Run is locked by another process: {0}")]
    RunLocked(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Stored value for {key} is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

impl RevokeError {
    /// Whether every later remote call is bound to fail the same way.
    pub fn is_fatal(&self) -> bool {
        match self {
            RevokeError::Bridge(e) => e.is_fatal(),
            RevokeError::Halted(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RevokeError>;
