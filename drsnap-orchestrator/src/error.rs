use std::path::PathBuf;

use drsnap_core::SnapError;
use drsnap_provider::ProviderError;
use thiserror::Error;

use crate::outcome::RunPhase;

pub type Result<T> = std::result::Result<T, RunError>;

/// Errors that abort a whole run before any snapshot is attempted, plus
/// failures of the audit trail itself. Per-VM problems are never raised;
/// they end up in the run outcome.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Invalid run parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to retrieve user ID from the provider CLI. Ensure you are logged in with 'az login'.")]
    NoIdentity(#[source] ProviderError),

    #[error("Inventory file '{}' could not be read", path.display())]
    InventoryUnreadable {
        path: PathBuf,
        #[source]
        source: SnapError,
    },

    #[error("Host list file '{}' could not be read", path.display())]
    HostListUnreadable {
        path: PathBuf,
        #[source]
        source: SnapError,
    },

    #[error("No valid VM information found")]
    NoVmsResolved,

    #[error("Audit trail error: {0}")]
    Audit(#[from] SnapError),
}

impl RunError {
    /// Phase whose failure this error represents, for the state-machine
    /// terminal errors only.
    pub fn phase(&self) -> Option<RunPhase> {
        match self {
            Self::NoIdentity(_) => Some(RunPhase::Authenticating),
            Self::InventoryUnreadable { .. }
            | Self::HostListUnreadable { .. }
            | Self::NoVmsResolved => Some(RunPhase::ResolvingInventory),
            Self::InvalidParams(_) | Self::Audit(_) => None,
        }
    }
}
