//! Error types for the registry.

use thiserror::Error;
use tower_mesh_core::MeshError;

/// Errors returned by [`ServiceRegistry`](crate::ServiceRegistry) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No instance with this id is registered.
    #[error("unknown instance '{id}'")]
    UnknownInstance {
        /// The id that was looked up.
        id: String,
    },
}

impl From<RegistryError> for MeshError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownInstance { id } => MeshError::UnknownInstance { id },
        }
    }
}
