//! Core infrastructure for tower-mesh.
//!
//! This crate provides what every mesh component shares:
//! - Event system for observability ([`events`])
//! - The request-path error taxonomy ([`MeshError`], [`BackendError`])

pub mod error;
pub mod events;

pub use error::{BackendError, MeshError};
pub use events::{EventListener, EventListeners, MeshEvent};
