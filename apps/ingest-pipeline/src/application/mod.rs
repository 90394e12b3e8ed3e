//! Application layer - pipeline stages and port definitions.

/// Port interfaces for external systems.
pub mod ports;

/// Pipeline stage services and the coordinator.
pub mod services;
