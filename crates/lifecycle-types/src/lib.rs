//! Common types module for the order lifecycle system.
//!
//! This module defines the core data types shared by every lifecycle crate:
//! the order entity, its status and event vocabularies, bus notifications,
//! storage namespaces and configuration validation helpers.

/// Lifecycle notifications published after committed transitions.
pub mod events;
/// Order entity, lifecycle statuses and lifecycle events.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage namespaces for persisted collections.
pub mod storage;
/// Small helpers shared across crates.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use events::*;
pub use order::*;
pub use registry::*;
pub use storage::*;
pub use utils::{current_timestamp, truncate_id};
pub use validation::*;
