//! Core of the order lifecycle service.
//!
//! Orders move through validation, allocation and fulfillment in response to
//! events raised by external collaborators. This crate applies those events
//! against a fixed transition table and commits the resulting status, one
//! dispatch per order at a time.

pub mod builder;
pub mod engine;
pub mod manager;
pub mod state;

pub use builder::{BuilderError, LifecycleBuilder, LifecycleFactories};
pub use engine::{event_bus::EventBus, EngineError, LifecycleEngine};
pub use manager::OrderLifecycleManager;
pub use state::{
	OrderStateMachine, OrderStore, OrderTransaction, PersistingInterceptor,
	StateChangeInterceptor, TracingInterceptor, Transition,
};

use lifecycle_storage::StorageError;
use lifecycle_types::{OrderEvent, OrderStatus};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
	/// The referenced order does not exist.
	#[error("Order not found: {0}")]
	NotFound(Uuid),
	/// The event is not accepted in the order's current status.
	#[error("Event {event} not accepted for order {order_id} in status {status}")]
	InvalidTransition {
		order_id: Uuid,
		status: OrderStatus,
		event: OrderEvent,
	},
	/// An order with this identifier has already been created.
	#[error("Order already exists: {0}")]
	AlreadyExists(Uuid),
	/// The store did not commit; the event is considered not applied.
	#[error("Persistence failure: {0}")]
	PersistenceFailure(String),
}

impl LifecycleError {
	/// Maps a storage error for `order_id` into a lifecycle error.
	pub(crate) fn from_storage(order_id: Uuid, err: StorageError) -> Self {
		match err {
			StorageError::NotFound => LifecycleError::NotFound(order_id),
			other => LifecycleError::PersistenceFailure(other.to_string()),
		}
	}
}
