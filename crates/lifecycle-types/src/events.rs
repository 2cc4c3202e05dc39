//! Event types for in-process observers of the order lifecycle.
//!
//! Notifications flow through an event bus after a transition has been
//! committed, allowing collaborators to react to status changes without the
//! lifecycle core pushing anything to them directly.

use crate::{Order, OrderEvent, OrderStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Main event type published on the lifecycle event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
	/// A new order has been persisted.
	OrderCreated { order_id: Uuid },
	/// An event was applied and the resulting status committed.
	StatusChanged {
		order_id: Uuid,
		from: OrderStatus,
		to: OrderStatus,
		event: OrderEvent,
	},
}

/// Work item delivered to the lifecycle engine by an external collaborator.
///
/// Serialized with a `type` tag so feeds can carry one JSON object per line:
/// `{"type":"transition","order_id":"…","event":"VALIDATION_PASSED"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
	/// Persist a new order and submit it for validation.
	Create { order: Order },
	/// Apply a lifecycle event to an existing order.
	Transition { order_id: Uuid, event: OrderEvent },
}

impl InboundEvent {
	/// Identifier of the order this work item targets.
	pub fn order_id(&self) -> Uuid {
		match self {
			InboundEvent::Create { order } => order.id,
			InboundEvent::Transition { order_id, .. } => *order_id,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn inbound_id() -> Uuid {
		"67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap()
	}

	#[test]
	fn test_inbound_transition_from_json_line() {
		let line = r#"{"type":"transition","order_id":"67e55044-10b1-426f-9247-bb680e5fe0c8","event":"ALLOCATION_NO_INVENTORY"}"#;
		let inbound: InboundEvent = serde_json::from_str(line).unwrap();
		assert_eq!(
			inbound,
			InboundEvent::Transition {
				order_id: "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap(),
				event: OrderEvent::AllocationNoInventory,
			}
		);
	}

	#[test]
	fn test_inbound_create_accepts_sparse_order() {
		let line = r#"{"type":"create","order":{"id":"67e55044-10b1-426f-9247-bb680e5fe0c8","status":"NEW","customer_ref":"PO-7"}}"#;
		let inbound = serde_json::from_str::<InboundEvent>(line).unwrap();
		assert_eq!(inbound.order_id(), inbound_id());
		match inbound {
			InboundEvent::Create { order } => {
				assert_eq!(order.customer_ref.as_deref(), Some("PO-7"));
				assert_eq!(order.status, OrderStatus::New);
				assert_eq!(order.id, inbound_id());
			},
			other => panic!("unexpected inbound event: {:?}", other),
		}
	}

	#[test]
	fn test_unknown_event_name_rejected() {
		let line = r#"{"type":"transition","order_id":"67e55044-10b1-426f-9247-bb680e5fe0c8","event":"SHIP"}"#;
		assert!(serde_json::from_str::<InboundEvent>(line).is_err());
	}
}
