//! Order types for the lifecycle system.
//!
//! This module defines the order entity tracked through validation, allocation
//! and fulfillment, together with the finite vocabularies of statuses an order
//! can be in and events that move it between them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::current_timestamp;

/// A purchase order tracked by the lifecycle manager.
///
/// Only `status`, the timestamps and `version` are touched by the lifecycle
/// core. The remaining payload is carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: Uuid,
	/// Current lifecycle status of the order.
	pub status: OrderStatus,
	/// Customer supplied reference, e.g. a purchase order number.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer_ref: Option<String>,
	/// Identifier of the customer placing the order.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub customer_id: Option<Uuid>,
	/// Ordered line items.
	#[serde(default)]
	pub lines: Vec<OrderLine>,
	/// Timestamp when this order was first persisted.
	#[serde(default)]
	pub created_at: u64,
	/// Timestamp of the last persisted change.
	#[serde(default)]
	pub updated_at: u64,
	/// Incremented on every persisted write.
	#[serde(default)]
	pub version: u64,
}

impl Order {
	/// Creates a fresh order in status `NEW` with a random identifier.
	pub fn new(customer_ref: Option<String>, lines: Vec<OrderLine>) -> Self {
		let now = current_timestamp();
		Self {
			id: Uuid::new_v4(),
			status: OrderStatus::New,
			customer_ref,
			customer_id: None,
			lines,
			created_at: now,
			updated_at: now,
			version: 0,
		}
	}
}

/// A single line item of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
	/// Unique identifier of the line.
	pub id: Uuid,
	/// Product code being ordered.
	pub upc: String,
	/// Quantity requested by the customer.
	pub quantity_ordered: u32,
	/// Quantity reserved by the allocation service.
	#[serde(default)]
	pub quantity_allocated: u32,
}

impl OrderLine {
	pub fn new(upc: impl Into<String>, quantity_ordered: u32) -> Self {
		Self {
			id: Uuid::new_v4(),
			upc: upc.into(),
			quantity_ordered,
			quantity_allocated: 0,
		}
	}
}

/// Status of an order in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
	/// Order has been persisted but not yet submitted for validation.
	New,
	/// Validation has been requested.
	ValidationPending,
	/// Order passed validation.
	Validated,
	/// Order failed validation.
	ValidationException,
	/// Allocation has been requested.
	AllocationPending,
	/// Inventory has been reserved for every line.
	Allocated,
	/// Allocation is waiting on inventory.
	PendingInventory,
	/// Allocation failed.
	AllocationException,
	/// Customer picked up the order.
	PickedUp,
	/// Order was cancelled.
	Cancelled,
	/// Order was delivered.
	Delivered,
}

impl OrderStatus {
	/// Returns the canonical upper snake case name.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::New => "NEW",
			OrderStatus::ValidationPending => "VALIDATION_PENDING",
			OrderStatus::Validated => "VALIDATED",
			OrderStatus::ValidationException => "VALIDATION_EXCEPTION",
			OrderStatus::AllocationPending => "ALLOCATION_PENDING",
			OrderStatus::Allocated => "ALLOCATED",
			OrderStatus::PendingInventory => "PENDING_INVENTORY",
			OrderStatus::AllocationException => "ALLOCATION_EXCEPTION",
			OrderStatus::PickedUp => "PICKED_UP",
			OrderStatus::Cancelled => "CANCELLED",
			OrderStatus::Delivered => "DELIVERED",
		}
	}

	/// Returns an iterator over all status variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::New,
			Self::ValidationPending,
			Self::Validated,
			Self::ValidationException,
			Self::AllocationPending,
			Self::Allocated,
			Self::PendingInventory,
			Self::AllocationException,
			Self::PickedUp,
			Self::Cancelled,
			Self::Delivered,
		]
		.into_iter()
	}

	/// Whether no further happy-path progress is expected from this status.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			OrderStatus::Cancelled
				| OrderStatus::Delivered
				| OrderStatus::ValidationException
				| OrderStatus::AllocationException
		)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = ParseLifecycleError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| ParseLifecycleError::UnknownStatus(s.to_string()))
	}
}

/// External trigger that drives an order between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
	ValidateOrder,
	ValidationPassed,
	ValidationFailed,
	AllocateOrder,
	AllocationSuccess,
	AllocationNoInventory,
	AllocationFailed,
	BeerOrderPickedUp,
	CancelOrder,
}

impl OrderEvent {
	/// Returns the canonical upper snake case name.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderEvent::ValidateOrder => "VALIDATE_ORDER",
			OrderEvent::ValidationPassed => "VALIDATION_PASSED",
			OrderEvent::ValidationFailed => "VALIDATION_FAILED",
			OrderEvent::AllocateOrder => "ALLOCATE_ORDER",
			OrderEvent::AllocationSuccess => "ALLOCATION_SUCCESS",
			OrderEvent::AllocationNoInventory => "ALLOCATION_NO_INVENTORY",
			OrderEvent::AllocationFailed => "ALLOCATION_FAILED",
			OrderEvent::BeerOrderPickedUp => "BEER_ORDER_PICKED_UP",
			OrderEvent::CancelOrder => "CANCEL_ORDER",
		}
	}

	/// Returns an iterator over all event variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::ValidateOrder,
			Self::ValidationPassed,
			Self::ValidationFailed,
			Self::AllocateOrder,
			Self::AllocationSuccess,
			Self::AllocationNoInventory,
			Self::AllocationFailed,
			Self::BeerOrderPickedUp,
			Self::CancelOrder,
		]
		.into_iter()
	}
}

impl fmt::Display for OrderEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderEvent {
	type Err = ParseLifecycleError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|event| event.as_str() == s)
			.ok_or_else(|| ParseLifecycleError::UnknownEvent(s.to_string()))
	}
}

/// Errors raised when parsing status or event names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseLifecycleError {
	#[error("Unknown order status: {0}")]
	UnknownStatus(String),
	#[error("Unknown order event: {0}")]
	UnknownEvent(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_names_round_trip_through_from_str() {
		for status in OrderStatus::all() {
			assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
		}
		assert_eq!(
			"SHIPPED".parse::<OrderStatus>(),
			Err(ParseLifecycleError::UnknownStatus("SHIPPED".into()))
		);
	}

	#[test]
	fn test_serde_uses_upper_snake_case() {
		let json = serde_json::to_string(&OrderEvent::BeerOrderPickedUp).unwrap();
		assert_eq!(json, "\"BEER_ORDER_PICKED_UP\"");

		let status: OrderStatus = serde_json::from_str("\"PENDING_INVENTORY\"").unwrap();
		assert_eq!(status, OrderStatus::PendingInventory);
	}

	#[test]
	fn test_terminal_statuses() {
		let terminal: Vec<_> = OrderStatus::all().filter(|s| s.is_terminal()).collect();
		assert_eq!(
			terminal,
			vec![
				OrderStatus::ValidationException,
				OrderStatus::AllocationException,
				OrderStatus::Cancelled,
				OrderStatus::Delivered,
			]
		);
	}

	#[test]
	fn test_new_order_starts_in_new_status() {
		let order = Order::new(Some("PO-1".into()), vec![OrderLine::new("0631234200036", 3)]);
		assert_eq!(order.status, OrderStatus::New);
		assert_eq!(order.version, 0);
		assert_eq!(order.lines[0].quantity_allocated, 0);
	}

	#[test]
	fn test_order_payload_defaults_when_absent() {
		let id = Uuid::new_v4();
		let json = format!(r#"{{"id":"{}","status":"NEW"}}"#, id);
		let order: Order = serde_json::from_str(&json).unwrap();
		assert_eq!(order.id, id);
		assert!(order.lines.is_empty());
		assert!(order.customer_ref.is_none());
	}
}
