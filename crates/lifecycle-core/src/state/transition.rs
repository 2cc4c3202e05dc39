//! Transition table for the order lifecycle.
//!
//! Any (status, event) pair absent from the table is rejected. Rejection is
//! what absorbs duplicate or out-of-order deliveries, so the table must never
//! grow a catch-all entry.

use lifecycle_types::{OrderEvent, OrderEvent as E, OrderStatus, OrderStatus as S};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Every accepted transition as (current status, event, next status).
pub const TRANSITIONS: &[(OrderStatus, OrderEvent, OrderStatus)] = &[
	(S::New, E::ValidateOrder, S::ValidationPending),
	(S::ValidationPending, E::ValidationPassed, S::Validated),
	(S::ValidationPending, E::ValidationFailed, S::ValidationException),
	(S::Validated, E::AllocateOrder, S::AllocationPending),
	(S::AllocationPending, E::AllocationSuccess, S::Allocated),
	(S::AllocationPending, E::AllocationNoInventory, S::PendingInventory),
	(S::AllocationPending, E::AllocationFailed, S::AllocationException),
	(S::Allocated, E::BeerOrderPickedUp, S::PickedUp),
	(S::New, E::CancelOrder, S::Cancelled),
	(S::ValidationPending, E::CancelOrder, S::Cancelled),
	(S::Validated, E::CancelOrder, S::Cancelled),
	(S::AllocationPending, E::CancelOrder, S::Cancelled),
	(S::Allocated, E::CancelOrder, S::Cancelled),
	(S::PendingInventory, E::CancelOrder, S::Cancelled),
];

static TABLE: Lazy<HashMap<(OrderStatus, OrderEvent), OrderStatus>> = Lazy::new(|| {
	TRANSITIONS
		.iter()
		.map(|&(from, event, to)| ((from, event), to))
		.collect()
});

/// Resolves the status `event` leads to from `status`, or `None` if rejected.
pub fn next(status: OrderStatus, event: OrderEvent) -> Option<OrderStatus> {
	TABLE.get(&(status, event)).copied()
}

/// Events accepted while an order is in `status`, in table order.
pub fn accepted_events(status: OrderStatus) -> Vec<OrderEvent> {
	TRANSITIONS
		.iter()
		.filter(|(from, _, _)| *from == status)
		.map(|(_, event, _)| *event)
		.collect()
}
