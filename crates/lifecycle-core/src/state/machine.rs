//! Per-dispatch order state machine.
//!
//! A machine is built fresh for every event, seeded with the order's persisted
//! status, and dropped when the dispatch returns. It holds no durable state of
//! its own: the transition only becomes real once every registered
//! interceptor has accepted it.

use super::interceptor::StateChangeInterceptor;
use super::store::OrderTransaction;
use super::transition;
use crate::LifecycleError;
use lifecycle_types::{Order, OrderEvent, OrderStatus};
use std::sync::Arc;

/// A completed status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
	pub from: OrderStatus,
	pub to: OrderStatus,
	pub event: OrderEvent,
}

/// Short-lived state machine for a single order.
pub struct OrderStateMachine {
	status: OrderStatus,
	/// Extended context: the full order, so interceptors can persist the
	/// whole entity rather than just its status.
	order: Order,
	interceptors: Vec<Arc<dyn StateChangeInterceptor>>,
}

impl OrderStateMachine {
	/// Builds a machine seeded at the order's current status.
	pub fn new(order: Order) -> Self {
		Self {
			status: order.status,
			order,
			interceptors: Vec::new(),
		}
	}

	/// Registers an interceptor; interceptors run in registration order.
	pub fn with_interceptor(mut self, interceptor: Arc<dyn StateChangeInterceptor>) -> Self {
		self.interceptors.push(interceptor);
		self
	}

	pub fn status(&self) -> OrderStatus {
		self.status
	}

	/// Applies `event` and runs the interceptors within `tx`.
	///
	/// On rejection nothing is written. If an interceptor fails, the machine
	/// keeps its previous status and the error is returned.
	pub async fn send_event(
		&mut self,
		tx: &mut OrderTransaction,
		event: OrderEvent,
	) -> Result<Transition, LifecycleError> {
		let next = transition::next(self.status, event).ok_or(LifecycleError::InvalidTransition {
			order_id: self.order.id,
			status: self.status,
			event,
		})?;

		let transition = Transition {
			from: self.status,
			to: next,
			event,
		};
		let mut updated = self.order.clone();
		updated.status = next;

		for interceptor in &self.interceptors {
			interceptor
				.on_transition_complete(tx, &mut updated, &transition)
				.await?;
		}

		self.status = next;
		self.order = updated;
		Ok(transition)
	}

	/// Consumes the machine, returning the order as last committed.
	pub fn into_order(self) -> Order {
		self.order
	}
}
