//! Order lifecycle manager.
//!
//! Entry point for every lifecycle operation. Each operation opens a
//! transaction on the order, builds a fresh state machine from the stored
//! status, and submits one event. The transaction is held until the
//! transition has been persisted, so events for the same order are applied
//! one at a time against the latest committed status.

use crate::engine::event_bus::EventBus;
use crate::state::{
	transition, OrderStateMachine, OrderStore, OrderTransaction, PersistingInterceptor,
	StateChangeInterceptor, TracingInterceptor, Transition,
};
use crate::LifecycleError;
use lifecycle_types::{
	current_timestamp, truncate_id, LifecycleEvent, Order, OrderEvent, OrderStatus,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Applies lifecycle events to orders and commits the results.
pub struct OrderLifecycleManager {
	store: Arc<OrderStore>,
	event_bus: EventBus,
	interceptors: Vec<Arc<dyn StateChangeInterceptor>>,
}

impl OrderLifecycleManager {
	/// Creates a manager that persists and logs every transition.
	pub fn new(store: Arc<OrderStore>, event_bus: EventBus) -> Self {
		Self {
			store,
			event_bus,
			interceptors: vec![Arc::new(PersistingInterceptor), Arc::new(TracingInterceptor)],
		}
	}

	pub fn store(&self) -> &Arc<OrderStore> {
		&self.store
	}

	/// Persists a new order in `NEW` and submits it for validation.
	///
	/// Returns the order as stored after the validation request was applied.
	/// Creation is all-or-nothing: if the validation request cannot be
	/// committed, the inserted record is removed before the error is returned,
	/// so the same order can be submitted again.
	#[instrument(skip_all, fields(order_id = %truncate_id(&order.id.to_string())))]
	pub async fn create_order(&self, mut order: Order) -> Result<Order, LifecycleError> {
		let mut tx = self.store.begin(order.id).await;
		if tx.exists().await? {
			return Err(LifecycleError::AlreadyExists(order.id));
		}

		let now = current_timestamp();
		order.status = OrderStatus::New;
		order.created_at = now;
		order.version = 0;
		tx.put(&mut order).await?;

		let transition = match self.apply(&mut tx, OrderEvent::ValidateOrder).await {
			Ok((_, transition)) => transition,
			Err(e) => {
				if let Err(rollback) = tx.delete().await {
					tracing::error!(error = %rollback, "Failed to roll back order creation");
				}
				return Err(e);
			},
		};
		let created = tx.get().await?;

		// Published under the transaction so notifications for one order
		// keep commit order.
		tracing::info!("Order created");
		self.publish(LifecycleEvent::OrderCreated {
			order_id: created.id,
		});
		self.announce(created.id, &transition);
		Ok(created)
	}

	/// Applies `event` to the order and returns it as committed.
	#[instrument(skip_all, fields(order_id = %truncate_id(&order_id.to_string()), event = %event))]
	pub async fn dispatch(&self, order_id: Uuid, event: OrderEvent) -> Result<Order, LifecycleError> {
		let mut tx = self.store.begin(order_id).await;
		let (order, transition) = self.apply(&mut tx, event).await?;
		self.announce(order_id, &transition);
		Ok(order)
	}

	pub async fn on_validation_passed(&self, order_id: Uuid) -> Result<(), LifecycleError> {
		self.dispatch(order_id, OrderEvent::ValidationPassed).await.map(|_| ())
	}

	pub async fn on_validation_failed(&self, order_id: Uuid) -> Result<(), LifecycleError> {
		self.dispatch(order_id, OrderEvent::ValidationFailed).await.map(|_| ())
	}

	/// Requests allocation for a validated order.
	pub async fn allocate_order(&self, order_id: Uuid) -> Result<(), LifecycleError> {
		self.dispatch(order_id, OrderEvent::AllocateOrder).await.map(|_| ())
	}

	pub async fn on_allocation_success(&self, order_id: Uuid) -> Result<(), LifecycleError> {
		self.dispatch(order_id, OrderEvent::AllocationSuccess).await.map(|_| ())
	}

	pub async fn on_allocation_pending_inventory(
		&self,
		order_id: Uuid,
	) -> Result<(), LifecycleError> {
		self.dispatch(order_id, OrderEvent::AllocationNoInventory)
			.await
			.map(|_| ())
	}

	pub async fn on_allocation_failed(&self, order_id: Uuid) -> Result<(), LifecycleError> {
		self.dispatch(order_id, OrderEvent::AllocationFailed).await.map(|_| ())
	}

	pub async fn on_picked_up(&self, order_id: Uuid) -> Result<(), LifecycleError> {
		self.dispatch(order_id, OrderEvent::BeerOrderPickedUp).await.map(|_| ())
	}

	pub async fn on_cancel(&self, order_id: Uuid) -> Result<(), LifecycleError> {
		self.dispatch(order_id, OrderEvent::CancelOrder).await.map(|_| ())
	}

	/// Reads the committed state of an order.
	pub async fn get_order(&self, order_id: Uuid) -> Result<Order, LifecycleError> {
		self.store.get(order_id).await
	}

	/// Loads the order inside `tx` and runs one event through a fresh machine.
	async fn apply(
		&self,
		tx: &mut OrderTransaction,
		event: OrderEvent,
	) -> Result<(Order, Transition), LifecycleError> {
		let order = tx.get().await?;
		let mut machine = self.build(order);

		let transition = match machine.send_event(tx, event).await {
			Ok(transition) => transition,
			Err(e) => {
				tracing::debug!(
					status = %machine.status(),
					accepted = ?transition::accepted_events(machine.status()),
					error = %e,
					"Event not applied"
				);
				return Err(e);
			},
		};

		Ok((machine.into_order(), transition))
	}

	fn build(&self, order: Order) -> OrderStateMachine {
		self.interceptors
			.iter()
			.cloned()
			.fold(OrderStateMachine::new(order), |machine, interceptor| {
				machine.with_interceptor(interceptor)
			})
	}

	fn announce(&self, order_id: Uuid, transition: &Transition) {
		self.publish(LifecycleEvent::StatusChanged {
			order_id,
			from: transition.from,
			to: transition.to,
			event: transition.event,
		});
	}

	fn publish(&self, event: LifecycleEvent) {
		// No subscribers is fine; notifications are best-effort.
		let _ = self.event_bus.publish(event);
	}
}
