//! Dispatch engine feeding inbound events to the lifecycle manager.
//!
//! Events for the same order are applied in the order they were received:
//! the first event for an idle order starts a worker task that drains that
//! order's queue, and later events for it are queued behind the running one.
//! Workers for different orders run concurrently, bounded by a semaphore.

pub mod event_bus;

use crate::manager::OrderLifecycleManager;
use crate::LifecycleError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lifecycle_config::Config;
use lifecycle_types::{truncate_id, InboundEvent};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

/// Errors that can occur while the engine is running.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Service error: {0}")]
	Service(String),
	#[error("Handler error: {0}")]
	Handler(#[from] LifecycleError),
}

/// Events waiting behind the one an order's worker is applying. An entry
/// exists exactly while that order has a worker.
type OrderQueues = DashMap<Uuid, VecDeque<InboundEvent>>;

/// Receives inbound events and dispatches them concurrently across orders.
#[derive(Clone)]
pub struct LifecycleEngine {
	config: Config,
	manager: Arc<OrderLifecycleManager>,
	event_bus: event_bus::EventBus,
	queues: Arc<OrderQueues>,
}

impl LifecycleEngine {
	pub fn new(
		config: Config,
		manager: Arc<OrderLifecycleManager>,
		event_bus: event_bus::EventBus,
	) -> Self {
		Self {
			config,
			manager,
			event_bus,
			queues: Arc::new(DashMap::new()),
		}
	}

	/// Creates an inbound channel sized by `lifecycle.inbound_buffer`.
	pub fn channel(&self) -> (mpsc::Sender<InboundEvent>, mpsc::Receiver<InboundEvent>) {
		mpsc::channel(self.config.lifecycle.inbound_buffer)
	}

	/// Main receive loop.
	///
	/// Returns once every sender is dropped or ctrl-c is received, after every
	/// event already received has been applied.
	pub async fn run(&self, mut inbound: mpsc::Receiver<InboundEvent>) -> Result<(), EngineError> {
		let permits = self.config.lifecycle.max_concurrent_dispatches;
		let semaphore = Arc::new(Semaphore::new(permits));

		tracing::info!(
			service_id = %self.config.service.id,
			max_concurrent_dispatches = permits,
			"Lifecycle engine started"
		);

		loop {
			tokio::select! {
				received = inbound.recv() => {
					let Some(event) = received else {
						tracing::info!("Inbound channel closed");
						break;
					};
					self.route(&semaphore, event).await;
				}

				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Shutdown signal received");
					break;
				}
			}
		}

		// Wait for running workers by taking every permit back.
		let active_orders = self.active_orders();
		if active_orders > 0 {
			tracing::info!(active_orders, "Waiting for in-flight dispatches");
		}
		let _drained = semaphore
			.acquire_many(permits as u32)
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;

		tracing::info!("Lifecycle engine stopped");
		Ok(())
	}

	/// Applies a single inbound event.
	pub async fn handle(&self, event: InboundEvent) -> Result<(), EngineError> {
		match event {
			InboundEvent::Create { order } => {
				self.manager.create_order(order).await?;
			},
			InboundEvent::Transition { order_id, event } => {
				self.manager.dispatch(order_id, event).await?;
			},
		}
		Ok(())
	}

	pub fn manager(&self) -> &Arc<OrderLifecycleManager> {
		&self.manager
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Number of orders with a running worker.
	pub fn active_orders(&self) -> usize {
		self.queues.len()
	}

	/// Queues `event` behind its order's worker, or starts one.
	async fn route(&self, semaphore: &Arc<Semaphore>, event: InboundEvent) {
		let order_id = event.order_id();
		// The shard guard must be released before waiting for a permit.
		match self.queues.entry(order_id) {
			Entry::Occupied(mut queue) => {
				queue.get_mut().push_back(event);
				return;
			},
			Entry::Vacant(slot) => {
				slot.insert(VecDeque::new());
			},
		}

		match semaphore.clone().acquire_owned().await {
			Ok(permit) => {
				let engine = self.clone();
				tokio::spawn(engine.drain_order(order_id, event, permit));
			},
			Err(e) => {
				self.queues.remove(&order_id);
				tracing::error!("Failed to acquire semaphore permit: {}", e);
			},
		}
	}

	/// Applies `first`, then every event queued for the order meanwhile, and
	/// retires the worker once the queue is empty.
	async fn drain_order(self, order_id: Uuid, first: InboundEvent, _permit: OwnedSemaphorePermit) {
		let mut next = Some(first);
		while let Some(event) = next {
			log_outcome(self.handle(event).await);
			next = match self.queues.entry(order_id) {
				Entry::Occupied(mut queue) => match queue.get_mut().pop_front() {
					Some(event) => Some(event),
					None => {
						queue.remove();
						None
					},
				},
				Entry::Vacant(_) => None,
			};
		}
	}
}

fn log_outcome(result: Result<(), EngineError>) {
	match result {
		Ok(()) => {},
		Err(EngineError::Handler(LifecycleError::InvalidTransition {
			order_id,
			status,
			event,
		})) => {
			tracing::warn!(
				order_id = %truncate_id(&order_id.to_string()),
				status = %status,
				event = %event,
				"Event rejected in current status"
			);
		},
		Err(e) => {
			tracing::error!(error = %e, "Handler error");
		},
	}
}
