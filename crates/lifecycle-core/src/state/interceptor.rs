//! Hooks invoked when a state machine completes a transition.

use super::machine::Transition;
use super::store::OrderTransaction;
use crate::LifecycleError;
use async_trait::async_trait;
use lifecycle_types::{truncate_id, Order};

/// Hook run synchronously inside a dispatch after the next status has been
/// computed and before the dispatch returns.
///
/// Returning an error aborts the dispatch; later interceptors do not run and
/// the machine keeps its previous status.
#[async_trait]
pub trait StateChangeInterceptor: Send + Sync {
	/// `order` already carries the new status. Changes an interceptor makes
	/// to it are visible to the interceptors after it.
	async fn on_transition_complete(
		&self,
		tx: &mut OrderTransaction,
		order: &mut Order,
		transition: &Transition,
	) -> Result<(), LifecycleError>;
}

/// Writes the transitioned order back through the dispatch's transaction.
///
/// This is the only path by which a computed transition becomes durable.
pub struct PersistingInterceptor;

#[async_trait]
impl StateChangeInterceptor for PersistingInterceptor {
	async fn on_transition_complete(
		&self,
		tx: &mut OrderTransaction,
		order: &mut Order,
		transition: &Transition,
	) -> Result<(), LifecycleError> {
		if let Err(e) = tx.put(order).await {
			tracing::error!(
				order_id = %truncate_id(&order.id.to_string()),
				from = %transition.from,
				to = %transition.to,
				error = %e,
				"Failed to persist transition"
			);
			return Err(e);
		}
		Ok(())
	}
}

/// Logs every committed transition.
///
/// Register after [`PersistingInterceptor`] so only durable transitions are
/// logged.
pub struct TracingInterceptor;

#[async_trait]
impl StateChangeInterceptor for TracingInterceptor {
	async fn on_transition_complete(
		&self,
		_tx: &mut OrderTransaction,
		order: &mut Order,
		transition: &Transition,
	) -> Result<(), LifecycleError> {
		tracing::info!(
			order_id = %truncate_id(&order.id.to_string()),
			event = %transition.event,
			from = %transition.from,
			to = %transition.to,
			version = order.version,
			"Order transitioned"
		);
		Ok(())
	}
}
