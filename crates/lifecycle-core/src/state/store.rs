//! Order store adapter over the typed storage service.
//!
//! All read-modify-write sequences for an order run inside an
//! [`OrderTransaction`], which holds that order's lock until dropped. Orders
//! with different ids never share a lock.

use crate::LifecycleError;
use dashmap::DashMap;
use lifecycle_storage::StorageService;
use lifecycle_types::{current_timestamp, Order, OrderStatus, StorageKey};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// Durable keyed storage for orders.
pub struct OrderStore {
	storage: Arc<StorageService>,
	locks: Arc<LockMap>,
}

impl OrderStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			locks: Arc::new(DashMap::new()),
		}
	}

	/// Opens a transaction on `order_id`, waiting for any transaction already
	/// open on the same order to finish.
	pub async fn begin(&self, order_id: Uuid) -> OrderTransaction {
		// The shard guard must not live across the await below.
		let lock = self
			.locks
			.entry(order_id)
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();
		let guard = lock.lock_owned().await;

		OrderTransaction {
			order_id,
			storage: self.storage.clone(),
			locks: self.locks.clone(),
			guard: Some(guard),
		}
	}

	/// Loads an order without taking its lock.
	pub async fn get(&self, order_id: Uuid) -> Result<Order, LifecycleError> {
		load(&self.storage, order_id).await
	}

	/// Creates or overwrites an order, returning what was stored.
	pub async fn save(&self, mut order: Order) -> Result<Order, LifecycleError> {
		let mut tx = self.begin(order.id).await;
		tx.put(&mut order).await?;
		Ok(order)
	}

	/// Sets the status of an existing order in its own transaction.
	pub async fn update_status(
		&self,
		order_id: Uuid,
		status: OrderStatus,
	) -> Result<(), LifecycleError> {
		let mut tx = self.begin(order_id).await;
		tx.update_status(status).await.map(|_| ())
	}
}

/// Exclusive unit of work on a single order.
///
/// Reads and writes through the transaction are serialized against every
/// other transaction on the same order id. Writes are committed as they are
/// made; the transaction provides isolation, not rollback.
pub struct OrderTransaction {
	order_id: Uuid,
	storage: Arc<StorageService>,
	locks: Arc<LockMap>,
	guard: Option<OwnedMutexGuard<()>>,
}

impl OrderTransaction {
	/// Loads the order this transaction covers.
	pub async fn get(&self) -> Result<Order, LifecycleError> {
		load(&self.storage, self.order_id).await
	}

	/// Whether the order has been persisted.
	pub async fn exists(&self) -> Result<bool, LifecycleError> {
		self.storage
			.exists(StorageKey::Orders.as_str(), &self.order_id.to_string())
			.await
			.map_err(|e| LifecycleError::from_storage(self.order_id, e))
	}

	/// Writes the full order, stamping `updated_at` and bumping `version`.
	///
	/// The stamped fields are written back into `order` only once the store
	/// has accepted the write.
	pub async fn put(&mut self, order: &mut Order) -> Result<(), LifecycleError> {
		if order.id != self.order_id {
			return Err(LifecycleError::PersistenceFailure(format!(
				"Transaction for order {} cannot write order {}",
				self.order_id, order.id
			)));
		}

		let mut stamped = order.clone();
		stamped.updated_at = current_timestamp();
		stamped.version = order.version + 1;

		self.storage
			.store(StorageKey::Orders.as_str(), &self.order_id.to_string(), &stamped)
			.await
			.map_err(|e| LifecycleError::from_storage(self.order_id, e))?;

		*order = stamped;
		Ok(())
	}

	/// Removes the order from the store.
	pub async fn delete(&mut self) -> Result<(), LifecycleError> {
		self.storage
			.remove(StorageKey::Orders.as_str(), &self.order_id.to_string())
			.await
			.map_err(|e| LifecycleError::from_storage(self.order_id, e))
	}

	/// Sets the stored status of an existing order.
	pub async fn update_status(&mut self, status: OrderStatus) -> Result<Order, LifecycleError> {
		let mut order = self.get().await?;
		order.status = status;
		self.put(&mut order).await?;
		Ok(order)
	}
}

impl Drop for OrderTransaction {
	fn drop(&mut self) {
		self.guard.take();
		// Forget the lock once nobody else holds or waits on it.
		self.locks
			.remove_if(&self.order_id, |_, lock| Arc::strong_count(lock) == 1);
	}
}

async fn load(storage: &StorageService, order_id: Uuid) -> Result<Order, LifecycleError> {
	storage
		.retrieve(StorageKey::Orders.as_str(), &order_id.to_string())
		.await
		.map_err(|e| LifecycleError::from_storage(order_id, e))
}

#[cfg(test)]
mod tests {
	use super::*;
	use lifecycle_storage::implementations::memory::MemoryStorage;
	use lifecycle_types::OrderLine;
	use std::time::Duration;

	fn store() -> OrderStore {
		OrderStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_save_then_get() {
		let store = store();
		let order = Order::new(Some("PO-1".into()), vec![OrderLine::new("upc-1", 2)]);

		let saved = store.save(order.clone()).await.unwrap();
		assert_eq!(saved.version, 1);

		let loaded = store.get(order.id).await.unwrap();
		assert_eq!(loaded, saved);
		assert_eq!(loaded.lines, order.lines);
	}

	#[tokio::test]
	async fn test_get_missing_is_not_found() {
		let store = store();
		let id = Uuid::new_v4();
		assert!(matches!(store.get(id).await, Err(LifecycleError::NotFound(missing)) if missing == id));
	}

	#[tokio::test]
	async fn test_update_status() {
		let store = store();
		let order = store.save(Order::new(None, vec![])).await.unwrap();

		store
			.update_status(order.id, OrderStatus::ValidationPending)
			.await
			.unwrap();
		let loaded = store.get(order.id).await.unwrap();
		assert_eq!(loaded.status, OrderStatus::ValidationPending);
		assert_eq!(loaded.version, 2);

		let missing = Uuid::new_v4();
		assert!(matches!(
			store.update_status(missing, OrderStatus::Validated).await,
			Err(LifecycleError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_put_rejects_foreign_order() {
		let store = store();
		let mut tx = store.begin(Uuid::new_v4()).await;
		let mut other = Order::new(None, vec![]);
		assert!(matches!(
			tx.put(&mut other).await,
			Err(LifecycleError::PersistenceFailure(_))
		));
		assert_eq!(other.version, 0);
	}

	#[tokio::test]
	async fn test_delete_inside_transaction() {
		let store = store();
		let order = store.save(Order::new(None, vec![])).await.unwrap();

		let mut tx = store.begin(order.id).await;
		tx.delete().await.unwrap();
		assert!(!tx.exists().await.unwrap());
		drop(tx);

		assert!(matches!(
			store.get(order.id).await,
			Err(LifecycleError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_transactions_on_same_order_are_serialized() {
		let store = Arc::new(store());
		let id = store.save(Order::new(None, vec![])).await.unwrap().id;

		let tx = store.begin(id).await;
		let waiter = {
			let store = store.clone();
			tokio::spawn(async move {
				let _tx = store.begin(id).await;
			})
		};

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert!(!waiter.is_finished());

		drop(tx);
		tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.unwrap()
			.unwrap();
	}

	#[tokio::test]
	async fn test_different_orders_do_not_block() {
		let store = store();
		let _first = store.begin(Uuid::new_v4()).await;
		let second = tokio::time::timeout(Duration::from_secs(1), store.begin(Uuid::new_v4())).await;
		assert!(second.is_ok());
	}

	#[tokio::test]
	async fn test_locks_are_released_after_use() {
		let store = store();
		let id = Uuid::new_v4();
		{
			let _tx = store.begin(id).await;
			assert_eq!(store.locks.len(), 1);
		}
		assert_eq!(store.locks.len(), 0);
	}
}
