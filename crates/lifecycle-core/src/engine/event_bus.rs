//! Broadcast channel carrying lifecycle notifications.

use lifecycle_types::LifecycleEvent;
use tokio::sync::broadcast;

/// Event bus for publishing committed lifecycle changes to observers.
///
/// Cloning yields another handle onto the same channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event, returning how many subscribers received it.
	///
	/// Fails only when there are no subscribers.
	pub fn publish(
		&self,
		event: LifecycleEvent,
	) -> Result<usize, broadcast::error::SendError<LifecycleEvent>> {
		self.sender.send(event)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use uuid::Uuid;

	#[tokio::test]
	async fn test_subscribers_receive_published_events() {
		let bus = EventBus::new(8);
		let mut rx = bus.subscribe();
		let event = LifecycleEvent::OrderCreated {
			order_id: Uuid::new_v4(),
		};

		assert_eq!(bus.clone().publish(event.clone()).unwrap(), 1);
		assert_eq!(rx.recv().await.unwrap(), event);
	}

	#[test]
	fn test_publish_without_subscribers_errors() {
		let bus = EventBus::new(8);
		let event = LifecycleEvent::OrderCreated {
			order_id: Uuid::new_v4(),
		};
		assert!(bus.publish(event).is_err());
	}
}
