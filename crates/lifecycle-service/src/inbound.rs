//! Newline-delimited JSON reader for inbound lifecycle events.
//!
//! Each non-blank line is one [`InboundEvent`]. Lines that fail to parse are
//! logged and skipped so a single bad record does not stop the feed.

use lifecycle_types::InboundEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Counts reported once the reader reaches end of input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ForwardStats {
	pub forwarded: usize,
	pub skipped: usize,
}

/// Parses lines from `reader` and sends each event to `sender`.
///
/// Stops at end of input or when the receiving side has gone away.
pub async fn forward_events<R>(
	reader: R,
	sender: mpsc::Sender<InboundEvent>,
) -> std::io::Result<ForwardStats>
where
	R: AsyncBufRead + Unpin,
{
	let mut stats = ForwardStats::default();
	let mut lines = reader.lines();
	let mut line_no = 0usize;

	while let Some(line) = lines.next_line().await? {
		line_no += 1;
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		let event = match serde_json::from_str::<InboundEvent>(line) {
			Ok(event) => event,
			Err(e) => {
				tracing::warn!(line = line_no, error = %e, "Skipping malformed inbound event");
				stats.skipped += 1;
				continue;
			},
		};

		if sender.send(event).await.is_err() {
			tracing::debug!("Inbound receiver closed, stopping reader");
			break;
		}
		stats.forwarded += 1;
	}

	Ok(stats)
}

#[cfg(test)]
mod tests {
	use super::*;
	use lifecycle_types::OrderEvent;
	use tokio::io::BufReader;
	use uuid::Uuid;

	#[tokio::test]
	async fn test_forwards_valid_lines_and_skips_bad_ones() {
		let id = Uuid::new_v4();
		let input = format!(
			concat!(
				"{{\"type\":\"create\",\"order\":{{\"id\":\"{id}\",\"status\":\"NEW\"}}}}\n",
				"\n",
				"not json\n",
				"{{\"type\":\"transition\",\"order_id\":\"{id}\",\"event\":\"VALIDATION_PASSED\"}}\n",
				"{{\"type\":\"transition\",\"order_id\":\"{id}\",\"event\":\"TELEPORT\"}}\n",
			),
			id = id
		);

		let (tx, mut rx) = mpsc::channel(8);
		let stats = forward_events(BufReader::new(input.as_bytes()), tx)
			.await
			.unwrap();
		assert_eq!(
			stats,
			ForwardStats {
				forwarded: 2,
				skipped: 2
			}
		);

		match rx.recv().await.unwrap() {
			InboundEvent::Create { order } => assert_eq!(order.id, id),
			other => panic!("unexpected event: {:?}", other),
		}
		assert_eq!(
			rx.recv().await.unwrap(),
			InboundEvent::Transition {
				order_id: id,
				event: OrderEvent::ValidationPassed,
			}
		);
		assert!(rx.recv().await.is_none());
	}

	#[tokio::test]
	async fn test_stops_when_receiver_is_gone() {
		let id = Uuid::new_v4();
		let line = format!(
			"{{\"type\":\"transition\",\"order_id\":\"{}\",\"event\":\"CANCEL_ORDER\"}}\n",
			id
		);
		let input = line.repeat(3);

		let (tx, rx) = mpsc::channel(1);
		drop(rx);
		let stats = forward_events(BufReader::new(input.as_bytes()), tx)
			.await
			.unwrap();
		assert_eq!(stats.forwarded, 0);
	}
}
