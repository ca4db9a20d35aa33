// src/rabbitmq/receiver.rs
//
// Drains the delivery feed of the consumer and writes every payload to the
// output sink. Deliveries are auto-acked by the broker, so nothing here
// acknowledges anything.

use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::output::OutputSink;

/// Why the receiver loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverExit {
    /// The feed ended, i.e. the channel or connection went away.
    FeedClosed,
    /// The cancellation token fired.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverReport {
    pub delivered: u64,
    pub feed_errors: u64,
    pub exit: ReceiverExit,
}

/// Line written for one delivery.
pub fn render_delivery(payload: &[u8]) -> String {
    format!(" [x] {}", String::from_utf8_lossy(payload))
}

/// Runs until the feed closes or `cancel` fires, in arrival order.
///
/// Neither a feed error item nor a failing sink stops the loop.
pub async fn run_receiver<S, E>(
    feed: S,
    sink: Arc<dyn OutputSink>,
    cancel: CancellationToken,
) -> ReceiverReport
where
    S: Stream<Item = Result<Vec<u8>, E>>,
    E: Display,
{
    futures::pin_mut!(feed);

    let mut delivered = 0u64;
    let mut feed_errors = 0u64;

    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ReceiverExit::Cancelled,
            next = feed.next() => next,
        };

        match next {
            Some(Ok(payload)) => {
                delivered += 1;
                debug!(bytes = payload.len(), delivered, "Delivery received");
                if let Err(e) = sink.write_line(&render_delivery(&payload)) {
                    error!("Failed to write delivery to output: {}", e);
                }
            }
            Some(Err(e)) => {
                feed_errors += 1;
                warn!("Error receiving message: {}", e);
            }
            None => break ReceiverExit::FeedClosed,
        }
    };

    info!(delivered, feed_errors, exit = ?exit, "Receiver stopped");
    ReceiverReport {
        delivered,
        feed_errors,
        exit,
    }
}
