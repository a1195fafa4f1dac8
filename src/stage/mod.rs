//! Stage adapters: components converting one asynchronous chunk sequence
//! into another via an external service.
//!
//! Each adapter owns the background tasks of one invocation through a
//! [`crate::session::Session`], so abandoning an adapter's output stream
//! cancels everything it started.

pub mod detect;
pub mod generate;
pub mod sentence;
pub mod synthesize;
pub mod transcribe;

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Drive a blocking iterator on a worker thread, exposing its items as an
/// async sequence.
///
/// The iterator runs inside `spawn_blocking` so it never stalls the
/// cooperative scheduler; dropping the returned stream stops the worker
/// at its next item. Must be called from within a tokio runtime.
pub fn stream_on_thread<I>(iter: I) -> impl Stream<Item = I::Item>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    tokio::task::spawn_blocking(move || {
        for item in iter {
            if tx.blocking_send(item).is_err() {
                break;
            }
        }
    });
    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn blocking_iterator_becomes_async_sequence() {
        let stream = stream_on_thread(0..5);
        let items: Vec<u32> = stream.collect().await;
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
    }
}
