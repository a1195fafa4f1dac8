//! Bidirectional typed-stream abstraction underlying every pipeline stage.
//!
//! A [`Channel`] models a (possibly asymmetric) two-way stream of typed
//! items: `write` appends an input, `read` pops an output, `close` marks
//! the end of writes. [`QueueChannel`] is the concrete FIFO variant that
//! bridges callback-driven producers (for example a hardware capture
//! callback on a driver thread) into pull-based consumers.
//! [`StreamChannel`] wraps a whole stage-adapter chain behind the same
//! contract.

use crate::error::{PipelineError, Result};
use crate::session::Session;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Callback invoked synchronously after a write makes an item readable.
///
/// Used to integrate with external event loops; must not block or panic.
pub type ReadyCallback = Box<dyn Fn() + Send + Sync>;

/// A two-way stream of typed items.
///
/// `In` and `Out` may differ: a transcription channel consumes audio and
/// produces text. Once closed, every write fails with
/// [`PipelineError::ChannelClosed`]; `close` is idempotent and does not
/// drain pending items.
pub trait Channel {
    /// Item type accepted by `write`.
    type In;
    /// Item type produced by `read`.
    type Out;

    /// Append an input item.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ChannelClosed`] if the channel is closed.
    fn write(&self, item: Self::In) -> Result<()>;

    /// Pop the next available output item, or `None` if nothing is ready.
    ///
    /// Never blocks and never fails on an empty channel.
    fn read(&self) -> Option<Self::Out>;

    /// Mark the channel closed. Idempotent.
    fn close(&self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

/// A [`Channel`] whose every operation is an await point.
///
/// Callers must not assume that a completed `write` makes a dependent
/// `read` succeed without polling, nor any ordering across concurrent
/// writers.
#[async_trait]
pub trait AsyncChannel: Send + Sync {
    /// Item type accepted by `write`.
    type In;
    /// Item type produced by `read`.
    type Out;

    /// Append an input item.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ChannelClosed`] if the channel is closed.
    async fn write(&self, item: Self::In) -> Result<()>;

    /// Pop the next available output item, or `Ok(None)` if nothing is
    /// ready.
    ///
    /// An empty channel is never an error; `Err` only surfaces a failure
    /// of the background stage feeding this channel.
    async fn read(&self) -> Result<Option<Self::Out>>;

    /// Mark the channel closed and release any owned resources. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

/// An unbounded FIFO channel.
///
/// This is the one structure in the core that may be shared across a real
/// OS-thread boundary: a capture callback on a driver thread writes while
/// the cooperative scheduler thread reads.
pub struct QueueChannel<T> {
    items: Mutex<VecDeque<T>>,
    closed: AtomicBool,
    ready: Option<ReadyCallback>,
}

impl<T> Default for QueueChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueueChannel<T> {
    /// Create a queue channel without a readiness callback.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            ready: None,
        }
    }

    /// Create a queue channel that invokes `ready` after each write.
    pub fn with_ready(ready: ReadyCallback) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            ready: Some(ready),
        }
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    /// Whether the buffer is currently empty.
    pub fn is_empty(&self) -> bool {
        self.lock_items().is_empty()
    }

    // A poisoned lock only means another writer panicked mid-push; the
    // deque itself is still structurally valid.
    fn lock_items(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<T> Channel for QueueChannel<T> {
    type In = T;
    type Out = T;

    fn write(&self, item: T) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PipelineError::ChannelClosed);
        }
        self.lock_items().push_back(item);
        if let Some(ready) = &self.ready {
            ready();
        }
        Ok(())
    }

    fn read(&self) -> Option<T> {
        self.lock_items().pop_front()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T: Send + 'static> QueueChannel<T> {
    /// Adapt the queue into an async sequence for suspension-based
    /// consumers.
    ///
    /// Polls the buffer at `poll_interval` while it is empty (yielding to
    /// co-scheduled tasks rather than spinning) and ends once the channel
    /// is closed and drained.
    pub fn stream(self: &Arc<Self>, poll_interval: Duration) -> impl Stream<Item = T> + 'static {
        let queue = Arc::clone(self);
        async_stream::stream! {
            loop {
                if let Some(item) = queue.read() {
                    yield item;
                } else if queue.is_closed() {
                    break;
                } else {
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }
}

/// An [`AsyncChannel`] bridging a stage-adapter stream chain.
///
/// Writes feed the chain's upstream sequence; a pump task owned by the
/// channel moves the chain's results into a private [`QueueChannel`] (which
/// carries the readiness callback), so reads stay non-blocking. Closing
/// the channel ends the upstream sequence and cancels the pump; so does
/// dropping it.
pub struct StreamChannel<In, Out> {
    input: Mutex<Option<mpsc::UnboundedSender<In>>>,
    queue: Arc<QueueChannel<Out>>,
    session: Mutex<Session>,
    closed: AtomicBool,
}

impl<In: Send + 'static, Out: Send + 'static> StreamChannel<In, Out> {
    /// Build a channel from a stage chain.
    ///
    /// `build` receives the channel's write side as an async sequence and
    /// returns the chain's output stream.
    pub fn new<F, S>(ready: Option<ReadyCallback>, build: F) -> Self
    where
        F: FnOnce(UnboundedReceiverStream<In>) -> S,
        S: Stream<Item = Result<Out>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(match ready {
            Some(cb) => QueueChannel::with_ready(cb),
            None => QueueChannel::new(),
        });
        let output = build(UnboundedReceiverStream::new(rx));

        let mut session = Session::new();
        let sink = Arc::clone(&queue);
        session.spawn("pump", async move {
            tokio::pin!(output);
            while let Some(item) = output.next().await {
                sink.write(item?)?;
            }
            sink.close();
            Ok(())
        });

        Self {
            input: Mutex::new(Some(tx)),
            queue,
            session: Mutex::new(session),
            closed: AtomicBool::new(false),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl<In: Send + 'static, Out: Send + 'static> AsyncChannel for StreamChannel<In, Out> {
    type In = In;
    type Out = Out;

    async fn write(&self, item: In) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PipelineError::ChannelClosed);
        }
        let input = self
            .input
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match input.as_ref() {
            Some(tx) => tx.send(item).map_err(|_| PipelineError::ChannelClosed),
            None => Err(PipelineError::ChannelClosed),
        }
    }

    /// Buffered results drain before a stage failure is reported; the
    /// first empty read after a failure returns the stage's error.
    async fn read(&self) -> Result<Option<Out>> {
        if let Some(item) = self.queue.read() {
            return Ok(Some(item));
        }
        if let Some(err) = self.lock_session().try_take_error() {
            return Err(err);
        }
        Ok(None)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.input
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        self.queue.close();
        self.lock_session().shutdown();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
