//! In-process fan-out event bus with ordered, filtered delivery.
//!
//! Subscribers register once for the life of the bus; `publish` delivers
//! sequentially in registration order, awaiting each handler before the
//! next, so event order and handler completion order always match
//! registration order. A slow subscriber delays later subscribers and
//! the publisher.
//!
//! Cross-thread publishing goes through an explicit message-passing
//! handoff: foreign threads (for example a hardware capture callback)
//! enqueue via a [`PubSubHandle`] and the bus owner drains the queue on
//! its own execution context.

use crate::channel::{AsyncChannel, Channel, QueueChannel, ReadyCallback};
use crate::error::{PipelineError, Result};
use crate::events::{EventKind, PipelineEvent};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A registered handler of bus events.
///
/// The declared `publishes` and `subscribes_to` sets are advisory variant
/// filters: `subscribes_to` gates delivery, `publishes` only backs a
/// warning when a handle publishes an undeclared variant.
#[async_trait]
pub trait Subscriber: Send {
    /// Event variants this subscriber emits. `None` = undeclared.
    fn publishes(&self) -> Option<&'static [EventKind]> {
        None
    }

    /// Event variants this subscriber wants. `None` = everything.
    fn subscribes_to(&self) -> Option<&'static [EventKind]> {
        None
    }

    /// Handle one delivered event.
    async fn on_event(&mut self, event: &PipelineEvent) -> Result<()>;

    /// One-time teardown hook, invoked by [`PubSub::shutdown`].
    async fn shutdown(&mut self) {}
}

/// A pending publish handed off from a foreign thread.
struct RemotePublish {
    event: PipelineEvent,
    done: oneshot::Sender<Result<()>>,
    cancelled: Arc<AtomicBool>,
}

/// Fan-out event bus.
///
/// All methods other than those on [`PubSubHandle`] assume access from the
/// bus owner's single execution context.
pub struct PubSub {
    subscribers: Vec<Box<dyn Subscriber>>,
    remote_tx: mpsc::UnboundedSender<RemotePublish>,
    remote_rx: mpsc::UnboundedReceiver<RemotePublish>,
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub {
    /// Create an empty bus.
    pub fn new() -> Self {
        let (remote_tx, remote_rx) = mpsc::unbounded_channel();
        Self {
            subscribers: Vec::new(),
            remote_tx,
            remote_rx,
        }
    }

    /// Register a subscriber. Registration is append-only: there is no
    /// unsubscribe, and no de-duplication.
    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `event` to every matching subscriber, in registration
    /// order, awaiting each handler before moving to the next.
    ///
    /// # Errors
    ///
    /// Propagates the first handler error; later subscribers are not
    /// notified of that event.
    pub async fn publish(&mut self, event: &PipelineEvent) -> Result<()> {
        let kind = event.kind();
        for subscriber in &mut self.subscribers {
            let wants = subscriber
                .subscribes_to()
                .is_none_or(|kinds| kinds.contains(&kind));
            if wants {
                subscriber.on_event(event).await?;
            }
        }
        Ok(())
    }

    /// A cloneable, `Send` handle for publishing from foreign threads.
    pub fn handle(&self) -> PubSubHandle {
        PubSubHandle {
            tx: self.remote_tx.clone(),
            publishes: None,
        }
    }

    /// Deliver the next publish handed off via a [`PubSubHandle`],
    /// waiting for one to arrive.
    pub async fn process_remote(&mut self) {
        if let Some(request) = self.remote_rx.recv().await {
            self.deliver_remote(request).await;
        }
    }

    /// Deliver every publish already handed off, without waiting.
    pub async fn drain_remote(&mut self) {
        while let Ok(request) = self.remote_rx.try_recv() {
            self.deliver_remote(request).await;
        }
    }

    async fn deliver_remote(&mut self, request: RemotePublish) {
        if request.cancelled.load(Ordering::SeqCst) {
            debug!("skipping cancelled publish: {:?}", request.event.kind());
            return;
        }
        let result = self.publish(&request.event).await;
        let _ = request.done.send(result);
    }

    /// Run the bus as a task, delivering handed-off publishes until
    /// cancelled, then invoking [`PubSub::shutdown`].
    pub async fn serve(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                request = self.remote_rx.recv() => {
                    match request {
                        Some(request) => self.deliver_remote(request).await,
                        None => break,
                    }
                }
            }
        }
        debug!("event bus stopping");
        self.shutdown().await;
    }

    /// Invoke each subscriber's shutdown hook, in registration order.
    ///
    /// A teardown convention, not a terminal state: the bus stays usable
    /// and subscribers stay registered.
    pub async fn shutdown(&mut self) {
        for subscriber in &mut self.subscribers {
            subscriber.shutdown().await;
        }
    }
}

/// Thread-safe publishing handle for a [`PubSub`].
///
/// The only bus operation safe to call from a foreign OS thread.
#[derive(Clone)]
pub struct PubSubHandle {
    tx: mpsc::UnboundedSender<RemotePublish>,
    publishes: Option<&'static [EventKind]>,
}

impl PubSubHandle {
    /// Declare the event variants this handle intends to publish.
    ///
    /// Advisory only: publishing an undeclared variant logs a warning and
    /// still delivers.
    pub fn with_publishes(mut self, kinds: &'static [EventKind]) -> Self {
        self.publishes = Some(kinds);
        self
    }

    /// Enqueue `event` for delivery on the bus owner's execution context.
    ///
    /// Returns a [`PublishReceipt`] that can be awaited for completion or
    /// used to cancel the delivery; merely dropping the receipt abandons
    /// the wait, not the delivery.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ChannelClosed`] if the bus is gone.
    pub fn publish(&self, event: PipelineEvent) -> Result<PublishReceipt> {
        if let Some(declared) = self.publishes {
            if !declared.contains(&event.kind()) {
                warn!("publishing undeclared event variant: {:?}", event.kind());
            }
        }
        let (done_tx, done_rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.tx
            .send(RemotePublish {
                event,
                done: done_tx,
                cancelled: Arc::clone(&cancelled),
            })
            .map_err(|_| PipelineError::ChannelClosed)?;
        Ok(PublishReceipt {
            done: done_rx,
            cancelled,
        })
    }
}

/// Completion handle for a publish handed off across threads.
pub struct PublishReceipt {
    done: oneshot::Receiver<Result<()>>,
    cancelled: Arc<AtomicBool>,
}

impl PublishReceipt {
    /// Wait for the delivery to complete on the bus owner's context.
    ///
    /// # Errors
    ///
    /// Propagates a subscriber failure, or [`PipelineError::ChannelClosed`]
    /// if the bus went away before delivering.
    pub async fn wait(self) -> Result<()> {
        self.done.await.map_err(|_| PipelineError::ChannelClosed)?
    }

    /// Cancel the delivery if the bus has not yet performed it.
    ///
    /// A delivery already performed is unaffected. Safe to call from the
    /// publishing thread.
    pub fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Subscriber that mirrors bus events into a private queue channel.
struct QueueSubscriber {
    queue: Arc<QueueChannel<PipelineEvent>>,
}

#[async_trait]
impl Subscriber for QueueSubscriber {
    async fn on_event(&mut self, event: &PipelineEvent) -> Result<()> {
        self.queue.write(event.clone())
    }

    async fn shutdown(&mut self) {
        self.queue.close();
    }
}

/// A channel view over a shared [`PubSub`] bus.
///
/// Writes publish onto the bus; reads pop a private queue that this
/// channel subscribes to the bus. One bus can therefore feed an ordinary
/// pull-based consumer and any number of push-based subscribers at once.
pub struct PubSubChannel {
    bus: Arc<tokio::sync::Mutex<PubSub>>,
    queue: Arc<QueueChannel<PipelineEvent>>,
    closed: AtomicBool,
}

impl PubSubChannel {
    /// Create a channel over `bus`, registering its read-side queue as a
    /// subscriber.
    pub async fn new(
        bus: Arc<tokio::sync::Mutex<PubSub>>,
        ready: Option<ReadyCallback>,
    ) -> Self {
        let queue = Arc::new(match ready {
            Some(cb) => QueueChannel::with_ready(cb),
            None => QueueChannel::new(),
        });
        bus.lock().await.subscribe(Box::new(QueueSubscriber {
            queue: Arc::clone(&queue),
        }));
        Self {
            bus,
            queue,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AsyncChannel for PubSubChannel {
    type In = PipelineEvent;
    type Out = PipelineEvent;

    async fn write(&self, event: PipelineEvent) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PipelineError::ChannelClosed);
        }
        self.bus.lock().await.publish(&event).await
    }

    async fn read(&self) -> Result<Option<PipelineEvent>> {
        Ok(self.queue.read())
    }

    /// Closing the channel also triggers the bus's one-time teardown.
    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.bus.lock().await.shutdown().await;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
