//! Capture-source contract bridging hardware callbacks into the pipeline.
//!
//! Audio drivers deliver data on their own thread via a callback. The
//! bridge is a [`QueueChannel`]: the callback pushes through a cloneable
//! [`CaptureSink`] handle while the cooperative scheduler side drains the
//! queue, usually through [`QueueChannel::stream`].

use crate::channel::{Channel, QueueChannel};
use crate::error::Result;
use crate::events::AudioChunk;
use std::sync::Arc;
use tracing::debug;

/// Write-side handle for a capture callback.
///
/// Cloneable and safe to call from a foreign driver thread. A push after
/// the pipeline closed the channel drops the chunk instead of failing the
/// audio thread.
#[derive(Clone)]
pub struct CaptureSink {
    queue: Arc<QueueChannel<AudioChunk>>,
}

impl CaptureSink {
    /// Wrap a shared queue channel.
    pub fn new(queue: Arc<QueueChannel<AudioChunk>>) -> Self {
        Self { queue }
    }

    /// Push one captured chunk. Returns whether the chunk was accepted.
    pub fn push(&self, chunk: AudioChunk) -> bool {
        match self.queue.write(chunk) {
            Ok(()) => true,
            Err(_) => {
                debug!("capture channel closed, dropping chunk");
                false
            }
        }
    }
}

/// A microphone-like audio source driven by an external callback.
///
/// Implementations own the device handle; `start` begins delivering
/// chunks into `sink` from the driver's thread until `stop` or drop.
pub trait CaptureSource {
    /// Begin capturing into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened or started.
    fn start(&mut self, sink: CaptureSink) -> Result<()>;

    /// Stop capturing. Idempotent.
    fn stop(&mut self);
}
