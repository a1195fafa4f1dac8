//! Voice activity detection over an audio chunk sequence.
//!
//! Detection models are CPU-bound; each chunk's inference runs on a
//! `spawn_blocking` worker so the cooperative scheduler keeps moving.

use crate::error::{PipelineError, Result};
use crate::events::{ActivitySpan, AudioChunk, VoiceActivity};
use futures_util::{Stream, StreamExt};
use std::sync::{Arc, Mutex};

/// A blocking voice activity detection engine.
pub trait VoiceDetector: Send + 'static {
    /// Detect speech spans within one audio chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn detect(&mut self, chunk: &AudioChunk) -> Result<Vec<ActivitySpan>>;

    /// Clear per-chunk internal state between chunks.
    fn reset(&mut self) {}
}

/// Yield the activity timestamps of each upstream audio chunk.
pub fn detect_stream<S, D>(audio: S, detector: D) -> impl Stream<Item = Result<VoiceActivity>>
where
    S: Stream<Item = AudioChunk> + Send + 'static,
    D: VoiceDetector,
{
    async_stream::try_stream! {
        tokio::pin!(audio);
        let detector = Arc::new(Mutex::new(detector));
        while let Some(chunk) = audio.next().await {
            let worker = Arc::clone(&detector);
            let spans = tokio::task::spawn_blocking(move || {
                let mut detector = worker
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                let spans = detector.detect(&chunk);
                detector.reset();
                spans
            })
            .await
            .map_err(|e| PipelineError::Task(format!("VAD worker: {e}")))??;

            yield VoiceActivity { spans };
        }
    }
}
