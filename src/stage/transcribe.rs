//! Streaming speech-to-text adapter over a remote transcription transport.
//!
//! One [`transcribe`] invocation owns a session of background tasks: a
//! sender forwarding upstream audio, a keep-alive pinger so the remote
//! side does not idle-time-out the connection, and an inline receiver
//! loop aggregating transcript fragments into complete utterances.

use crate::channel::{ReadyCallback, StreamChannel};
use crate::config::StageConfig;
use crate::error::{PipelineError, Result};
use crate::events::{AudioChunk, TranscriptFragment, Transcription};
use crate::session::Session;
use crate::system::System;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::debug;

/// Send half of a transcription transport.
///
/// Cloneable so the sender and keep-alive tasks can share it;
/// implementations serialize access internally.
#[async_trait]
pub trait TranscribeTx: Clone + Send + Sync + 'static {
    /// Forward one audio chunk to the remote transcriber.
    async fn send_audio(&self, chunk: AudioChunk) -> Result<()>;

    /// Send a liveness ping.
    async fn send_keepalive(&self) -> Result<()>;

    /// Signal that no further audio will be sent.
    async fn finish(&self) -> Result<()>;
}

/// Receive half of a transcription transport.
#[async_trait]
pub trait TranscribeRx: Send + 'static {
    /// Receive the next transcript fragment; `Ok(None)` means the remote
    /// side closed the connection.
    async fn recv(&mut self) -> Result<Option<TranscriptFragment>>;
}

/// An open bidirectional connection to a remote transcription service.
pub trait TranscribeTransport: Send + 'static {
    type Tx: TranscribeTx;
    type Rx: TranscribeRx;

    /// Split into independently owned send and receive halves.
    fn split(self) -> (Self::Tx, Self::Rx);
}

/// Acquires fresh transport connections for a [`TranscribeSystem`].
///
/// Credentials and endpoint details live inside the connector.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    type Transport: TranscribeTransport;

    /// Open a new connection.
    async fn connect(&self) -> Result<Self::Transport>;
}

/// Consume an audio sequence and produce aggregated transcriptions.
///
/// Fragments are space-joined until the remote side marks one final,
/// which yields a single [`Transcription`]. Every background task is
/// cancelled before the output sequence terminates, whether it ends by
/// normal exhaustion, a failed task, or the consumer dropping the stream
/// mid-iteration. A task failure is fatal to the invocation; output
/// already yielded stands.
///
/// The remote side closing before upstream audio was fully delivered
/// surfaces as [`PipelineError::TransportClosed`] rather than a silent
/// end of the sequence.
pub fn transcribe<S, T>(
    audio: S,
    transport: T,
    config: &StageConfig,
) -> impl Stream<Item = Result<Transcription>> + use<S, T>
where
    S: Stream<Item = AudioChunk> + Send + 'static,
    T: TranscribeTransport,
{
    let keepalive_interval = config.keepalive_interval();
    async_stream::try_stream! {
        let (tx, mut rx) = transport.split();
        let mut session = Session::new();
        let sent_all = Arc::new(AtomicBool::new(false));

        let sender = tx.clone();
        let sender_done = Arc::clone(&sent_all);
        session.spawn("sender", async move {
            tokio::pin!(audio);
            while let Some(chunk) = audio.next().await {
                sender.send_audio(chunk).await?;
            }
            // The remote side may close the moment the end-of-audio
            // signal hits the wire, before `finish` itself resolves, so
            // the flag must go up first.
            sender_done.store(true, Ordering::SeqCst);
            sender.finish().await?;
            Ok(())
        });

        let pinger = tx;
        session.spawn("keepalive", async move {
            let mut ticker = tokio::time::interval(keepalive_interval);
            // interval's first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!("sending transport keep-alive");
                pinger.send_keepalive().await?;
            }
        });

        let mut transcript = String::new();
        loop {
            let received = tokio::select! {
                err = session.recv_error() => Err(err),
                fragment = rx.recv() => fragment,
            };
            let fragment = match received {
                Ok(fragment) => fragment,
                Err(err) => {
                    session.shutdown();
                    Err(err)?
                }
            };

            match fragment {
                Some(fragment) => {
                    if !fragment.text.is_empty() {
                        if !transcript.is_empty() {
                            transcript.push(' ');
                        }
                        transcript.push_str(&fragment.text);
                    }
                    if fragment.is_final && !transcript.is_empty() {
                        yield Transcription {
                            text: std::mem::take(&mut transcript),
                            transcribed_at: Instant::now(),
                        };
                    }
                }
                None if sent_all.load(Ordering::SeqCst) => break,
                None => {
                    session.shutdown();
                    Err(PipelineError::TransportClosed(
                        "remote closed before upstream audio was delivered".into(),
                    ))?
                }
            }
        }

        session.shutdown();
    }
}

/// Factory producing transcription channels bound to a connector.
pub struct TranscribeSystem<C> {
    connector: C,
    config: StageConfig,
}

impl<C> TranscribeSystem<C> {
    /// Create a factory over `connector`.
    pub fn new(connector: C, config: StageConfig) -> Self {
        Self { connector, config }
    }
}

#[async_trait]
impl<C: TransportConnector + 'static> System for TranscribeSystem<C> {
    type Channel = StreamChannel<AudioChunk, Transcription>;

    async fn create_async_channel(&self, ready: Option<ReadyCallback>) -> Result<Self::Channel> {
        let transport = self.connector.connect().await?;
        let config = self.config.clone();
        Ok(StreamChannel::new(ready, move |upstream| {
            transcribe(upstream, transport, &config)
        }))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted in-memory transport for exercising the adapter.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    /// Shared observation points for test assertions.
    #[derive(Default)]
    pub struct Wire {
        pub chunks_sent: AtomicUsize,
        pub keepalives: AtomicUsize,
        pub finished: AtomicBool,
    }

    #[derive(Clone)]
    pub struct FakeTx {
        wire: Arc<Wire>,
        script: Arc<Mutex<VecDeque<TranscriptFragment>>>,
        out: Arc<Mutex<Option<mpsc::UnboundedSender<TranscriptFragment>>>>,
        fail_sends: bool,
        eager_close: bool,
    }

    pub struct FakeRx {
        inbox: mpsc::UnboundedReceiver<TranscriptFragment>,
    }

    pub struct FakeTransport {
        tx: FakeTx,
        rx: FakeRx,
    }

    impl FakeTransport {
        /// Transport that echoes one scripted fragment per audio chunk,
        /// then reports remote closure once `finish` is acknowledged.
        pub fn scripted(fragments: Vec<TranscriptFragment>) -> (Self, Arc<Wire>) {
            let wire = Arc::new(Wire::default());
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let transport = Self {
                tx: FakeTx {
                    wire: Arc::clone(&wire),
                    script: Arc::new(Mutex::new(fragments.into())),
                    out: Arc::new(Mutex::new(Some(out_tx))),
                    fail_sends: false,
                    eager_close: false,
                },
                rx: FakeRx { inbox: out_rx },
            };
            (transport, wire)
        }

        /// Transport whose receive side is already closed.
        pub fn remote_closed() -> (Self, Arc<Wire>) {
            let (transport, wire) = Self::scripted(Vec::new());
            transport.tx.out.lock().expect("lock out").take();
            (transport, wire)
        }

        /// Transport that fails every audio send.
        pub fn failing_sends() -> (Self, Arc<Wire>) {
            let (mut transport, wire) = Self::scripted(Vec::new());
            transport.tx.fail_sends = true;
            (transport, wire)
        }

        /// Transport whose remote side closes the moment it receives the
        /// end-of-audio signal, before `finish` itself resolves.
        pub fn closes_on_finish(fragments: Vec<TranscriptFragment>) -> (Self, Arc<Wire>) {
            let (mut transport, wire) = Self::scripted(fragments);
            transport.tx.eager_close = true;
            (transport, wire)
        }
    }

    impl TranscribeTransport for FakeTransport {
        type Tx = FakeTx;
        type Rx = FakeRx;

        fn split(self) -> (FakeTx, FakeRx) {
            (self.tx, self.rx)
        }
    }

    #[async_trait]
    impl TranscribeTx for FakeTx {
        async fn send_audio(&self, _chunk: AudioChunk) -> Result<()> {
            if self.fail_sends {
                return Err(PipelineError::Transport("send failed".into()));
            }
            self.wire.chunks_sent.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().expect("lock script").pop_front();
            if let Some(fragment) = next {
                if let Some(out) = self.out.lock().expect("lock out").as_ref() {
                    let _ = out.send(fragment);
                }
            }
            Ok(())
        }

        async fn send_keepalive(&self) -> Result<()> {
            self.wire.keepalives.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn finish(&self) -> Result<()> {
            self.wire.finished.store(true, Ordering::SeqCst);
            // Remote drains outstanding results, then closes.
            self.out.lock().expect("lock out").take();
            if self.eager_close {
                // The flush acknowledgement is still in flight while the
                // receive side already reports closure.
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TranscribeRx for FakeRx {
        async fn recv(&mut self) -> Result<Option<TranscriptFragment>> {
            Ok(self.inbox.recv().await)
        }
    }
}
