//! Voxkit: composable concurrency toolkit for real-time speech pipelines.
//!
//! Real-time voice pipelines (microphone → STT → LLM → TTS → playback)
//! combine remote streaming services with local CPU/GPU-bound inference.
//! This crate provides the substrate that makes composing them tractable:
//!
//! - **Channel**: a uniform bidirectional typed-stream abstraction, with a
//!   queue-backed variant for bridging callback-driven producers
//! - **Stage adapters**: per-service wrappers turning one async chunk
//!   sequence into another, with scoped background-task sessions
//! - **PubSub**: an ordered, filtered fan-out event bus with a
//!   thread-safe publishing handoff
//! - **System**: a factory seam for wiring external resources into
//!   concrete channels
//!
//! The individual services (transcription, generation, synthesis, voice
//! activity detection, capture) appear only as the narrow streaming
//! contracts they must satisfy; this crate never speaks their wire
//! protocols itself.

pub mod capture;
pub mod channel;
pub mod config;
pub mod conversation;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod pubsub;
pub mod session;
pub mod stage;
pub mod system;

pub use channel::{AsyncChannel, Channel, QueueChannel, ReadyCallback, StreamChannel};
pub use config::PipelineConfig;
pub use conversation::Conversation;
pub use error::{PipelineError, Result};
pub use events::{EventKind, PipelineEvent};
pub use pubsub::{PubSub, PubSubChannel, PubSubHandle, Subscriber};
pub use session::Session;
pub use system::System;
