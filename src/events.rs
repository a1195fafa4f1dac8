//! Message and event types passed between pipeline stages.
//!
//! Every payload that can travel over the event bus is wrapped in
//! [`PipelineEvent`], a closed tagged union. Subscription filters match on
//! [`EventKind`] tags structurally, never on runtime type inspection.

use bytes::Bytes;
use std::time::Instant;

/// A chunk of raw PCM audio from a capture source.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw PCM bytes, mono, at `sample_rate`.
    pub pcm: Bytes,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Timestamp when this chunk was captured.
    pub captured_at: Instant,
}

impl AudioChunk {
    /// Build a chunk captured now.
    pub fn new(pcm: Bytes, sample_rate: u32) -> Self {
        Self {
            pcm,
            sample_rate,
            captured_at: Instant::now(),
        }
    }
}

/// A partial transcription result received from an STT transport.
#[derive(Debug, Clone)]
pub struct TranscriptFragment {
    /// Transcribed text for this fragment (may be empty).
    pub text: String,
    /// Whether the remote side marked this fragment as ending an utterance.
    pub is_final: bool,
}

/// A complete utterance transcription aggregated from fragments.
#[derive(Debug, Clone)]
pub struct Transcription {
    /// The transcribed text.
    pub text: String,
    /// Time the aggregated transcription completed.
    pub transcribed_at: Instant,
}

/// A single token emitted by an LLM during streaming generation.
#[derive(Debug, Clone)]
pub struct LlmToken {
    /// The decoded text fragment.
    pub text: String,
    /// Whether this is the final token in the response.
    pub is_end: bool,
}

/// A sentence accumulated from LLM tokens, ready for TTS.
#[derive(Debug, Clone)]
pub struct SentenceChunk {
    /// Complete sentence text.
    pub text: String,
    /// Whether this is the last sentence in the response.
    pub is_final: bool,
}

/// Synthesized audio from TTS, ready for playback.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// Raw PCM bytes.
    pub pcm: Bytes,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Whether this is the last chunk of the current response.
    pub is_final: bool,
}

/// A detected span of voice activity within one audio chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySpan {
    /// Span start, milliseconds from the chunk start.
    pub start_ms: u32,
    /// Span end, milliseconds from the chunk start.
    pub end_ms: u32,
}

/// Voice activity detected in one audio chunk.
#[derive(Debug, Clone)]
pub struct VoiceActivity {
    /// Detected speech spans, in chunk order.
    pub spans: Vec<ActivitySpan>,
}

/// Low-latency control events (playback state, interruption, teardown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Playback of a synthesized response started.
    PlaybackStarted,
    /// Playback of a synthesized response finished.
    PlaybackFinished,
    /// The user spoke over the assistant; cancel the current response.
    BargeIn,
    /// The pipeline is shutting down.
    Shutdown,
}

/// Every event that can travel over the pipeline event bus.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Raw captured audio.
    Audio(AudioChunk),
    /// Voice activity detected in captured audio.
    Activity(VoiceActivity),
    /// A complete user transcription.
    Transcription(Transcription),
    /// A streaming LLM token.
    Token(LlmToken),
    /// A sentence chunked from LLM tokens.
    Sentence(SentenceChunk),
    /// A chunk of synthesized assistant audio.
    Synthesized(SynthesizedAudio),
    /// Pipeline control.
    Control(ControlEvent),
}

/// Variant tag for [`PipelineEvent`], used by subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Audio,
    Activity,
    Transcription,
    Token,
    Sentence,
    Synthesized,
    Control,
}

impl PipelineEvent {
    /// The variant tag of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Audio(_) => EventKind::Audio,
            Self::Activity(_) => EventKind::Activity,
            Self::Transcription(_) => EventKind::Transcription,
            Self::Token(_) => EventKind::Token,
            Self::Sentence(_) => EventKind::Sentence,
            Self::Synthesized(_) => EventKind::Synthesized,
            Self::Control(_) => EventKind::Control,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let event = PipelineEvent::Sentence(SentenceChunk {
            text: "hello.".into(),
            is_final: false,
        });
        assert_eq!(event.kind(), EventKind::Sentence);
        assert_ne!(event.kind(), EventKind::Token);
    }
}
