//! Error types for the voxkit pipeline core.

/// Top-level error type for pipeline composition.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Write attempted on a channel that has been closed.
    #[error("channel closed")]
    ChannelClosed,

    /// Transport send/receive error inside a stage session.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote transport closed mid-session, before the upstream
    /// sequence was fully delivered.
    #[error("transport closed unexpectedly: {0}")]
    TransportClosed(String),

    /// Audio capture error.
    #[error("capture error: {0}")]
    Capture(String),

    /// Voice activity detection error.
    #[error("VAD error: {0}")]
    Vad(String),

    /// Speech-to-text transcription error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Language model generation error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Background task failure (join error, panicked worker).
    #[error("task error: {0}")]
    Task(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Operation not supported by this factory or channel.
    #[error("not implemented: {0}")]
    Unsupported(&'static str),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
