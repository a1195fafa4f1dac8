//! Text-to-speech adapter: sentence sequence in, audio chunk sequence out.

use crate::conversation::Conversation;
use crate::error::Result;
use crate::events::{SentenceChunk, SynthesizedAudio};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use std::sync::{Arc, Mutex};

/// A stream of synthesized audio chunks.
pub type AudioStream = BoxStream<'static, Result<SynthesizedAudio>>;

/// A speech synthesis engine consumed as "send text, receive audio".
#[async_trait]
pub trait Synthesizer: Send {
    /// Start synthesizing `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis cannot be started.
    async fn synthesize(&mut self, text: &str) -> Result<AudioStream>;
}

/// Synthesize each non-empty sentence, flattening the engine's audio
/// chunks into one downstream sequence.
///
/// When `conversation` is supplied, the full response text is appended as
/// a single assistant message once the sentence sequence is exhausted.
pub fn synthesize<S, T>(
    sentences: S,
    mut engine: T,
    conversation: Option<Arc<Mutex<Conversation>>>,
) -> impl Stream<Item = Result<SynthesizedAudio>>
where
    S: Stream<Item = Result<SentenceChunk>> + Send + 'static,
    T: Synthesizer + 'static,
{
    async_stream::try_stream! {
        tokio::pin!(sentences);
        let mut full_response = String::new();
        while let Some(sentence) = sentences.next().await {
            let sentence = sentence?;
            if sentence.text.trim().is_empty() {
                continue;
            }
            full_response.push_str(&sentence.text);
            let mut audio = engine.synthesize(&sentence.text).await?;
            while let Some(chunk) = audio.next().await {
                yield chunk?;
            }
        }

        if let Some(conversation) = conversation {
            if !full_response.is_empty() {
                conversation
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push_assistant(full_response);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use bytes::Bytes;

    /// Yields two fixed audio chunks per sentence.
    struct TwoChunkEngine;

    #[async_trait]
    impl Synthesizer for TwoChunkEngine {
        async fn synthesize(&mut self, text: &str) -> Result<AudioStream> {
            let pcm = Bytes::from(text.as_bytes().to_vec());
            let chunks = vec![
                Ok(SynthesizedAudio {
                    pcm: pcm.clone(),
                    sample_rate: 24_000,
                    is_final: false,
                }),
                Ok(SynthesizedAudio {
                    pcm,
                    sample_rate: 24_000,
                    is_final: true,
                }),
            ];
            Ok(futures_util::stream::iter(chunks).boxed())
        }
    }

    fn sentence(text: &str, is_final: bool) -> Result<SentenceChunk> {
        Ok(SentenceChunk {
            text: text.into(),
            is_final,
        })
    }

    #[tokio::test]
    async fn flattens_audio_and_records_the_full_response() {
        let conversation = Arc::new(Mutex::new(Conversation::new()));
        let sentences = futures_util::stream::iter(vec![
            sentence("Hello there.", false),
            sentence(" Goodbye.", true),
        ]);

        let stream = synthesize(sentences, TwoChunkEngine, Some(Arc::clone(&conversation)));
        let chunks: Vec<SynthesizedAudio> = stream
            .map(|c| c.expect("audio chunk"))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(chunks.len(), 4);

        let conversation = conversation.lock().unwrap();
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].content, "Hello there. Goodbye.");
    }

    #[tokio::test]
    async fn empty_sentences_are_skipped() {
        let conversation = Arc::new(Mutex::new(Conversation::new()));
        let sentences = futures_util::stream::iter(vec![sentence("  ", false)]);

        let stream = synthesize(sentences, TwoChunkEngine, Some(Arc::clone(&conversation)));
        let chunks: Vec<_> = stream.collect::<Vec<_>>().await;
        assert!(chunks.is_empty());
        assert!(conversation.lock().unwrap().messages().is_empty());
    }
}
