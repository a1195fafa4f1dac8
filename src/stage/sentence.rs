//! Sentence chunking of streaming LLM tokens.
//!
//! TTS engines want whole sentences, not individual tokens; this stage
//! accumulates tokens until a sentence-terminator character appears.

use crate::config::StageConfig;
use crate::error::Result;
use crate::events::{LlmToken, SentenceChunk};
use futures_util::{Stream, StreamExt};

/// Accumulate streaming tokens into sentences.
///
/// A sentence completes when a token contains one of the configured
/// terminator characters; accumulations with no content besides
/// whitespace and terminators are discarded. Each completed sentence is
/// held back until the next one completes or upstream ends, so the last
/// chunk emitted always carries `is_final = true`.
pub fn sentence_stream<S>(
    tokens: S,
    config: &StageConfig,
) -> impl Stream<Item = Result<SentenceChunk>> + use<S>
where
    S: Stream<Item = Result<LlmToken>> + Send + 'static,
{
    let terminators = config.sentence_terminators.clone();
    async_stream::try_stream! {
        tokio::pin!(tokens);
        let has_content =
            |text: &str| text.chars().any(|c| !c.is_whitespace() && !terminators.contains(c));

        let mut sentence = String::new();
        let mut pending: Option<String> = None;
        while let Some(token) = tokens.next().await {
            let token = token?;
            sentence.push_str(&token.text);

            if token.is_end {
                break;
            }

            if token.text.chars().any(|c| terminators.contains(c)) {
                let text = std::mem::take(&mut sentence);
                if has_content(&text) {
                    if let Some(completed) = pending.replace(text) {
                        yield SentenceChunk {
                            text: completed,
                            is_final: false,
                        };
                    }
                }
            }
        }

        // Upstream is exhausted; release what was held back, marking the
        // last chunk as the end of the response.
        let tail = std::mem::take(&mut sentence);
        let tail = has_content(&tail).then_some(tail);
        if let Some(completed) = pending.take() {
            yield SentenceChunk {
                text: completed,
                is_final: tail.is_none(),
            };
        }
        if let Some(text) = tail {
            yield SentenceChunk {
                text,
                is_final: true,
            };
        }
    }
}
