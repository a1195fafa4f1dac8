//! Chat generation contract and bridges for blocking inference engines.

use crate::conversation::Conversation;
use crate::error::Result;
use crate::events::LlmToken;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// A stream of generated tokens.
pub type TokenStream = BoxStream<'static, Result<LlmToken>>;

/// A language model consumed as "send chat messages, receive tokens".
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start streaming a response to `conversation`.
    ///
    /// # Errors
    ///
    /// Returns an error if generation cannot be started.
    async fn stream_chat(&self, conversation: &Conversation) -> Result<TokenStream>;
}

/// Bridge a blocking, iterator-producing inference call into a
/// [`TokenStream`].
///
/// `produce` runs entirely on a `spawn_blocking` worker thread, model
/// loading included, so GPU/CPU-bound generation never stalls the
/// cooperative scheduler. Dropping the stream stops the worker at its
/// next token.
pub fn token_stream_blocking<F, I>(produce: F) -> TokenStream
where
    F: FnOnce() -> I + Send + 'static,
    I: Iterator<Item = Result<LlmToken>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    tokio::task::spawn_blocking(move || {
        for token in produce() {
            if tx.blocking_send(token).is_err() {
                break;
            }
        }
    });
    ReceiverStream::new(rx).boxed()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    struct CannedModel {
        reply: &'static str,
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn stream_chat(&self, _conversation: &Conversation) -> Result<TokenStream> {
            let words: Vec<Result<LlmToken>> = self
                .reply
                .split_inclusive(' ')
                .map(|w| {
                    Ok(LlmToken {
                        text: w.to_owned(),
                        is_end: false,
                    })
                })
                .collect();
            Ok(token_stream_blocking(move || words.into_iter()))
        }
    }

    #[tokio::test]
    async fn blocking_generation_streams_tokens() {
        let model = CannedModel {
            reply: "Fine, thanks for asking.",
        };
        let mut conversation = Conversation::new();
        conversation.push_user("How are you?");

        let stream = model.stream_chat(&conversation).await.unwrap();
        let text: String = stream
            .map(|t| t.expect("token").text)
            .collect::<Vec<_>>()
            .await
            .concat();
        assert_eq!(text, "Fine, thanks for asking.");
    }
}
