//! Factory seam for composing external services into concrete channels.

use crate::channel::{AsyncChannel, ReadyCallback};
use crate::error::Result;
use async_trait::async_trait;

/// A stateless factory producing configured channels.
///
/// External resources (credentials, transport connectors, upstream
/// sequences) are fields of the concrete factory; each call returns a
/// freshly owned channel wired to them. Factories that expose a surface
/// they do not support should return [`crate::PipelineError::Unsupported`].
#[async_trait]
pub trait System: Send + Sync {
    /// The channel type this factory produces.
    type Channel: AsyncChannel;

    /// Construct a fresh channel bound to this factory's resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the external resource (for example a transport
    /// connection) cannot be acquired.
    async fn create_async_channel(&self, ready: Option<ReadyCallback>) -> Result<Self::Channel>;
}
