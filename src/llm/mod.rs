pub mod anthropic;

pub use anthropic::AnthropicClient;

use std::future::Future;

use crate::models::GenerationRequest;

/// Seam between the pipeline and the completion backend, so the loop can be
/// exercised against a scripted provider.
pub trait CompletionProvider {
    /// Generated text, or `None` after the provider logged its failure.
    /// Implementations never surface an error across this boundary.
    fn complete(&self, request: &GenerationRequest) -> impl Future<Output = Option<String>>;
}
