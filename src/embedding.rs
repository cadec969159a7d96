//! Embedding model adapter.
//!
//! The pipeline talks to embedding providers through [`Embedder`]. The
//! trait is synchronous and infallible about shape only: implementations
//! report provider failures through `anyhow`, and the pipeline wraps them
//! into [`crate::PipelineError::Embedding`].

/// Adapter over a text embedding model.
pub trait Embedder: Send + Sync {
    /// Output dimensionality. Must stay constant for the adapter's lifetime.
    fn dim(&self) -> usize;

    /// Embeds a batch of chunk texts, one vector per input, in input order.
    ///
    /// Every returned vector must have [`Self::dim`] components.
    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embeds a single query string.
    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text])?;
        batch
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))
    }
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}
