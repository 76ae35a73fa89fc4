//! The three external services the retrieval loop depends on. Each is a
//! single blocking request/response call so tests can substitute fakes.

use anyhow::Result;

use crate::table::{RetrievedRow, Table};
use crate::transcript::Transcript;

pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub trait Generator {
    fn generate(&self, transcript: &Transcript) -> Result<String>;
}

pub trait SimilarityStore {
    /// Rows of `table` ordered by similarity to `vector`, most similar first,
    /// at most `limit` of them.
    fn nearest(&self, table: Table, vector: &[f32], limit: usize) -> Result<Vec<RetrievedRow>>;
}

impl<T: Embedder + ?Sized> Embedder for &T {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }
}

impl<T: Generator + ?Sized> Generator for &T {
    fn generate(&self, transcript: &Transcript) -> Result<String> {
        (**self).generate(transcript)
    }
}

impl<T: SimilarityStore + ?Sized> SimilarityStore for &T {
    fn nearest(&self, table: Table, vector: &[f32], limit: usize) -> Result<Vec<RetrievedRow>> {
        (**self).nearest(table, vector, limit)
    }
}
