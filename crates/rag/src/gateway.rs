use tracing::debug;

use crate::capability::{Embedder, SimilarityStore};
use crate::error::{RagError, Result};
use crate::table::{RetrievedRow, Table};

pub const DEFAULT_TOP_K: usize = 3;

/// Embeds a query and runs one nearest-neighbour lookup against a table.
/// Neither call is retried.
pub struct RetrieverGateway<E, S> {
    embedder: E,
    store: S,
}

impl<E: Embedder, S: SimilarityStore> RetrieverGateway<E, S> {
    pub fn new(embedder: E, store: S) -> Self {
        Self { embedder, store }
    }

    pub fn retrieve(&self, table: Table, query: &str, top_k: usize) -> Result<Vec<RetrievedRow>> {
        if top_k == 0 {
            return Err(RagError::InvalidTopK);
        }
        let vector = self.embedder.embed(query).map_err(RagError::Embedding)?;
        let mut rows = self
            .store
            .nearest(table, &vector, top_k)
            .map_err(RagError::Store)?;
        if let Some(stray) = rows.iter().find(|row| row.table() != table) {
            return Err(RagError::TableMismatch {
                requested: table,
                returned: stray.table(),
            });
        }
        rows.truncate(top_k);
        debug!(
            table = table.as_str(),
            query,
            dims = vector.len(),
            rows = rows.len(),
            "retrieved rows"
        );
        Ok(rows)
    }

    /// Resolves a table by name first; names outside [`Table::ALL`] fail
    /// with [`RagError::UnsupportedTable`].
    pub fn retrieve_named(
        &self,
        table: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedRow>> {
        let table = table.parse::<Table>()?;
        self.retrieve(table, query, top_k)
    }
}
