use thiserror::Error;

use crate::table::Table;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("unsupported table: {0}")]
    UnsupportedTable(String),
    #[error("top_k must be a positive integer")]
    InvalidTopK,
    #[error("store returned a {returned} row for a {requested} search")]
    TableMismatch { requested: Table, returned: Table },
    #[error("embedding error: {0:#}")]
    Embedding(anyhow::Error),
    #[error("store error: {0:#}")]
    Store(anyhow::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;
