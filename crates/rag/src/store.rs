use anyhow::anyhow;
use bytemuck::{cast_slice, try_cast_slice};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::capability::SimilarityStore;
use crate::error::{RagError, Result};
use crate::table::{HospitalRow, PhysicianRow, RetrievedRow, Table};

/// SQLite-backed store of physician and hospital records with their
/// embeddings. Similarity is cosine similarity computed in process.
#[derive(Clone)]
pub struct RagStore {
    path: PathBuf,
}

impl RagStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    pub fn init(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS physicians (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                specialty TEXT NOT NULL DEFAULT '',
                city TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL DEFAULT '',
                profile TEXT NOT NULL DEFAULT '',
                embedding BLOB NOT NULL
            );
            CREATE TABLE IF NOT EXISTS hospitals (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                city TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                embedding BLOB NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn insert_physician(&self, record: &PhysicianInsert) -> Result<i64> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO physicians (id, name, specialty, city, state, profile, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.name,
                record.specialty,
                record.city,
                record.state,
                record.profile,
                encode_embedding(&record.embedding),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_hospital(&self, record: &HospitalInsert) -> Result<i64> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO hospitals (id, name, city, state, description, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.name,
                record.city,
                record.state,
                record.description,
                encode_embedding(&record.embedding),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn count(&self, table: Table) -> Result<usize> {
        let conn = self.connection()?;
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn search(
        &self,
        table: Table,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedRow>> {
        let conn = self.connection()?;
        let sql = match table {
            Table::Physicians => {
                "SELECT id, name, specialty, city, state, profile, embedding FROM physicians"
            }
            Table::Hospitals => {
                "SELECT id, name, city, state, description, embedding FROM hospitals"
            }
        };
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut hits = Vec::new();
        let mut mismatched = 0usize;
        while let Some(row) = rows.next()? {
            let hit = match table {
                Table::Physicians => {
                    let embedding: Vec<u8> = row.get(6)?;
                    let (score, same_width) = score_blob(query_embedding, &embedding)?;
                    mismatched += usize::from(!same_width);
                    RetrievedRow::Physician(physician_from_row(row, score)?)
                }
                Table::Hospitals => {
                    let embedding: Vec<u8> = row.get(5)?;
                    let (score, same_width) = score_blob(query_embedding, &embedding)?;
                    mismatched += usize::from(!same_width);
                    RetrievedRow::Hospital(hospital_from_row(row, score)?)
                }
            };
            hits.push(hit);
        }
        if mismatched > 0 {
            warn!(
                table = table.as_str(),
                rows = mismatched,
                query_dims = query_embedding.len(),
                "stored embedding width differs from query embedding"
            );
        }
        hits.sort_by(|a, b| {
            b.similarity()
                .partial_cmp(&a.similarity())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        debug!(table = table.as_str(), hits = hits.len(), "similarity search");
        Ok(hits)
    }
}

impl SimilarityStore for RagStore {
    fn nearest(
        &self,
        table: Table,
        vector: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<RetrievedRow>> {
        Ok(self.search(table, vector, limit)?)
    }
}

#[derive(Debug, Clone)]
pub struct PhysicianInsert {
    pub id: Option<i64>,
    pub name: String,
    pub specialty: String,
    pub city: String,
    pub state: String,
    pub profile: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct HospitalInsert {
    pub id: Option<i64>,
    pub name: String,
    pub city: String,
    pub state: String,
    pub description: String,
    pub embedding: Vec<f32>,
}

fn physician_from_row(row: &Row<'_>, similarity: f32) -> rusqlite::Result<PhysicianRow> {
    Ok(PhysicianRow {
        id: row.get(0)?,
        name: row.get(1)?,
        specialty: row.get(2)?,
        city: row.get(3)?,
        state: row.get(4)?,
        profile: row.get(5)?,
        similarity,
    })
}

fn hospital_from_row(row: &Row<'_>, similarity: f32) -> rusqlite::Result<HospitalRow> {
    Ok(HospitalRow {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        state: row.get(3)?,
        description: row.get(4)?,
        similarity,
    })
}

/// Embeddings are stored as little-endian f32.
fn encode_embedding(values: &[f32]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        cast_slice::<f32, u8>(values).to_vec()
    } else {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(RagError::Store(anyhow!("invalid embedding blob")));
    }
    if cfg!(target_endian = "little") {
        // Blobs read back from SQLite are not guaranteed to be 4-byte aligned.
        if let Ok(values) = try_cast_slice::<u8, f32>(blob) {
            return Ok(values.to_vec());
        }
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn score_blob(query: &[f32], blob: &[u8]) -> Result<(f32, bool)> {
    let stored = decode_embedding(blob)?;
    Ok((
        cosine_similarity(query, &stored),
        stored.len() == query.len(),
    ))
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}
