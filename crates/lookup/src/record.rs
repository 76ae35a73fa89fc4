use std::io::Write;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Normalised result row. Field order is the output column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LookupRecord {
    pub source: String,
    pub full_name: String,
    pub degree: String,
    pub states: String,
    pub license_number: String,
    pub status: String,
    pub profile_url: String,
    pub board_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct LookupQuery {
    pub first: String,
    pub last: String,
    pub middle: String,
    pub state: String,
}

impl LookupQuery {
    /// "first middle last" with empty parts dropped.
    pub fn full_name(&self) -> String {
        [&self.first, &self.middle, &self.last]
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn for_state(&self, state: &str) -> Self {
        Self {
            state: state.to_string(),
            ..self.clone()
        }
    }
}

pub trait LookupAdapter {
    fn name(&self) -> &'static str;

    fn search(&self, query: &LookupQuery) -> Result<Vec<LookupRecord>>;
}

pub struct JsonlWriter<W> {
    writer: W,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut buf = serde_json::to_vec(record)?;
        buf.push(b'\n');
        self.writer.write_all(&buf)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
