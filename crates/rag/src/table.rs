use std::fmt;
use std::str::FromStr;

use crate::error::RagError;

/// The retrievable tables. Adding a table means adding a variant here and a
/// row type below; the loop itself never branches on table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Physicians,
    Hospitals,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Physicians, Table::Hospitals];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Physicians => "physicians",
            Table::Hospitals => "hospitals",
        }
    }

    pub fn citation_tag(&self) -> &'static str {
        match self {
            Table::Physicians => "PHYSICIANS",
            Table::Hospitals => "HOSPITALS",
        }
    }

    pub fn citation(&self, id: i64) -> String {
        format!("[{}_ID:{}]", self.citation_tag(), id)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = RagError;

    /// Exact, case-sensitive match on the table name.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|table| table.as_str() == value)
            .ok_or_else(|| RagError::UnsupportedTable(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicianRow {
    pub id: i64,
    pub name: String,
    pub specialty: String,
    pub city: String,
    pub state: String,
    pub profile: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HospitalRow {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub description: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedRow {
    Physician(PhysicianRow),
    Hospital(HospitalRow),
}

impl RetrievedRow {
    pub fn table(&self) -> Table {
        match self {
            RetrievedRow::Physician(_) => Table::Physicians,
            RetrievedRow::Hospital(_) => Table::Hospitals,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            RetrievedRow::Physician(row) => row.id,
            RetrievedRow::Hospital(row) => row.id,
        }
    }

    pub fn similarity(&self) -> f32 {
        match self {
            RetrievedRow::Physician(row) => row.similarity,
            RetrievedRow::Hospital(row) => row.similarity,
        }
    }

    pub fn citation(&self) -> String {
        self.table().citation(self.id())
    }
}
