use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::{info, warn};

use crate::docinfo::DocInfoAdapter;
use crate::record::{JsonlWriter, LookupAdapter, LookupQuery, LookupRecord};
use crate::state::{FloridaAdapter, TexasAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Jsonl,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            OutputFormat::Csv
        } else {
            OutputFormat::Jsonl
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchSummary {
    pub rows: usize,
    pub skipped_states: Vec<String>,
}

/// State board adapter registered for a two-letter code, if any.
pub fn adapter_for_state(code: &str) -> Option<Box<dyn LookupAdapter>> {
    match code.trim().to_uppercase().as_str() {
        "FL" => Some(Box::new(FloridaAdapter)),
        "TX" => Some(Box::new(TexasAdapter)),
        _ => None,
    }
}

/// DocInfo first, then each requested state board. Nothing is written when
/// no adapter returns a row.
pub fn run_search(query: &LookupQuery, states: &[String], out: &Path) -> Result<SearchSummary> {
    run_search_with(&DocInfoAdapter::new(Client::new()), query, states, out)
}

/// [`run_search`] with the national adapter supplied by the caller.
pub fn run_search_with(
    national: &dyn LookupAdapter,
    query: &LookupQuery,
    states: &[String],
    out: &Path,
) -> Result<SearchSummary> {
    let mut rows = national
        .search(query)
        .with_context(|| format!("{} lookup failed", national.name()))?;
    let mut summary = SearchSummary::default();

    for state in states {
        let Some(adapter) = adapter_for_state(state) else {
            warn!(state = %state, "no lookup adapter for state, skipping");
            summary.skipped_states.push(state.clone());
            continue;
        };
        let found = adapter
            .search(&query.for_state(state))
            .with_context(|| format!("{} lookup failed", adapter.name()))?;
        info!(adapter = adapter.name(), rows = found.len(), "state lookup");
        rows.extend(found);
    }

    summary.rows = rows.len();
    if rows.is_empty() {
        return Ok(summary);
    }
    let file = File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    write_records(BufWriter::new(file), &rows, OutputFormat::from_path(out))?;
    info!(rows = rows.len(), path = %out.display(), "lookup results saved");
    Ok(summary)
}

pub fn write_records<W: Write>(
    writer: W,
    rows: &[LookupRecord],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut csv = csv::Writer::from_writer(writer);
            for row in rows {
                csv.serialize(row)?;
            }
            csv.flush()?;
        }
        OutputFormat::Jsonl => {
            let mut jsonl = JsonlWriter::new(writer);
            for row in rows {
                jsonl.write_record(row)?;
            }
            jsonl.into_inner().flush()?;
        }
    }
    Ok(())
}
