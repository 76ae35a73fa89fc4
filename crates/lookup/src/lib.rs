//! Physician license lookup across public boards.
//!
//! Independent of the retrieval loop: adapters scrape or query a board and
//! normalise what they find into [`LookupRecord`] rows, which
//! [`run_search`] aggregates and writes out.

mod aggregate;
mod docinfo;
mod record;
mod state;

pub use aggregate::{
    adapter_for_state, run_search, run_search_with, write_records, OutputFormat, SearchSummary,
};
pub use docinfo::{extract_profiles, DocInfoAdapter, DOCINFO_BASE_URL};
pub use record::{JsonlWriter, LookupAdapter, LookupQuery, LookupRecord};
pub use state::{FloridaAdapter, TexasAdapter};
