use anyhow::Result;
use tracing::debug;

use crate::record::{LookupAdapter, LookupQuery, LookupRecord};

/// Florida DOH MQA license verification. The board's search sits behind a
/// browser-only flow with CAPTCHA, so this adapter reports no rows.
pub struct FloridaAdapter;

impl LookupAdapter for FloridaAdapter {
    fn name(&self) -> &'static str {
        "florida"
    }

    fn search(&self, query: &LookupQuery) -> Result<Vec<LookupRecord>> {
        debug!(name = %query.full_name(), "florida lookup is not automated");
        Ok(Vec::new())
    }
}

/// Texas Medical Board lookup tool; same constraint as [`FloridaAdapter`].
pub struct TexasAdapter;

impl LookupAdapter for TexasAdapter {
    fn name(&self) -> &'static str {
        "texas"
    }

    fn search(&self, query: &LookupQuery) -> Result<Vec<LookupRecord>> {
        debug!(name = %query.full_name(), "texas lookup is not automated");
        Ok(Vec::new())
    }
}
