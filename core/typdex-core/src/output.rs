//! Streaming output helpers (made by FontLab https://www.fontlab.com/)

use std::io::Write;

use anyhow::Result;

use crate::query::{FamilyGroup, SearchResults};

/// Write search results as one prettified JSON document.
pub fn write_json_pretty(results: &SearchResults, mut w: impl Write) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    w.write_all(json.as_bytes())?;
    Ok(())
}

/// Write one family aggregate per line (NDJSON).
pub fn write_ndjson(items: &[FamilyGroup], mut w: impl Write) -> Result<()> {
    for item in items {
        let line = serde_json::to_string(item)?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}
