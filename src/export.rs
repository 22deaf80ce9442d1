//! CSV export of the object index: one row per object with its variant,
//! document name, identity, and derived tags. Useful for grepping and
//! spreadsheet triage outside the viewer.
use std::path::Path;

use anyhow::Result;
use csv::Writer;
use serde::Serialize;

use crate::engine::Engine;

#[derive(Debug, Serialize)]
struct IndexRow<'a> {
    kind: &'a str,
    name: &'a str,
    identity: &'a str,
    tags: String,
}

pub fn save_object_index_csv<P: AsRef<Path>>(engine: &Engine, path: P) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    for obj in engine.objects() {
        wtr.serialize(IndexRow {
            kind: obj.kind.label(),
            name: &obj.display_name,
            identity: &obj.identity,
            tags: obj.tags.join("; "),
        })?;
    }
    wtr.flush()?;
    Ok(())
}
