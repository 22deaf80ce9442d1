//! Smart-append reconciliation over structured document sections.
//!
//! The merge is an explicit diff over parsed sections rather than text
//! concatenation, which is what makes idempotence a provable property:
//! accumulated sections are ordered set unions, derived sections are
//! wholesale replaced, analyst content passes through untouched.
use std::collections::HashSet;

use crate::document::{Document, RECOVERY_HEADER};

/// Ordered set union: existing lines keep their order, fresh lines append
/// only when genuinely new (exact string equality).
fn union(existing: &[String], fresh: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let mut out = existing.to_vec();
    for line in fresh {
        if seen.insert(line.as_str()) {
            out.push(line.clone());
        }
    }
    out
}

/// Reconcile a freshly built document against the previously stored one.
///
/// Raw Data, Tags, Members and Parents union; UAC Values and Clean
/// Timestamps are replaced by the recomputed values so stale decodes never
/// linger; User Defined is copied verbatim from the existing document.
pub fn reconcile(existing: &Document, fresh: &Document) -> Document {
    Document {
        raw_data: union(&existing.raw_data, &fresh.raw_data),
        tags: union(&existing.tags, &fresh.tags),
        members: union(&existing.members, &fresh.members),
        parents: union(&existing.parents, &fresh.parents),
        uac_values: fresh.uac_values.clone(),
        time_values: fresh.time_values.clone(),
        user_defined: existing.user_defined.clone(),
    }
}

/// Fallback for an existing document that would not parse: preserve it
/// byte-for-byte and append the fresh render below a marked heading.
pub fn recovery_append(existing_text: &str, fresh: &Document) -> String {
    let mut out = existing_text.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(RECOVERY_HEADER);
    out.push('\n');
    out.push('\n');
    out.push_str(&fresh.render());
    out
}
