//! Relationship linking: reduces membership attribute values to leaf
//! common-name identities, records bidirectional weak references, and runs
//! the post-link admin detection pass.
use std::collections::HashSet;

use crate::object::DirectoryObject;

/// Well-known privileged group names checked during admin detection.
pub const DEFAULT_ADMIN_GROUPS: &[&str] = &[
    "Domain Admins",
    "Enterprise Admins",
    "Schema Admins",
    "Administrators",
];

/// Normalization applied before identity comparison: trim and case-fold.
/// Synonymous DN spellings beyond this are a known source-format limitation.
pub fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Extract the leaf common name from a distinguished-name value, discarding
/// container, OU, and domain components. `None` when the value does not lead
/// with a CN component.
pub fn leaf_common_name(dn: &str) -> Option<String> {
    let lower = dn.to_ascii_lowercase();
    let end = [",ou=", ",cn=", ",dc="]
        .iter()
        .filter_map(|p| lower.find(p))
        .min()
        .unwrap_or(dn.len());
    let head = dn[..end].trim();
    if head.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("cn=")) {
        let name = head[3..].trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    None
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LinkStats {
    /// References that landed on an object in this batch or a prior run.
    pub resolved: usize,
    /// References kept verbatim for the viewer to resolve, if ever.
    pub dangling: usize,
}

fn count_ref(known: &HashSet<String>, name: &str, stats: &mut LinkStats) {
    if known.contains(&fold(name)) {
        stats.resolved += 1;
    } else {
        stats.dangling += 1;
    }
}

/// Single-pass linker over a fully classified batch. `known` holds folded
/// display names from this batch plus documents rendered in prior runs; it
/// only feeds the resolved/dangling diagnostic, never rendering.
pub fn link_batch<'a, I>(objects: I, known: &HashSet<String>, admin_groups: &[String]) -> LinkStats
where
    I: Iterator<Item = &'a mut DirectoryObject>,
{
    let admin_folded: Vec<String> = admin_groups.iter().map(|g| fold(g)).collect();
    let mut stats = LinkStats::default();
    for obj in objects {
        for value in obj.record.values("member").to_vec() {
            if let Some(name) = leaf_common_name(&value) {
                count_ref(known, &name, &mut stats);
                obj.push_child(name);
            }
        }
        for value in obj.record.values("memberof").to_vec() {
            if let Some(name) = leaf_common_name(&value) {
                count_ref(known, &name, &mut stats);
                obj.push_parent(name);
            }
        }
        if obj
            .record
            .first("admincount")
            .is_some_and(|v| !v.trim().is_empty() && v.trim() != "0")
        {
            obj.push_tag(format!("{} based on native admincount=1", obj.kind.admin_token()));
        }
        let privileged: Vec<String> = obj
            .parent_refs
            .iter()
            .filter(|p| admin_folded.contains(&fold(p)))
            .cloned()
            .collect();
        for group in privileged {
            obj.push_tag(format!(
                "{} due to membership in well-known group {group}",
                obj.kind.admin_token()
            ));
        }
    }
    stats
}
