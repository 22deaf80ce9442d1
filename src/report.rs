//! Human-readable report rendering for terminal output.
//!
//! Produces a colored run summary: object inventory, privileged objects,
//! most frequent tags, file operation outcomes, and parse diagnostics.
use colored::*;

use crate::{
    engine::Engine,
    stats::{WriteStats, admin_objects, top_tags},
};

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

pub fn render_summary(engine: &Engine, writes: &WriteStats) -> String {
    render_summary_with_top(engine, writes, 10)
}

pub fn render_summary_with_top(engine: &Engine, writes: &WriteStats, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n",
        "Shihtzu: Directory Dump Ingestion Results".bold().cyan()
    ));

    let (users, groups, computers) = engine.counts();
    out.push_str(&section_header(
        &"Object Inventory".bold().yellow().to_string(),
    ));
    out.push_str(&format!("Users: {users}\n"));
    out.push_str(&format!("Groups: {groups}\n"));
    out.push_str(&format!("Computers: {computers}\n"));
    out.push_str(&format!("Total: {}\n", users + groups + computers));

    let admins = admin_objects(engine.objects());
    out.push_str(&section_header(
        &"Privileged Objects".bold().cyan().to_string(),
    ));
    if admins.is_empty() {
        out.push_str("(No admin-tagged objects)\n");
    } else {
        for (label, name) in admins {
            out.push_str(&format!("  {}: {}\n", name.red(), label));
        }
    }

    let top = top_tags(engine.objects(), top_n);
    out.push_str(&section_header(&"Top Tags".bold().magenta().to_string()));
    if top.is_empty() {
        out.push_str("(No tags derived)\n");
    } else {
        for (tag, count) in top {
            out.push_str(&format!("  {tag}: {count}\n"));
        }
    }

    out.push_str(&section_header(
        &"File Operations".bold().cyan().to_string(),
    ));
    out.push_str(&format!("Created: {}\n", writes.created));
    out.push_str(&format!("Overwritten: {}\n", writes.overwritten));
    out.push_str(&format!("Appended: {}\n", writes.appended));
    out.push_str(&format!("Unchanged: {}\n", writes.unchanged));
    out.push_str(&format!("Skipped: {}\n", writes.skipped));
    if writes.errors > 0 {
        out.push_str(&format!("{}: {}\n", "Errors".red().bold(), writes.errors));
    }

    let stats = engine.parse_stats;
    out.push_str(&section_header(
        &"Parse Diagnostics".bold().blue().to_string(),
    ));
    out.push_str(&format!("Blocks: {}\n", stats.blocks));
    out.push_str(&format!("Orphan lines dropped: {}\n", stats.orphan_lines));
    out.push_str(&format!("Objects skipped: {}\n", stats.skipped_objects));
    out.push_str(&format!(
        "References: {} resolved, {} dangling\n",
        stats.resolved_refs, stats.dangling_refs
    ));

    out
}
