//! Console rendering of a statistics snapshot.

use std::collections::HashMap;
use std::fmt::Write;

use crate::stats::StatsSnapshot;

/// Renders the three counter tables for human inspection.
pub struct Report<'a> {
    snapshot: &'a StatsSnapshot,
}

impl<'a> Report<'a> {
    pub fn new(snapshot: &'a StatsSnapshot) -> Self {
        Self { snapshot }
    }

    /// Print the full report to stdout.
    pub fn print(&self) {
        print!("{}", self.render());
    }

    /// The full report as a string.
    pub fn render(&self) -> String {
        let mut out = String::new();

        render_table(&mut out, "Status", "Produced Events", &self.snapshot.statuses);
        render_table(&mut out, "Workflow", "Count", &self.snapshot.workflows);
        render_table(&mut out, "Bank", "Updates", &self.snapshot.banks);

        out
    }
}

fn render_table(out: &mut String, key_header: &str, value_header: &str, map: &HashMap<String, u64>) {
    let mut rows: Vec<(&String, &u64)> = map.iter().collect();
    rows.sort_by_key(|(key, _)| key.as_str());

    let key_width = rows
        .iter()
        .map(|(key, _)| key.len())
        .chain([key_header.len(), "Total".len()])
        .max()
        .unwrap_or(0);

    let rule = "-".repeat(key_width + value_header.len() + 2);

    writeln!(out, "\n{key_header:<key_width$}  {value_header}").expect("writing to a String");
    writeln!(out, "{rule}").expect("writing to a String");

    let mut total = 0u64;
    for (key, count) in rows {
        writeln!(out, "{key:<key_width$}  {count}").expect("writing to a String");
        total += count;
    }

    writeln!(out, "{rule}").expect("writing to a String");
    writeln!(out, "{:<key_width$}  {total}", "Total").expect("writing to a String");
}
