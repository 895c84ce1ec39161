//! Final session statistics report.

use std::fmt::Write;

use girder_protocol::StatsMap;

/// Formats the end-of-session counters as an aligned table.
pub(crate) fn format_statistics(
    total_bytes: u64,
    largest_body: usize,
    counters: &StatsMap,
) -> String {
    let mut table = String::new();
    let _ = writeln!(
        table,
        "--------------- Statistic Counters Stats ---------------"
    );
    let _ = writeln!(table, "Total bytes : {total_bytes:>9}");
    let _ = writeln!(table, "Largest body: {largest_body:>9}");
    let _ = writeln!(table);
    let _ = writeln!(table, "--- Methods called ---");
    let longest = counters.keys().map(|name| name.len()).max().unwrap_or(0);
    for (name, count) in counters {
        let _ = writeln!(table, "{name:>longest$} {count:>9}");
    }
    table
}
