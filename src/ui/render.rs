use super::state::{FeedRow, printable};

/// Formats one feed row for the terminal. Own messages are marked and
/// deletable ones carry their id.
pub fn render_row(row: &FeedRow) -> String {
    let marker = if row.mine { ">" } else { " " };
    let mut line = format!("{marker} {}: {}", row.name, row.text);
    if row.deletable {
        line.push_str(&format!("  [#{}]", printable(&row.id)));
    }
    line
}

pub fn render_feed(rows: &[FeedRow]) -> String {
    if rows.is_empty() {
        return "(no messages yet)".to_string();
    }
    rows.iter().map(render_row).collect::<Vec<_>>().join("\n")
}
