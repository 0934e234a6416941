//! Summary report formatting.
//!
//! Four columns: `TABLE | RECORDS | FAILED | DATA LOAD TIME`. Every cell is
//! padded to the widest value in its column, columns are separated by
//! `  |  `, and a horizontal rule follows each row.

use crate::core::schema::SummaryRow;

const HEADERS: [&str; 4] = ["TABLE", "RECORDS", "FAILED", "DATA LOAD TIME"];
const SEPARATOR: &str = "  |  ";

/// Render the summary table.
pub fn render_summary(rows: &[SummaryRow]) -> String {
    let cells: Vec<[String; 4]> = rows
        .iter()
        .map(|r| {
            [
                r.qualified_name.clone(),
                r.rows_attempted.to_string(),
                r.rows_failed.to_string(),
                format!("{:.2}s", r.elapsed_seconds),
            ]
        })
        .collect();

    let mut widths: [usize; 4] = [0; 4];
    for (i, h) in HEADERS.iter().enumerate() {
        widths[i] = h.len();
    }
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let total_width =
        widths.iter().sum::<usize>() + SEPARATOR.len() * (HEADERS.len() - 1);
    let rule = "-".repeat(total_width);

    let mut out = String::new();
    out.push_str(&format_row(&HEADERS.map(String::from), &widths));
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    for row in &cells {
        out.push_str(&format_row(row, &widths));
        out.push('\n');
        out.push_str(&rule);
        out.push('\n');
    }
    out
}

fn format_row(cells: &[String; 4], widths: &[usize; 4]) -> String {
    cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, w)| format!("{:<width$}", cell, width = w))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, attempted: i64, failed: i64, secs: f64) -> SummaryRow {
        SummaryRow {
            qualified_name: name.to_string(),
            rows_attempted: attempted,
            rows_failed: failed,
            elapsed_seconds: secs,
        }
    }

    #[test]
    fn test_header_and_rule_present() {
        let out = render_summary(&[row("db.t", 10, 0, 1.5)]);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("TABLE"));
        assert!(lines[0].contains("DATA LOAD TIME"));
        assert!(lines[1].chars().all(|c| c == '-'));
    }

    #[test]
    fn test_rule_after_every_row() {
        let out = render_summary(&[row("db.a", 1, 0, 0.1), row("db.b", 2, 1, 0.2)]);
        let rules = out
            .lines()
            .filter(|l| !l.is_empty() && l.chars().all(|c| c == '-'))
            .count();
        // One after the header plus one per data row.
        assert_eq!(rules, 3);
    }

    #[test]
    fn test_cells_padded_to_widest() {
        let out = render_summary(&[
            row("db.short", 5, 0, 0.1),
            row("db.much_longer_table_name", 123456, 42, 12.34),
        ]);
        let lines: Vec<&str> = out.lines().collect();
        // All content rows share one width.
        assert_eq!(lines[0].len(), lines[2].len());
        assert_eq!(lines[2].len(), lines[4].len());
        assert!(lines[4].starts_with("db.much_longer_table_name"));
        assert!(lines[2].contains("db.short "));
    }

    #[test]
    fn test_values_formatted() {
        let out = render_summary(&[row("db.t", 100, 1, 2.0)]);
        assert!(out.contains("100"));
        assert!(out.contains("2.00s"));
        assert!(out.contains("  |  "));
    }
}
