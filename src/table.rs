//! Plain-text table rendering for terminal output.
//!
//! Numeric cells are right-aligned, everything else left-aligned. Control
//! characters inside cells are flattened to spaces so each row stays on one
//! line.

use std::fmt::Write as _;

use crate::{data::Value, frame::Table};

const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

/// Renders `table`, showing at most `limit` rows when given.
pub fn render_table(table: &Table, limit: Option<usize>) -> String {
    let shown = limit.unwrap_or(usize::MAX).min(table.row_count());
    let rows: Vec<Vec<(String, Align)>> = table.rows()[..shown]
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Some(value) => (clean(&value.as_display()), align_for(value)),
                    None => (String::new(), Align::Left),
                })
                .collect()
        })
        .collect();
    let mut output = render_cells(table.headers(), &rows);
    if shown < table.row_count() {
        let _ = writeln!(output, "... {} more row(s)", table.row_count() - shown);
    }
    output
}

/// Renders pre-formatted string rows, all left-aligned.
pub fn render_rows(headers: &[String], rows: &[Vec<String>]) -> String {
    let cells: Vec<Vec<(String, Align)>> = rows
        .iter()
        .map(|row| row.iter().map(|c| (clean(c), Align::Left)).collect())
        .collect();
    render_cells(headers, &cells)
}

fn render_cells(headers: &[String], rows: &[Vec<(String, Align)>]) -> String {
    let headers: Vec<String> = headers.iter().map(|h| clean(h)).collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| width_of(h).max(1)).collect();
    for row in rows {
        for (idx, (text, _)) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(width_of(text));
        }
    }

    let mut output = String::new();
    let header_cells: Vec<(String, Align)> =
        headers.into_iter().map(|h| (h, Align::Left)).collect();
    let _ = writeln!(output, "{}", format_line(&header_cells, &widths));
    let rule: Vec<(String, Align)> = widths
        .iter()
        .map(|w| ("-".repeat(*w), Align::Left))
        .collect();
    let _ = writeln!(output, "{}", format_line(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_line(row, &widths));
    }
    output
}

fn format_line(cells: &[(String, Align)], widths: &[usize]) -> String {
    let mut line = cells
        .iter()
        .zip(widths)
        .map(|((text, align), width)| {
            let padding = " ".repeat(width.saturating_sub(width_of(text)));
            match align {
                Align::Left => format!("{text}{padding}"),
                Align::Right => format!("{padding}{text}"),
            }
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    line.truncate(line.trim_end().len());
    line
}

fn align_for(value: &Value) -> Align {
    if value.is_numeric() {
        Align::Right
    } else {
        Align::Left
    }
}

fn width_of(text: &str) -> usize {
    text.chars().count()
}

fn clean(text: &str) -> String {
    text.chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect()
}

pub fn print_table(table: &Table, limit: Option<usize>) {
    print!("{}", render_table(table, limit));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_align_right_and_text_left() {
        let table = Table::from_rows(
            vec!["region".into(), "amount".into()],
            vec![
                vec![Some("east".into()), Some(Value::Integer(15))],
                vec![Some("west".into()), Some(Value::Integer(7))],
            ],
        )
        .unwrap();
        let rendered = render_table(&table, None);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec!["region  amount", "------  ------", "east        15", "west         7"]
        );
    }

    #[test]
    fn limit_reports_hidden_rows() {
        let table = Table::from_rows(
            vec!["n".into()],
            (0..5).map(|i| vec![Some(Value::Integer(i))]).collect(),
        )
        .unwrap();
        let rendered = render_table(&table, Some(2));
        assert_eq!(rendered.lines().count(), 5);
        assert!(rendered.ends_with("... 3 more row(s)\n"));
    }

    #[test]
    fn control_characters_are_flattened() {
        let rendered = render_rows(&["note".to_string()], &[vec!["a\nb\tc".to_string()]]);
        assert_eq!(rendered.lines().nth(2), Some("a b c"));
    }
}
