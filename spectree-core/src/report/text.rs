//! Plain text rendering, one tab-separated line per row

use std::fmt::Write;

use super::Report;

pub fn render(report: &Report) -> String {
    let mut out = String::new();
    match &report.generated {
        Some(date) => {
            let _ = writeln!(out, "{} as of {}", report.title, date);
        }
        None => {
            let _ = writeln!(out, "{}", report.title);
        }
    }
    for line in &report.summary {
        let _ = writeln!(out, "{}: {}", line.label, line.count);
    }

    for table in &report.tables {
        let _ = writeln!(out, "\n== {} ({}) [{}]", table.heading, table.count, table.id);
        if let Some(note) = &table.omitted {
            let _ = writeln!(out, "{}", note);
            continue;
        }
        let _ = writeln!(out, "# {}", table.columns.join("\t"));
        for row in &table.rows {
            let cells: Vec<&str> = row.cells.iter().map(|c| c.text.as_str()).collect();
            let _ = writeln!(out, "{}", cells.join("\t"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::{Cell, Row, Table};
    use super::*;

    #[test]
    fn test_render() {
        let report = Report {
            title: "cauldron (mga10) Spec Build Report".into(),
            generated: None,
            summary: vec![],
            tables: vec![Table {
                id: "missingremote".into(),
                heading: "Spec files with no matching SRPM of any version".into(),
                description: String::new(),
                columns: vec!["Maintainer".into(), "Package".into()],
                count: 1,
                rows: vec![Row {
                    class: None,
                    cells: vec![Cell::text("?"), Cell::link("bar", "https://svn.example.org/bar")],
                }],
                omitted: None,
            }],
        };
        let text = render(&report);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "cauldron (mga10) Spec Build Report");
        assert!(lines.contains(&"# Maintainer\tPackage"));
        assert_eq!(*lines.last().unwrap(), "?\tbar");
    }
}
