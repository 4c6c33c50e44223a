//! XHTML rendering
//!
//! Every table carries its id and a comment showing how to pull it out as
//! CSV with xmlstarlet.

use std::fmt::Write;

use super::{Cell, Report, Table};

const HEADER: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en"><head>
<meta name="GENERATOR" content="spectree" />
"#;

const STYLE: &str = r#"<style type="text/css">
/*<![CDATA[*/
  .release {
    background-color: #e0e0ff;
  }
  .distrib {
    background-color: #ffe0e0;
  }
  td, th {
    padding: 0 0.5em;
    text-align: left;
  }
/*]]>*/
</style>
</head>
<body>
"#;

const FOOTER: &str = "</body>\n</html>\n";

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render(report: &Report) -> String {
    let mut html = String::new();
    html.push_str(HEADER);
    let _ = writeln!(html, "<title>{}</title>", escape(&report.title));
    html.push_str(STYLE);

    match &report.generated {
        Some(date) => {
            let _ = writeln!(
                html,
                "<h1>{} as of {}</h1>",
                escape(&report.title),
                escape(date)
            );
        }
        None => {
            let _ = writeln!(html, "<h1>{}</h1>", escape(&report.title));
        }
    }

    html.push_str("<p>\n");
    for line in &report.summary {
        let _ = writeln!(html, "{}: {}<br />", escape(&line.label), line.count);
    }
    html.push_str("</p>\n<p>\n");
    for table in &report.tables {
        let _ = writeln!(
            html,
            "<a href=\"#{}-section\">{}</a><br />",
            escape(&table.id),
            escape(&table.heading)
        );
    }
    html.push_str("</p>\n");

    for table in &report.tables {
        render_table(&mut html, table);
    }

    html.push_str(FOOTER);
    html
}

fn render_table(html: &mut String, table: &Table) {
    let id = escape(&table.id);
    let _ = writeln!(html, "\n<h2 id=\"{}-section\">{}</h2>", id, escape(&table.heading));
    let _ = writeln!(html, "<p>{}</p>", escape(&table.description));

    if let Some(note) = &table.omitted {
        let _ = writeln!(html, "<p>{}</p>", escape(note));
        return;
    }

    let _ = writeln!(html, "<p>({} packages)</p>", table.count);
    let _ = writeln!(
        html,
        "<!-- Extract the data in this table in CSV format with the command:\n     {}\n-->",
        xmlstarlet_hint(&table.id, table.columns.len())
    );
    let _ = writeln!(html, "<table id=\"{}\">", id);

    html.push_str("<tr>\n");
    for column in &table.columns {
        let _ = writeln!(html, "  <th>{}</th>", escape(column));
    }
    html.push_str("</tr>\n");

    for row in &table.rows {
        match &row.class {
            Some(class) => {
                let _ = writeln!(html, "<tr class=\"{}\">", escape(class));
            }
            None => html.push_str("<tr>\n"),
        }
        for cell in &row.cells {
            let _ = writeln!(html, "  <td>{}</td>", render_cell(cell));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
}

fn render_cell(cell: &Cell) -> String {
    match &cell.href {
        Some(href) => format!("<a href=\"{}\">{}</a>", escape(href), escape(&cell.text)),
        None => escape(&cell.text),
    }
}

fn xmlstarlet_hint(id: &str, columns: usize) -> String {
    let values: Vec<String> = (1..=columns)
        .map(|n| format!("-v 'x:td[{}]'", n))
        .collect();
    format!(
        "xmlstarlet sel -N x=http://www.w3.org/1999/xhtml -t -m '//x:table[@id=\"{}\"]/x:tr[x:td]' {} -nl",
        id,
        values.join(" -o ',' ")
    )
}
