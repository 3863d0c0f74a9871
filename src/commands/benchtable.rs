//! Markdown table from `go test -bench . -benchmem` output.

use std::io::BufRead;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

const COLUMNS: [&str; 5] = ["name", "times", "ns/op", "B/op", "allocs/op"];

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number pattern is valid"));

/// Render benchmark lines from `input` until a line that is exactly `PASS`.
pub fn render(input: impl BufRead, stdout: &mut impl std::io::Write) -> Result<()> {
    writeln!(stdout, "| {} |", COLUMNS.join(" | "))?;
    let mut alignment = "| :---: |".to_string();
    for _ in 1..COLUMNS.len() {
        alignment.push_str(" ---: |");
    }
    writeln!(stdout, "{}", alignment)?;

    for line in input.lines() {
        let line = line?;
        if line == "PASS" {
            break;
        }
        writeln!(stdout, "{}", render_row(&line))?;
    }
    Ok(())
}

fn render_row(line: &str) -> String {
    let mut row = "|".to_string();
    for (i, field) in line.split('\t').enumerate() {
        let cell = if i == 0 {
            field.trim()
        } else {
            NUMBER_RE.find(field).map_or("", |m| m.as_str())
        };
        row.push_str(cell);
        row.push('|');
    }
    row
}
