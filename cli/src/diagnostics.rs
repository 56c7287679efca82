//! Caret-style rendering of parse and type errors.

use std::fmt::Write;

use colored::Colorize;
use twill_parser::{ParseError, TypeError};

/// Render one error with its source context:
///
/// ```text
/// error: variable `x` is undeclared
///   --> demo.twl:3:7
///    |
///  3 | print x;
///    |       ^
/// ```
pub fn render(
    filename: &str,
    source: &str,
    line: usize,
    col: usize,
    message: &str,
    note: Option<&str>,
) -> String {
    let mut out = String::new();

    writeln!(out, "{}: {}", "error".red().bold(), message).unwrap();
    writeln!(out, "  --> {}:{}:{}", filename, line, col).unwrap();

    if let Some(text) = source.lines().nth(line.saturating_sub(1)) {
        let gutter = format!("{:>3}", line);
        writeln!(out, "{} |", " ".repeat(gutter.len())).unwrap();
        writeln!(out, "{} | {}", gutter.blue().bold(), text).unwrap();
        writeln!(
            out,
            "{} | {}{}",
            " ".repeat(gutter.len()),
            " ".repeat(col.saturating_sub(1)),
            "^".red().bold()
        )
        .unwrap();
    }

    if let Some(note) = note {
        writeln!(out, "  = note: {}", note).unwrap();
    }

    out
}

pub fn render_parse_error(filename: &str, source: &str, err: &ParseError) -> String {
    render(filename, source, err.line, err.col, &err.message, None)
}

pub fn render_type_error(filename: &str, source: &str, err: &TypeError) -> String {
    render(
        filename,
        source,
        err.line,
        err.col,
        &err.message,
        err.note.as_deref(),
    )
}
