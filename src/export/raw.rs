// src/export/raw.rs

//! Read output rows back from a workbook this tool wrote.
//!
//! Accepts the wide layout, the Campo/Valor layout (instruments split by
//! marker rows) and the merged `Campo | Valor | Instrumento N` sheet.

use std::path::Path;
use std::sync::LazyLock;

use calamine::{Data, Reader, open_workbook_auto};
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{COLUMNS, OutputRow};
use crate::services::cells::normalize;

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^=+\s*INSTRUMENTO\s+(\d+)\s*=+$").expect("marker regex"));

fn text(cell: Option<&Data>) -> String {
    cell.map(|c| normalize(&c.to_string())).unwrap_or_default()
}

/// Rows of the first sheet in a recognized layout.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<OutputRow>> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AppError::spreadsheet(format!("{}: {}", path.display(), e)))?;

    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| AppError::spreadsheet(format!("{} / {}: {}", path.display(), name, e)))?;
        let rows: Vec<&[Data]> = range.rows().collect();
        if let Some(parsed) = parse_sheet(&rows) {
            log::info!("Read {} instruments from sheet '{}' of {}", parsed.len(), name, path.display());
            return Ok(parsed);
        }
        log::debug!("Sheet '{}' has no recognized layout", name);
    }

    Err(AppError::spreadsheet(format!(
        "{}: no sheet with Campo/Valor or wide columns",
        path.display()
    )))
}

fn parse_sheet(rows: &[&[Data]]) -> Option<Vec<OutputRow>> {
    let header: Vec<String> = rows.first()?.iter().map(|c| text(Some(c))).collect();
    let is = |i: usize, name: &str| header.get(i).is_some_and(|h| h.eq_ignore_ascii_case(name));

    if is(0, "Campo") && is(1, "Valor") {
        let numbered = is(2, "Instrumento N");
        return Some(parse_campo_valor(&rows[1..], numbered));
    }

    let columns: Vec<Option<&str>> = header
        .iter()
        .map(|h| COLUMNS.iter().copied().find(|c| c.eq_ignore_ascii_case(h)))
        .collect();
    if columns.iter().flatten().count() < 2 {
        return None;
    }
    Some(parse_wide(&rows[1..], &columns))
}

fn parse_wide(rows: &[&[Data]], columns: &[Option<&str>]) -> Vec<OutputRow> {
    rows.iter()
        .map(|cells| {
            let mut row = OutputRow::new();
            for (i, column) in columns.iter().enumerate() {
                if let Some(column) = column {
                    row.set(column, text(cells.get(i)));
                }
            }
            row
        })
        .filter(|row| !row.is_blank())
        .collect()
}

fn parse_campo_valor(rows: &[&[Data]], numbered: bool) -> Vec<OutputRow> {
    let mut out: Vec<OutputRow> = Vec::new();
    let mut current = OutputRow::new();
    let mut current_number: Option<String> = None;

    for cells in rows {
        let field = text(cells.first());
        if field.is_empty() {
            continue;
        }
        let number = if numbered {
            Some(text(cells.get(2)))
        } else {
            MARKER_RE.captures(&field).map(|c| c[1].to_string())
        };

        let starts_new = match (&number, &current_number) {
            (Some(n), Some(current)) => n != current,
            (Some(_), None) => !current.is_blank(),
            _ => false,
        };
        if starts_new {
            out.push(std::mem::take(&mut current));
        }
        if number.is_some() {
            current_number = number;
        }
        if !numbered && MARKER_RE.is_match(&field) {
            continue;
        }
        current.set(&field, text(cells.get(1)));
    }

    if !current.is_blank() {
        out.push(current);
    }
    out
}
