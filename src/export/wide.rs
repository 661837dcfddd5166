// src/export/wide.rs

//! Wide layout: one row per instrument, one column per field.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};

use crate::error::Result;
use crate::export::{SpreadsheetWriter, header_format, prepare_output};
use crate::models::{COLUMNS, OutputRow, col};

const SUMMARY_SHEET: &str = "Resumen";
const SUMMARY_HEADERS: [&str; 5] = [
    "Modelo Receptor",
    "Marca Receptor",
    "Fabricante receptor",
    "Cantidad",
    "N° de serie",
];

pub struct WideWriter {
    sheet: String,
    summary_sheet: bool,
}

impl WideWriter {
    pub fn new(sheet: impl Into<String>, summary_sheet: bool) -> Self {
        Self {
            sheet: sheet.into(),
            summary_sheet,
        }
    }
}

impl SpreadsheetWriter for WideWriter {
    fn write(&self, rows: &[OutputRow], path: &Path) -> Result<Vec<PathBuf>> {
        prepare_output(path)?;
        let header = header_format();
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet().set_name(&self.sheet)?;
        write_table(sheet, &header, rows)?;

        if self.summary_sheet && !rows.is_empty() {
            let summary = workbook.add_worksheet().set_name(SUMMARY_SHEET)?;
            write_summary(summary, &header, rows)?;
        }

        workbook.save(path)?;
        log::info!("Wrote {} instrument rows to {}", rows.len(), path.display());
        Ok(vec![path.to_path_buf()])
    }
}

fn write_table(sheet: &mut Worksheet, header: &Format, rows: &[OutputRow]) -> Result<()> {
    for (c, name) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, *name, header)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.values().iter().enumerate() {
            sheet.write_string(r as u32 + 1, c as u16, value)?;
        }
    }

    let last_col = COLUMNS.len() as u16 - 1;
    sheet.set_freeze_panes(1, 0)?;
    sheet.autofilter(0, 0, rows.len() as u32, last_col)?;
    sheet.autofit();
    Ok(())
}

/// Instruments grouped by receptor model, brand and manufacturer, in order
/// of first appearance.
fn group_by_model(rows: &[OutputRow]) -> Vec<([String; 3], Vec<String>)> {
    let mut groups: Vec<([String; 3], Vec<String>)> = Vec::new();
    for row in rows {
        let key = [
            row.get(col::REC_MODEL).to_string(),
            row.get(col::REC_BRAND).to_string(),
            row.get(col::REC_MANUFACTURER).to_string(),
        ];
        let serial = row.get(col::REC_SERIAL).to_string();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, serials)) => serials.push(serial),
            None => groups.push((key, vec![serial])),
        }
    }
    groups
}

fn write_summary(sheet: &mut Worksheet, header: &Format, rows: &[OutputRow]) -> Result<()> {
    for (c, name) in SUMMARY_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, c as u16, *name, header)?;
    }

    let total = Format::new().set_bold().set_background_color(Color::RGB(0xD9E1F2));
    let groups = group_by_model(rows);
    for (r, (key, serials)) in groups.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, value) in key.iter().enumerate() {
            sheet.write_string(r, c as u16, value)?;
        }
        sheet.write_number(r, 3, serials.len() as f64)?;
        let serials: Vec<&str> = serials.iter().map(String::as_str).filter(|s| !s.is_empty()).collect();
        sheet.write_string(r, 4, serials.join(", "))?;
    }

    let total_row = groups.len() as u32 + 1;
    sheet.write_string_with_format(total_row, 0, "Total", &total)?;
    sheet.write_number_with_format(total_row, 3, rows.len() as f64, &total)?;
    sheet.set_freeze_panes(1, 0)?;
    sheet.autofit();
    Ok(())
}
