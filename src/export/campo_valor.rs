// src/export/campo_valor.rs

//! Campo/Valor layout: two columns, one row per field.
//!
//! From the second instrument on, a blank row and a highlighted
//! `=== INSTRUMENTO N ===` marker row precede the instrument's fields.
//! Every value is written as a string so Excel never turns codes or
//! phone numbers into numbers or formulas.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};

use crate::error::Result;
use crate::export::{SpreadsheetWriter, header_format, prepare_output};
use crate::models::OutputRow;

pub const FIELD_HEADER: &str = "Campo";
pub const VALUE_HEADER: &str = "Valor";

/// Marker row text for instrument `n` (1-based).
pub fn instrument_marker(n: usize) -> String {
    format!("=== INSTRUMENTO {} ===", n)
}

pub struct CampoValorWriter {
    sheet: String,
}

impl CampoValorWriter {
    pub fn new(sheet: impl Into<String>) -> Self {
        Self { sheet: sheet.into() }
    }
}

impl SpreadsheetWriter for CampoValorWriter {
    fn write(&self, rows: &[OutputRow], path: &Path) -> Result<Vec<PathBuf>> {
        prepare_output(path)?;
        let header = header_format().set_align(FormatAlign::Center);
        let marker = Format::new().set_bold().set_background_color(Color::RGB(0xFFC000));
        let wrap = Format::new().set_text_wrap().set_align(FormatAlign::Top);

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet().set_name(&self.sheet)?;
        sheet.write_string_with_format(0, 0, FIELD_HEADER, &header)?;
        sheet.write_string_with_format(0, 1, VALUE_HEADER, &header)?;
        sheet.set_row_height(0, 25)?;

        let mut r: u32 = 1;
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                r += 1;
                sheet.write_string_with_format(r, 0, instrument_marker(i + 1), &marker)?;
                sheet.write_blank(r, 1, &marker)?;
                r += 1;
            }
            for (field, value) in row.fields() {
                sheet.write_string(r, 0, field)?;
                sheet.write_string_with_format(r, 1, value, &wrap)?;
                r += 1;
            }
        }

        sheet.set_column_width(0, 45)?;
        sheet.set_column_width(1, 60)?;
        sheet.set_freeze_panes(1, 0)?;

        workbook.save(path)?;
        log::info!("Wrote {} instruments as Campo/Valor to {}", rows.len(), path.display());
        Ok(vec![path.to_path_buf()])
    }
}
