//! Spreadsheet output.
//!
//! - Wide table (`WideWriter`)
//! - Campo/Valor (`CampoValorWriter`)
//! - Template fill (`TemplateWriter`)
//! - Merge into an existing workbook (`merge_into`)
//! - Reading rows back (`read_rows`)

mod campo_valor;
mod merge;
pub mod package;
mod raw;
mod template;
mod wide;

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format};

use crate::error::{AppError, Result};
use crate::models::{ExportConfig, OutputFormat, OutputRow};

pub use campo_valor::{CampoValorWriter, FIELD_HEADER, VALUE_HEADER, instrument_marker};
pub use merge::{MERGE_HEADERS, copy_path, merge_into, next_sheet_name};
pub use raw::read_rows;
pub use template::TemplateWriter;
pub use wide::WideWriter;

/// Renders rows into one or more workbook files.
pub trait SpreadsheetWriter {
    /// Write `rows` to `path`; returns every file written.
    fn write(&self, rows: &[OutputRow], path: &Path) -> Result<Vec<PathBuf>>;
}

/// Writer for `format`. The template layout needs a template workbook,
/// either given here or set in the config.
pub fn writer_for(
    format: OutputFormat,
    config: &ExportConfig,
    template: Option<&Path>,
) -> Result<Box<dyn SpreadsheetWriter>> {
    match format {
        OutputFormat::Wide => Ok(Box::new(WideWriter::new(&config.wide_sheet, config.summary_sheet))),
        OutputFormat::CampoValor => Ok(Box::new(CampoValorWriter::new(&config.campo_valor_sheet))),
        OutputFormat::Template => {
            let path = template
                .map(Path::to_path_buf)
                .or_else(|| config.template.path.clone())
                .ok_or_else(|| AppError::template("no template workbook given"))?;
            if !path.exists() {
                return Err(AppError::template(format!("template not found: {}", path.display())));
            }
            Ok(Box::new(TemplateWriter::new(path, &config.template)))
        }
    }
}

/// Bold white on blue, used for header rows.
pub(crate) fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x4472C4))
}

/// Create the parent directory of an output file.
pub(crate) fn prepare_output(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
