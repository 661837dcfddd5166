// src/pipeline/export.rs

//! Export step: write the chosen layout and the optional merge copy.

use std::path::PathBuf;

use crate::error::Result;
use crate::export::{merge_into, writer_for};
use crate::models::{ExportConfig, OutputFormat, OutputRow, col};
use crate::utils::{console, sanitize_file_name};

/// Where and how to write one run's rows.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub format: OutputFormat,
    pub output: PathBuf,
    /// Template workbook, overriding `export.template.path`
    pub template: Option<PathBuf>,
    /// Existing workbook to receive the data as a new first sheet
    pub merge_into: Option<PathBuf>,
}

/// Files produced by an export.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub written: Vec<PathBuf>,
    pub merged: Option<PathBuf>,
}

/// Write `rows` as requested.
pub fn run_export(config: &ExportConfig, rows: &[OutputRow], request: &ExportRequest) -> Result<ExportSummary> {
    let writer = writer_for(request.format, config, request.template.as_deref())?;
    let written = writer.write(rows, &request.output)?;

    let merged = match &request.merge_into {
        Some(base) => Some(merge_into(base, rows, &config.merge)?),
        None => None,
    };

    let mut items = vec![("Formato", request.format.to_string())];
    items.extend(written.iter().map(|p| ("Archivo", p.display().to_string())));
    if let Some(path) = &merged {
        items.push(("Copia combinada", path.display().to_string()));
    }
    console::summary("Export", &items);

    Ok(ExportSummary { written, merged })
}

/// `OT_<ot>_<owner>.xlsx`, with `SIN_RAZON` when the owner is unknown.
pub fn suggest_file_name(work_order: &str, owner: &str) -> String {
    let owner = sanitize_file_name(owner).replace(' ', "_");
    let owner = if owner.is_empty() { "SIN_RAZON".to_string() } else { owner };
    format!("OT_{}_{}.xlsx", sanitize_file_name(work_order), owner)
}

/// File name suggested for rows read back from a workbook.
pub fn suggest_for_rows(rows: &[OutputRow]) -> String {
    match rows.first() {
        Some(row) => suggest_file_name(row.get(col::WORK_ORDER), row.get(col::OWNER)),
        None => "OT_resultado.xlsx".to_string(),
    }
}
