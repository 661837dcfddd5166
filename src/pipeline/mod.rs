//! Pipeline entry points.
//!
//! - `run_extraction`: Portal session to output rows
//! - `run_export`: Output rows to workbook files
//! - `assemble_row`: One instrument to one output row

pub mod assemble;
pub mod export;
pub mod extract;

pub use assemble::assemble_row;
pub use export::{ExportRequest, ExportSummary, run_export, suggest_file_name, suggest_for_rows};
pub use extract::{Extraction, run_extraction};
