// src/models/mod.rs

//! Domain models for the extraction application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod credentials;
mod instrument;
mod labels;
mod outcome;
mod row;
mod tramite;

// Re-export all public types
pub use config::{
    CellTarget, Config, ExportConfig, MergeConfig, OutputFormat, PortalConfig, RulesConfig,
    SelectorConfig, TemplateConfig,
};
pub use credentials::Credentials;
pub use instrument::{DEFAULT_CLASS, Instrument, InstrumentPart, ModelComponent, ModelLine, Role};
pub use labels::{FieldLabels, LabelConfig};
pub use outcome::{Degradation, ExtractionReport, Outcome};
pub use row::{COLUMNS, OutputRow, col};
pub use tramite::{Tramite, WorkOrder};
