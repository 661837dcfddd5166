//! Service layer for the extraction application.
//!
//! This module contains the portal-facing logic for:
//! - Label-indexed cell reading (`CellReader`)
//! - Form submission (`FormSubmission`)
//! - Page loading (`PageSource`, `HttpPortal`)
//! - Session navigation (`PortalNavigator`)
//! - Instrument and model extraction (`InstrumentExtractor`, `read_model`)

pub mod cells;
pub mod forms;
mod instruments;
mod model_detail;
mod navigator;
pub mod portal;

pub use cells::CellReader;
pub use forms::{FormSubmission, Method};
pub use instruments::InstrumentExtractor;
pub use model_detail::read_model;
pub use navigator::{PortalNavigator, Session};
pub use portal::{HttpPortal, Page, PageSource};
