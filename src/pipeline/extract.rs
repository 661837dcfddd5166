// src/pipeline/extract.rs

//! Extraction pipeline: portal session to output rows.

use std::time::Instant;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Config, Credentials, ExtractionReport, Instrument, OutputRow, Tramite, WorkOrder};
use crate::pipeline::assemble::assemble_row;
use crate::presenter::Presenter;
use crate::services::{InstrumentExtractor, PageSource, PortalNavigator};
use crate::utils::console;

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub tramite: Tramite,
    pub instruments: Vec<Instrument>,
    pub rows: Vec<OutputRow>,
    pub report: ExtractionReport,
}

/// Run the extraction for one work order.
///
/// Credentials missing or incomplete are asked from the presenter. Zero
/// instrument links yield zero rows.
pub async fn run_extraction(
    config: &Config,
    source: &dyn PageSource,
    credentials: Option<Credentials>,
    work_order: &WorkOrder,
    presenter: &dyn Presenter,
) -> Result<Extraction> {
    let start = Instant::now();
    console::header(&format!("MetroWeb extraction for OT {}", work_order));

    if work_order.as_str().is_empty() {
        return Err(AppError::validation("work order number is empty"));
    }
    if !work_order.is_well_formed() {
        log::warn!("Work order {} does not look like NNN-NNNNN; searching anyway", work_order);
    }

    let credentials = match credentials {
        Some(credentials) if credentials.is_complete() => credentials,
        _ => presenter.prompt_credentials()?,
    };
    if !credentials.is_complete() {
        return Err(AppError::validation("username and password are required"));
    }

    let mut report = ExtractionReport::default();
    let session = PortalNavigator::new(config, source, presenter)
        .open(&credentials, work_order, &mut report)
        .await?;

    let total = session.instrument_links.len();
    report.instruments_total = total;
    if total == 0 {
        presenter.log("The VPE lists no instruments");
    }

    let mut extractor = InstrumentExtractor::new(config, source);
    let mut instruments = Vec::with_capacity(total);
    let mut rows = Vec::with_capacity(total);
    for (i, url) in session.instrument_links.iter().enumerate() {
        presenter.log(&format!("Reading instrument {}/{}", i + 1, total));
        let instrument = extractor.extract(i + 1, url, &mut report).await;
        rows.push(assemble_row(&config.rules, &session.tramite, &instrument));
        instruments.push(instrument);
        presenter.progress(i + 1, total);
    }

    console::summary(
        "Extraction",
        &[
            ("Instrumentos", total.to_string()),
            ("Modelos leídos", extractor.cached_models().to_string()),
            ("Advertencias", report.degradations.len().to_string()),
            ("Duración", format!("{:.1}s", start.elapsed().as_secs_f64())),
        ],
    );
    if !report.is_clean() {
        for degradation in &report.degradations {
            console::sub_item(&format!("{}: {}", degradation.context, degradation.reason));
        }
    }

    Ok(Extraction {
        tramite: session.tramite,
        instruments,
        rows,
        report,
    })
}
