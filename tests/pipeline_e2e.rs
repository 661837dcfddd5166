//! End-to-end runs against the fixture portal.

mod common;

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use common::{FixturePortal, RecordingPresenter, Scenario};
use metroweb::error::AppError;
use metroweb::export::package::XlsxPackage;
use metroweb::export::{
    CampoValorWriter, MERGE_HEADERS, SpreadsheetWriter, TemplateWriter, WideWriter, instrument_marker,
    merge_into, read_rows,
};
use metroweb::models::{COLUMNS, Config, MergeConfig, OutputFormat, TemplateConfig, WorkOrder, col};
use metroweb::pipeline::{Extraction, ExportRequest, run_export, run_extraction};
use metroweb::presenter::LogPresenter;
use rust_xlsxwriter::{Format, Workbook};
use tempfile::TempDir;

async fn extract(portal: &FixturePortal) -> Extraction {
    run_extraction(
        &Config::default(),
        portal,
        Some(common::credentials()),
        &WorkOrder::new("307-62136"),
        &LogPresenter,
    )
    .await
    .unwrap()
}

fn sheet(path: &Path, name: &str) -> Range<Data> {
    let mut workbook = open_workbook_auto(path).unwrap();
    workbook.worksheet_range(name).unwrap()
}

fn text(range: &Range<Data>, row: u32, col: u32) -> String {
    range.get_value((row, col)).map(|d| d.to_string()).unwrap_or_default()
}

/// Template with a merged label cell and a second sheet that must survive.
fn build_template(path: &Path) {
    let mut workbook = Workbook::new();
    let form = workbook.add_worksheet();
    form.set_name("Identificación del Instrumento").unwrap();
    form.merge_range(0, 0, 0, 1, "Número de O.T.", &Format::new().set_bold())
        .unwrap();
    form.write_string(2, 0, "Marca Receptor:").unwrap();
    form.write_string(3, 0, "N° de serie Receptor").unwrap();
    form.write_string(5, 0, "Observaciones").unwrap();

    let notes = workbook.add_worksheet();
    notes.set_name("Notas").unwrap();
    notes.write_string(0, 0, "no tocar").unwrap();
    notes.write_number(1, 0, 42.0).unwrap();

    workbook.save(path).unwrap();
}

#[tokio::test]
async fn two_instruments_yield_two_rows() {
    let portal = FixturePortal::new(Scenario::TwoInstruments);
    let presenter = RecordingPresenter::default();
    let extraction = run_extraction(
        &Config::default(),
        &portal,
        Some(common::credentials()),
        &WorkOrder::new("307-62136"),
        &presenter,
    )
    .await
    .unwrap();

    assert_eq!(extraction.rows.len(), 2);
    assert_eq!(extraction.report.instruments_total, 2);
    assert_eq!(*presenter.progress.lock().unwrap(), vec![(1, 2), (2, 2)]);

    for row in &extraction.rows {
        assert_eq!(row.get(col::WORK_ORDER), "307-62136");
        assert_eq!(row.get(col::VPE), "4512");
        assert_eq!(row.get(col::COMPANY), "Balanzas del Oeste SRL");
        assert_eq!(row.get(col::OWNER), "Acopio Norte S.A.");
        assert_eq!(row.get(col::FISCAL_STREET), "Suyai 2632 Luján de Cuyo Mendoza");
        assert_eq!(row.get(col::DESCRIPTION), "Balanza para pesar camiones");
        assert_eq!(row.get(col::IND_MODEL), "PX-1");
        assert_eq!(row.get(col::SITE_PROVINCE), "Mendoza");
    }

    let (first, second) = (&extraction.rows[0], &extraction.rows[1]);
    assert_eq!(first.get(col::REC_SERIAL), "REC-1");
    assert_eq!(second.get(col::REC_SERIAL), "REC-2");
    assert_eq!(first.get(col::IND_SERIAL), "IND-9");
    assert_eq!(second.get(col::IND_SERIAL), "IND-10");
    assert_eq!(first.get(col::REC_MODEL), "BPC-80");
    assert_eq!(second.get(col::REC_MODEL), "K-3");
    assert_eq!(first.get(col::SITE_STREET), "Ruta 7 km 1040");
    assert_eq!(second.get(col::SITE_STREET), "Ruta 40 km 3200");

    // e is taken from dd=dt; a model without dd=dt falls back to e.
    assert_eq!(first.get(col::REC_E), "20 kg");
    assert_eq!(first.get(col::REC_DD_DT), "20 kg");
    assert_eq!(second.get(col::REC_E), "10 kg");
    assert_eq!(second.get(col::REC_CLASS), "III");
    assert_eq!(first.get(col::REC_APPROVAL_DATE), "22 de abril de 1997");
    assert_eq!(second.get(col::REC_APPROVAL_DATE), "N/D");

    assert!(extraction.report.is_clean(), "{:?}", extraction.report.degradations);
}

#[tokio::test]
async fn shared_models_and_duplicate_links_are_loaded_once() {
    let portal = FixturePortal::new(Scenario::TwoInstruments);
    extract(&portal).await;

    assert_eq!(portal.get_count("/MetroWeb/modeloDetalle.do?idModelo=2"), 1);
    assert_eq!(portal.get_count("/MetroWeb/instrumentoDetalle.do?idInstrumento=101"), 1);

    let submits = portal.submits.lock().unwrap();
    assert_eq!(submits.len(), 2);
    assert_eq!(submits[0].get("usuario"), Some("inspector"));
    assert_eq!(submits[0].get("accion"), Some("ingresar"));
    assert_eq!(submits[1].get("numeroOT"), Some("307-62136"));
}

#[tokio::test]
async fn unreachable_model_page_degrades_the_row() {
    let portal = FixturePortal::new(Scenario::TwoInstruments).unreachable("/MetroWeb/modeloDetalle.do?idModelo=3");
    let extraction = extract(&portal).await;

    assert_eq!(extraction.rows.len(), 2);
    assert_eq!(extraction.rows[1].get(col::REC_SERIAL), "REC-2");
    // The instrument page's model line still names the model.
    assert_eq!(extraction.rows[1].get(col::REC_MODEL), "K-3");
    assert!(!extraction.report.is_clean());
    assert!(
        extraction
            .report
            .degradations
            .iter()
            .any(|d| d.context.contains("instrument 2"))
    );
}

#[tokio::test]
async fn unreachable_instrument_page_still_yields_its_row() {
    let portal =
        FixturePortal::new(Scenario::TwoInstruments).unreachable("/MetroWeb/instrumentoDetalle.do?idInstrumento=102");
    let extraction = extract(&portal).await;

    assert_eq!(extraction.rows.len(), 2);
    assert_eq!(extraction.rows[0].get(col::REC_SERIAL), "REC-1");

    let broken = &extraction.rows[1];
    assert_eq!(broken.get(col::WORK_ORDER), "307-62136");
    assert_eq!(broken.get(col::VPE), "4512");
    assert_eq!(broken.get(col::REC_SERIAL), "");
    assert_eq!(broken.get(col::IND_SERIAL), "");
    assert_eq!(broken.get(col::SITE_STREET), "");

    let degradation = extraction
        .report
        .degradations
        .iter()
        .find(|d| d.context == "instrument 2")
        .expect("instrument 2 degradation");
    assert!(degradation.reason.contains("page not loaded"));
}

#[tokio::test]
async fn zero_instruments_write_header_only() {
    let portal = FixturePortal::new(Scenario::NoInstruments);
    let extraction = extract(&portal).await;
    assert!(extraction.rows.is_empty());
    assert_eq!(extraction.tramite.vpe, "4512");

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("OT_307-62136.xlsx");
    let config = Config::default();
    let request = ExportRequest {
        format: OutputFormat::Wide,
        output: out.clone(),
        template: None,
        merge_into: None,
    };
    let summary = run_export(&config.export, &extraction.rows, &request).unwrap();
    assert_eq!(summary.written, vec![out.clone()]);

    let workbook = open_workbook_auto(&out).unwrap();
    assert_eq!(workbook.sheet_names(), vec![config.export.wide_sheet.clone()]);
    let range = sheet(&out, &config.export.wide_sheet);
    assert_eq!(range.height(), 1);
    assert_eq!(range.width(), COLUMNS.len());
    assert_eq!(text(&range, 0, 0), col::WORK_ORDER);
}

#[tokio::test]
async fn wrong_password_fails_authentication() {
    let portal = FixturePortal::new(Scenario::TwoInstruments);
    let result = run_extraction(
        &Config::default(),
        &portal,
        Some(common::wrong_credentials()),
        &WorkOrder::new("307-62136"),
        &LogPresenter,
    )
    .await;

    assert!(matches!(result, Err(AppError::AuthenticationFailed)));
}

#[tokio::test]
async fn missing_vpe_link_is_reported() {
    let portal = FixturePortal::new(Scenario::NoVpe);
    let result = run_extraction(
        &Config::default(),
        &portal,
        Some(common::credentials()),
        &WorkOrder::new("307-62136"),
        &LogPresenter,
    )
    .await;

    assert!(matches!(result, Err(AppError::VpeNotFound(ot)) if ot == "307-62136"));
}

#[tokio::test]
async fn unnumbered_vpe_aborts_before_any_row() {
    let portal = FixturePortal::new(Scenario::UnnumberedVpe);
    let result = run_extraction(
        &Config::default(),
        &portal,
        Some(common::credentials()),
        &WorkOrder::new("307-62136"),
        &LogPresenter,
    )
    .await;

    assert!(matches!(result, Err(AppError::AbortedRun(ref message)) if message.contains("307-62136")));
    assert_eq!(portal.get_count("/MetroWeb/instrumentoDetalle.do?idInstrumento=101"), 0);
}

#[tokio::test]
async fn login_page_without_password_field_fails() {
    let portal = FixturePortal::new(Scenario::LoginWithoutPassword);
    let result = run_extraction(
        &Config::default(),
        &portal,
        Some(common::credentials()),
        &WorkOrder::new("307-62136"),
        &LogPresenter,
    )
    .await;

    assert!(matches!(result, Err(AppError::LoginFieldNotFound(ref field)) if field == "contraseña"));
    assert!(portal.submits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_credentials_are_prompted() {
    let portal = FixturePortal::new(Scenario::TwoInstruments);
    let presenter = RecordingPresenter::default();
    let extraction = run_extraction(
        &Config::default(),
        &portal,
        None,
        &WorkOrder::new("307-62136"),
        &presenter,
    )
    .await
    .unwrap();
    assert_eq!(extraction.rows.len(), 2);

    let no_prompt = run_extraction(
        &Config::default(),
        &portal,
        None,
        &WorkOrder::new("307-62136"),
        &LogPresenter,
    )
    .await;
    assert!(no_prompt.is_err());
}

#[tokio::test]
async fn campo_valor_marks_second_instrument_once() {
    let extraction = extract(&FixturePortal::new(Scenario::TwoInstruments)).await;
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("campo_valor.xlsx");
    CampoValorWriter::new("Verificación").write(&extraction.rows, &out).unwrap();

    let range = sheet(&out, "Verificación");
    let first_column: Vec<String> = (0..range.height() as u32).map(|r| text(&range, r, 0)).collect();
    let marker = instrument_marker(2);
    let at: Vec<usize> = first_column
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == marker)
        .map(|(i, _)| i)
        .collect();

    assert_eq!(at.len(), 1);
    assert!(!first_column.contains(&instrument_marker(1)));
    let at = at[0] as u32;
    assert_eq!(text(&range, at - 1, 0), "");
    assert_eq!(text(&range, at + 1, 0), COLUMNS[0]);
    assert_eq!(text(&range, at + 1, 1), "307-62136");

    // The layout reads back into the same rows.
    let rows = read_rows(&out).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get(col::REC_SERIAL), "REC-2");
    assert_eq!(rows[0].get(col::REC_APPROVAL_DATE), "22 de abril de 1997");
}

#[tokio::test]
async fn wide_layout_has_one_row_per_instrument() {
    let extraction = extract(&FixturePortal::new(Scenario::TwoInstruments)).await;
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("wide.xlsx");
    let written = WideWriter::new("Instrumentos", true).write(&extraction.rows, &out).unwrap();
    assert_eq!(written, vec![out.clone()]);

    let range = sheet(&out, "Instrumentos");
    assert_eq!(range.height(), 3);
    let serial_col = COLUMNS.iter().position(|c| *c == col::REC_SERIAL).unwrap() as u32;
    assert_eq!(text(&range, 1, serial_col), "REC-1");
    assert_eq!(text(&range, 2, serial_col), "REC-2");

    let workbook = open_workbook_auto(&out).unwrap();
    assert!(workbook.sheet_names().iter().any(|name| name == "Resumen"));
}

#[tokio::test]
async fn template_fill_leaves_other_sheets_untouched() {
    let extraction = extract(&FixturePortal::new(Scenario::TwoInstruments)).await;
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("plantilla.xlsx");
    build_template(&template);

    let writer = TemplateWriter::new(&template, &TemplateConfig::default());
    let out = dir.path().join("OT_307-62136.xlsx");
    let written = writer.write(&extraction.rows, &out).unwrap();
    assert_eq!(
        written,
        vec![
            dir.path().join("OT_307-62136_REC-1.xlsx"),
            dir.path().join("OT_307-62136_REC-2.xlsx"),
        ]
    );

    let form = sheet(&written[1], "Identificación del Instrumento");
    assert_eq!(text(&form, 0, 0), "Número de O.T.");
    assert_eq!(text(&form, 0, 2), "307-62136");
    assert_eq!(text(&form, 2, 1), "Kretz");
    assert_eq!(text(&form, 3, 1), "REC-2");
    assert_eq!(text(&form, 5, 1), "");

    let original = XlsxPackage::open(&template).unwrap();
    let filled = XlsxPackage::open(&written[1]).unwrap();
    let notes = original.sheet_part("Notas").unwrap();
    assert_eq!(original.read_part(&notes).unwrap(), filled.read_part(&notes).unwrap());

    let form_part = original.sheet_part("Identificación del Instrumento").unwrap();
    let before = original.digests().unwrap();
    let after = filled.digests().unwrap();
    for (part, digest) in &before {
        if *part != form_part {
            assert_eq!(after.get(part), Some(digest), "{} changed", part);
        }
    }
    assert_ne!(before.get(&form_part), after.get(&form_part));
}

#[tokio::test]
async fn merge_adds_first_sheet_to_a_copy() {
    let extraction = extract(&FixturePortal::new(Scenario::TwoInstruments)).await;
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("planilla.xlsx");
    build_template(&base);
    let original = std::fs::read(&base).unwrap();

    let config = MergeConfig::default();
    let copy = merge_into(&base, &extraction.rows, &config).unwrap();
    assert_eq!(copy, dir.path().join("planilla_con_datos_vpe.xlsx"));
    assert_eq!(std::fs::read(&base).unwrap(), original);

    let workbook = open_workbook_auto(&copy).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec![
            config.sheet_name.clone(),
            "Identificación del Instrumento".to_string(),
            "Notas".to_string(),
        ]
    );

    let data = sheet(&copy, &config.sheet_name);
    for (i, header) in MERGE_HEADERS.iter().enumerate() {
        assert_eq!(text(&data, 0, i as u32), *header);
    }
    assert_eq!(data.height(), 1 + 2 * COLUMNS.len());
    assert_eq!(text(&data, 1, 0), COLUMNS[0]);
    assert_eq!(text(&data, 1, 2), "1");
    assert_eq!(text(&data, 1 + COLUMNS.len() as u32, 2), "2");
    assert!(matches!(data.get_value((1, 2)), Some(Data::String(n)) if n == "1"));

    let notes = sheet(&copy, "Notas");
    assert_eq!(text(&notes, 0, 0), "no tocar");

    // A second merge into the same base picks the next free names.
    let again = merge_into(&base, &extraction.rows, &config).unwrap();
    assert_ne!(again, copy);

    let rows = read_rows(&copy).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get(col::REC_SERIAL), "REC-1");
}
