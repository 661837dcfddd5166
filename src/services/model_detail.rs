// src/services/model_detail.rs

//! Model detail page reader.

use scraper::Html;

use crate::models::{DEFAULT_CLASS, FieldLabels, LabelConfig, ModelComponent};
use crate::services::cells::CellReader;

/// Read a model component from its detail page.
///
/// `dd/dt` falls back to `e` and the class to [`DEFAULT_CLASS`] when the
/// page leaves them out.
pub fn read_model(document: &Html, labels: &LabelConfig) -> ModelComponent {
    let reader = CellReader::new(document);
    let read = |field: &FieldLabels| reader.read_cell_any(field, false);

    let e = read(&labels.e);
    let mut dd_dt = read(&labels.dd_dt);
    if dd_dt.is_empty() {
        dd_dt = e.clone();
    }
    let mut class = read(&labels.class);
    if class.is_empty() {
        class = DEFAULT_CLASS.to_string();
    }

    ModelComponent {
        model: read(&labels.model),
        brand: read(&labels.brand),
        manufacturer: read(&labels.manufacturer),
        origin: read(&labels.origin),
        approval_number: read(&labels.approval_number),
        approval_date: read(&labels.approval_date),
        instrument_type: read(&labels.instrument_type),
        max: read(&labels.max),
        min: read(&labels.min),
        e,
        dd_dt,
        class,
        approval_code: read(&labels.approval_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_page(rows: &[(&str, &str)]) -> Html {
        let body: String = rows
            .iter()
            .map(|(label, value)| format!("<tr><td>{}</td><td>{}</td></tr>", label, value))
            .collect();
        Html::parse_document(&format!("<html><body><table>{}</table></body></html>", body))
    }

    #[test]
    fn reads_all_fields_with_synonyms() {
        let doc = model_page(&[
            ("Modelo Aprobado", "BPC-80"),
            ("Fabricante/Importador", "Systel S.A."),
            ("Marca", "Systel"),
            ("País de Origen", "Argentina"),
            ("N° Disposición", "1234/97"),
            ("Fecha de Aprobación", "22/04/1997"),
            ("Tipo de Instrumento", "Balanza de plataforma"),
            ("Máximo", "80000 kg"),
            ("Mínimo", "400 kg"),
            ("e", "20 kg"),
            ("dd=dt", "10 kg"),
            ("Clase", "IIII"),
            ("Código Aprobación", "A-0097"),
        ]);
        let model = read_model(&doc, &LabelConfig::default());

        assert_eq!(model.model, "BPC-80");
        assert_eq!(model.manufacturer, "Systel S.A.");
        assert_eq!(model.brand, "Systel");
        assert_eq!(model.origin, "Argentina");
        assert_eq!(model.approval_number, "1234/97");
        assert_eq!(model.approval_date, "22/04/1997");
        assert_eq!(model.instrument_type, "Balanza de plataforma");
        assert_eq!(model.max, "80000 kg");
        assert_eq!(model.min, "400 kg");
        assert_eq!(model.e, "20 kg");
        assert_eq!(model.dd_dt, "10 kg");
        assert_eq!(model.class, "IIII");
        assert_eq!(model.approval_code, "A-0097");
    }

    #[test]
    fn missing_fields_default() {
        let doc = model_page(&[("Modelo", "K-3"), ("e", "5 kg")]);
        let model = read_model(&doc, &LabelConfig::default());

        assert_eq!(model.model, "K-3");
        assert_eq!(model.dd_dt, "5 kg");
        assert_eq!(model.class, "III");
        assert_eq!(model.brand, "");
        assert_eq!(model.approval_code, "");
    }

    #[test]
    fn long_class_label_is_read() {
        let doc = model_page(&[("Modelo", "K-3"), ("Clase de exactitud", "IIII"), ("e", "5 kg")]);
        let model = read_model(&doc, &LabelConfig::default());

        assert_eq!(model.class, "IIII");
        assert_eq!(model.e, "5 kg");
    }
}
