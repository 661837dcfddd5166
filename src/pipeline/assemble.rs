// src/pipeline/assemble.rs

//! Row assembly: one trámite plus one instrument into one output row.

use crate::models::{Instrument, InstrumentPart, OutputRow, RulesConfig, Tramite, col};
use crate::utils::address::parse_domicilio_fiscal;
use crate::utils::date::format_date_es;

/// Flatten an instrument into the output schema.
pub fn assemble_row(rules: &RulesConfig, tramite: &Tramite, instrument: &Instrument) -> OutputRow {
    let mut row = OutputRow::new();
    let date = |value: &str| {
        if rules.spanish_dates {
            format_date_es(value)
        } else {
            value.to_string()
        }
    };

    // Trámite
    row.set(col::WORK_ORDER, &tramite.work_order);
    row.set(col::VPE, &tramite.vpe);
    row.set(col::COMPANY, &tramite.company);
    row.set(col::OWNER, tramite.owner());

    let split = rules.split_fiscal_address.then(|| parse_domicilio_fiscal(&tramite.legal_address));
    match split {
        Some((street, locality, province)) if !province.is_empty() => {
            row.set(col::FISCAL_STREET, street);
            row.set(col::FISCAL_LOCALITY, locality);
            row.set(col::FISCAL_PROVINCE, province);
        }
        _ => {
            row.set(col::FISCAL_STREET, &tramite.legal_address);
        }
    }

    // Installation site
    row.set(col::SITE_STREET, &instrument.street);
    row.set(col::SITE_LOCALITY, &instrument.locality);
    row.set(col::SITE_PROVINCE, &instrument.province);
    row.set(col::DESCRIPTION, &rules.instrument_description);

    // Receptor
    let receptor = &instrument.receptor;
    let model = &receptor.model;
    row.set(col::REC_MANUFACTURER, manufacturer(receptor));
    row.set(col::REC_BRAND, brand(receptor));
    row.set(col::REC_MODEL, model_name(receptor));
    row.set(col::REC_SERIAL, &receptor.serial);
    row.set(col::REC_CODE, approval_code(receptor));
    row.set(col::REC_ORIGIN, &model.origin);
    let e = if rules.receptor_e_from_dd_dt {
        &model.dd_dt
    } else {
        &model.e
    };
    row.set(col::REC_E, e);
    row.set(col::REC_MAX, &model.max);
    row.set(col::REC_MIN, &model.min);
    row.set(col::REC_DD_DT, &model.dd_dt);
    row.set(col::REC_CLASS, &model.class);
    row.set(col::REC_APPROVAL_NUMBER, &model.approval_number);
    row.set(col::REC_APPROVAL_DATE, date(&model.approval_date));

    // Indicador
    let indicador = &instrument.indicador;
    row.set(col::IND_TYPE, &rules.indicator_type);
    row.set(col::IND_MANUFACTURER, manufacturer(indicador));
    row.set(col::IND_BRAND, brand(indicador));
    row.set(col::IND_MODEL, model_name(indicador));
    row.set(col::IND_SERIAL, &indicador.serial);
    row.set(col::IND_CODE, approval_code(indicador));
    row.set(col::IND_ORIGIN, &indicador.model.origin);
    row.set(col::IND_APPROVAL_NUMBER, &indicador.model.approval_number);
    row.set(col::IND_APPROVAL_DATE, date(&indicador.model.approval_date));

    row
}

fn or_else<'a>(primary: &'a str, fallback: &'a str) -> &'a str {
    if primary.trim().is_empty() { fallback } else { primary }
}

fn model_name(part: &InstrumentPart) -> &str {
    or_else(&part.model.model, &part.line.model)
}

fn brand(part: &InstrumentPart) -> &str {
    or_else(&part.model.brand, &part.line.brand)
}

fn manufacturer(part: &InstrumentPart) -> &str {
    or_else(&part.model.manufacturer, &part.line.manufacturer)
}

fn approval_code(part: &InstrumentPart) -> &str {
    or_else(&part.model.approval_code, &part.approval_code)
}
