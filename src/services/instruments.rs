// src/services/instruments.rs

//! Instrument detail extraction.
//!
//! An instrument page lists two parts, a load receptor and an electronic
//! indicator, each under its own heading. Every part has a model summary
//! line, an approval code, a serial number and a link to its model page.
//! Values are attributed to a part by the nearest heading above them; when
//! the headings are not on the page the first occurrence goes to the
//! receptor and the second to the indicator.

use std::collections::HashMap;

use scraper::Html;
use url::Url;

use crate::models::{
    Config, ExtractionReport, Instrument, LabelConfig, ModelComponent, ModelLine, Outcome, Role,
};
use crate::services::cells::CellReader;
use crate::services::model_detail::read_model;
use crate::services::portal::PageSource;
use crate::utils::address::split_domicilio;
use crate::utils::{query_param, resolve_url};

/// Section headings found on an instrument page, in document order.
#[derive(Debug, Clone, Default)]
struct Sections {
    headings: Vec<(usize, Role)>,
}

impl Sections {
    /// Locate both headings; `None` unless each appears at least once.
    fn locate(reader: &CellReader<'_>, labels: &LabelConfig) -> Option<Self> {
        let receptor = reader.heading_positions(&labels.receptor_heading);
        let indicador = reader.heading_positions(&labels.indicator_heading);
        if receptor.is_empty() || indicador.is_empty() {
            return None;
        }

        let mut headings: Vec<(usize, Role)> = receptor
            .into_iter()
            .map(|p| (p, Role::Receptor))
            .chain(indicador.into_iter().map(|p| (p, Role::Indicador)))
            .collect();
        headings.sort_by_key(|(p, _)| *p);
        Some(Self { headings })
    }

    /// Role of the nearest heading above `position`.
    fn role_at(&self, position: usize) -> Option<Role> {
        self.headings
            .iter()
            .take_while(|(p, _)| *p < position)
            .last()
            .map(|(_, role)| *role)
    }
}

/// First value per role.
fn assign<T: Clone>(items: &[(usize, T)], sections: Option<&Sections>) -> [Option<T>; 2] {
    let mut slots: [Option<T>; 2] = [None, None];
    for (index, (position, item)) in items.iter().enumerate() {
        let role = match sections {
            Some(sections) => sections.role_at(*position),
            None => Role::ALL.get(index).copied(),
        };
        if let Some(role) = role {
            let slot = &mut slots[role.index()];
            if slot.is_none() {
                *slot = Some(item.clone());
            }
        }
    }
    slots
}

/// What an instrument page yields before its model pages are followed.
#[derive(Debug, Clone, Default)]
struct InstrumentPage {
    street: String,
    locality: String,
    province: String,
    model_hrefs: [Option<String>; 2],
    approval_codes: [Option<String>; 2],
    serials: [Option<String>; 2],
    lines: [Option<String>; 2],
    by_page_order: bool,
}

fn read_instrument_page(document: &Html, base: Option<&Url>, config: &Config) -> InstrumentPage {
    let labels = &config.labels;
    let reader = CellReader::new(document);

    let address = reader.read_cell_any(&labels.installation_address, true);
    let (street, locality, province) = split_domicilio(&address);

    let links: Vec<(usize, String)> = reader
        .links_containing(&config.portal.model_link_marker)
        .into_iter()
        .map(|(p, href)| match base {
            Some(base) => (p, resolve_url(base, &href)),
            None => (p, href),
        })
        .collect();
    let codes = reader.located_values(&labels.instrument_approval_code, false);
    let serials = reader.located_values(&labels.serial_number, false);
    let lines = reader.located_values(&labels.model_line, false);

    let sections = Sections::locate(&reader, labels);
    let has_items = !(links.is_empty() && codes.is_empty() && serials.is_empty() && lines.is_empty());

    InstrumentPage {
        street,
        locality,
        province,
        model_hrefs: assign(&links, sections.as_ref()),
        approval_codes: assign(&codes, sections.as_ref()),
        serials: assign(&serials, sections.as_ref()),
        lines: assign(&lines, sections.as_ref()),
        by_page_order: sections.is_none() && has_items,
    }
}

/// Extracts instruments, caching model pages by URL for the run.
pub struct InstrumentExtractor<'a> {
    config: &'a Config,
    source: &'a dyn PageSource,
    models: HashMap<String, ModelComponent>,
}

impl<'a> InstrumentExtractor<'a> {
    pub fn new(config: &'a Config, source: &'a dyn PageSource) -> Self {
        Self {
            config,
            source,
            models: HashMap::new(),
        }
    }

    /// Number of distinct model pages read so far.
    pub fn cached_models(&self) -> usize {
        self.models.len()
    }

    /// Read instrument `index` (1-based) from its detail page.
    ///
    /// Never fails: load faults are recorded in `report` and leave the
    /// affected fields empty.
    pub async fn extract(&mut self, index: usize, url: &str, report: &mut ExtractionReport) -> Instrument {
        let id = query_param(url, &self.config.portal.instrument_id_param).unwrap_or_default();
        let context = format!("instrument {}", index);
        let mut instrument = Instrument::bare(id, url);

        let page = match self.source.get(url).await {
            Ok(page) => page,
            Err(e) => {
                report.push(context, format!("page not loaded: {}", e));
                return instrument;
            }
        };

        let parsed = {
            let base = Url::parse(&page.url).ok();
            let document = page.document();
            read_instrument_page(&document, base.as_ref(), self.config)
        };
        if parsed.by_page_order {
            report.push(
                context.clone(),
                "section headings not found; roles assigned by page order",
            );
        }

        instrument.street = parsed.street;
        instrument.locality = parsed.locality;
        instrument.province = parsed.province;

        for role in Role::ALL {
            let i = role.index();
            let model = match &parsed.model_hrefs[i] {
                Some(href) => self
                    .model(href)
                    .await
                    .record(report, format!("{} / {} model", context, role)),
                None => {
                    report.push(format!("{} / {} model", context, role), "no model link");
                    ModelComponent::unresolved()
                }
            };

            let part = instrument.part_mut(role);
            part.model_href = parsed.model_hrefs[i].clone();
            part.approval_code = parsed.approval_codes[i].clone().unwrap_or_default();
            part.serial = parsed.serials[i].clone().unwrap_or_default();
            part.line = parsed.lines[i]
                .as_deref()
                .map(ModelLine::parse)
                .unwrap_or_default();
            part.model = model;
        }

        log::debug!(
            "Instrument {} ({}): receptor {:?}, indicador {:?}",
            index,
            instrument.id,
            instrument.receptor.serial,
            instrument.indicador.serial
        );
        instrument
    }

    async fn model(&mut self, url: &str) -> Outcome<ModelComponent> {
        if let Some(model) = self.models.get(url) {
            log::debug!("Model page cache hit: {}", url);
            return Outcome::Resolved(model.clone());
        }

        match self.source.get(url).await {
            Ok(page) => {
                let model = {
                    let document = page.document();
                    read_model(&document, &self.config.labels)
                };
                self.models.insert(url.to_string(), model.clone());
                Outcome::Resolved(model)
            }
            Err(e) => Outcome::degraded(ModelComponent::unresolved(), e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_HEADINGS: &str = r#"
        <html><body>
          <table>
            <tr><td>Domicilio</td><td>Ruta 7 km 1040<br>Luján de Cuyo<br>Mendoza</td></tr>
          </table>
          <h3>Indicador Electrónico</h3>
          <table>
            <tr><td>Modelo - Tipo de Instrumento - Marca - Fabricante</td><td>PX-1 - Indicador - Pesex - Pesex SRL</td></tr>
            <tr><td>Código de Aprobación</td><td>I-22</td></tr>
            <tr><td>Nro de serie</td><td>IND-9</td></tr>
            <tr><td>Modelo</td><td><a href="/MetroWeb/modeloDetalle.do?id=2">ver</a></td></tr>
          </table>
          <h3>Parte base del Instrumento</h3>
          <table>
            <tr><td>Modelo - Tipo de Instrumento - Marca - Fabricante</td><td>BPC-80 - Balanza - Systel - Systel S.A.</td></tr>
            <tr><td>Código de Aprobación</td><td>R-11</td></tr>
            <tr><td>Nro de serie</td><td>REC-1</td></tr>
            <tr><td>Modelo</td><td><a href="/MetroWeb/modeloDetalle.do?id=1">ver</a></td></tr>
          </table>
        </body></html>
    "#;

    const WITHOUT_HEADINGS: &str = r#"
        <html><body><table>
          <tr><td>Nro de serie</td><td>REC-1</td></tr>
          <tr><td>Modelo</td><td><a href="modeloDetalle.do?id=1">ver</a></td></tr>
          <tr><td>Nro de serie</td><td>IND-9</td></tr>
          <tr><td>Modelo</td><td><a href="modeloDetalle.do?id=2">ver</a></td></tr>
        </table></body></html>
    "#;

    fn parse(html: &str) -> InstrumentPage {
        let base = Url::parse("https://app.inti.gob.ar/MetroWeb/instrumentoDetalle.do?idInstrumento=5").unwrap();
        read_instrument_page(&Html::parse_document(html), Some(&base), &Config::default())
    }

    #[test]
    fn roles_follow_headings_not_page_order() {
        let page = parse(WITH_HEADINGS);

        assert!(!page.by_page_order);
        assert_eq!(page.serials[0].as_deref(), Some("REC-1"));
        assert_eq!(page.serials[1].as_deref(), Some("IND-9"));
        assert_eq!(page.approval_codes[0].as_deref(), Some("R-11"));
        assert_eq!(
            page.model_hrefs[1].as_deref(),
            Some("https://app.inti.gob.ar/MetroWeb/modeloDetalle.do?id=2")
        );
        assert_eq!(
            page.lines[0].as_deref(),
            Some("BPC-80 - Balanza - Systel - Systel S.A.")
        );
        assert_eq!(page.street, "Ruta 7 km 1040");
        assert_eq!(page.locality, "Luján de Cuyo");
        assert_eq!(page.province, "Mendoza");
    }

    #[test]
    fn missing_headings_fall_back_to_page_order() {
        let page = parse(WITHOUT_HEADINGS);

        assert!(page.by_page_order);
        assert_eq!(page.serials[0].as_deref(), Some("REC-1"));
        assert_eq!(page.serials[1].as_deref(), Some("IND-9"));
        assert_eq!(
            page.model_hrefs[0].as_deref(),
            Some("https://app.inti.gob.ar/MetroWeb/modeloDetalle.do?id=1")
        );
    }

    #[test]
    fn empty_page_is_not_flagged() {
        let page = parse("<html><body><p>Sin datos</p></body></html>");
        assert!(!page.by_page_order);
        assert!(page.serials.iter().all(Option::is_none));
        assert!(page.street.is_empty());
    }
}
