// src/models/labels.rs

//! Declarative label synonym lists.
//!
//! The portal relabels its table cells between page revisions. Every field
//! read by label is described here as an ordered list of known labels, so a
//! relabeling is absorbed by editing `[labels]` in the config file.

use serde::{Deserialize, Serialize};

/// Ordered label synonyms for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FieldLabelsRepr")]
pub struct FieldLabels {
    /// Labels tried in order; the first non-empty hit wins
    pub labels: Vec<String>,

    /// Require the whole cell text to equal the label
    pub exact: bool,
}

/// Accepts either `field = ["a", "b"]` or `field = { labels = [...], exact = true }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldLabelsRepr {
    List(Vec<String>),
    Table {
        labels: Vec<String>,
        #[serde(default)]
        exact: bool,
    },
}

impl From<FieldLabelsRepr> for FieldLabels {
    fn from(repr: FieldLabelsRepr) -> Self {
        match repr {
            FieldLabelsRepr::List(labels) => Self {
                labels,
                exact: false,
            },
            FieldLabelsRepr::Table { labels, exact } => Self { labels, exact },
        }
    }
}

impl FieldLabels {
    /// Substring-matched synonyms.
    pub fn contains(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            exact: false,
        }
    }

    /// Exactly-matched synonyms.
    pub fn exact(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            exact: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.iter().all(|l| l.trim().is_empty())
    }

    /// Human-readable form used in miss warnings.
    pub fn describe(&self) -> String {
        self.labels.join(" | ")
    }
}

/// Label synonyms for every field read from the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    // Trámite summary page
    #[serde(default = "defaults::work_order")]
    pub work_order: FieldLabels,
    #[serde(default = "defaults::vpe_number")]
    pub vpe_number: FieldLabels,
    #[serde(default = "defaults::company")]
    pub company: FieldLabels,
    #[serde(default = "defaults::represented_user")]
    pub represented_user: FieldLabels,

    // Trámite detail page
    #[serde(default = "defaults::owner_name")]
    pub owner_name: FieldLabels,
    #[serde(default = "defaults::legal_address")]
    pub legal_address: FieldLabels,

    // Instrument page
    #[serde(default = "defaults::installation_address")]
    pub installation_address: FieldLabels,
    #[serde(default = "defaults::instrument_approval_code")]
    pub instrument_approval_code: FieldLabels,
    #[serde(default = "defaults::serial_number")]
    pub serial_number: FieldLabels,
    #[serde(default = "defaults::model_line")]
    pub model_line: FieldLabels,
    #[serde(default = "defaults::receptor_heading")]
    pub receptor_heading: FieldLabels,
    #[serde(default = "defaults::indicator_heading")]
    pub indicator_heading: FieldLabels,

    // Model detail page
    #[serde(default = "defaults::model")]
    pub model: FieldLabels,
    #[serde(default = "defaults::manufacturer")]
    pub manufacturer: FieldLabels,
    #[serde(default = "defaults::brand")]
    pub brand: FieldLabels,
    #[serde(default = "defaults::origin")]
    pub origin: FieldLabels,
    #[serde(default = "defaults::approval_number")]
    pub approval_number: FieldLabels,
    #[serde(default = "defaults::approval_date")]
    pub approval_date: FieldLabels,
    #[serde(default = "defaults::instrument_type")]
    pub instrument_type: FieldLabels,
    #[serde(default = "defaults::max")]
    pub max: FieldLabels,
    #[serde(default = "defaults::min")]
    pub min: FieldLabels,
    #[serde(default = "defaults::e")]
    pub e: FieldLabels,
    #[serde(default = "defaults::dd_dt")]
    pub dd_dt: FieldLabels,
    #[serde(default = "defaults::class")]
    pub class: FieldLabels,
    #[serde(default = "defaults::approval_code")]
    pub approval_code: FieldLabels,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            work_order: defaults::work_order(),
            vpe_number: defaults::vpe_number(),
            company: defaults::company(),
            represented_user: defaults::represented_user(),
            owner_name: defaults::owner_name(),
            legal_address: defaults::legal_address(),
            installation_address: defaults::installation_address(),
            instrument_approval_code: defaults::instrument_approval_code(),
            serial_number: defaults::serial_number(),
            model_line: defaults::model_line(),
            receptor_heading: defaults::receptor_heading(),
            indicator_heading: defaults::indicator_heading(),
            model: defaults::model(),
            manufacturer: defaults::manufacturer(),
            brand: defaults::brand(),
            origin: defaults::origin(),
            approval_number: defaults::approval_number(),
            approval_date: defaults::approval_date(),
            instrument_type: defaults::instrument_type(),
            max: defaults::max(),
            min: defaults::min(),
            e: defaults::e(),
            dd_dt: defaults::dd_dt(),
            class: defaults::class(),
            approval_code: defaults::approval_code(),
        }
    }
}

impl LabelConfig {
    /// All entries with their config key, for validation.
    pub fn entries(&self) -> Vec<(&'static str, &FieldLabels)> {
        vec![
            ("work_order", &self.work_order),
            ("vpe_number", &self.vpe_number),
            ("company", &self.company),
            ("represented_user", &self.represented_user),
            ("owner_name", &self.owner_name),
            ("legal_address", &self.legal_address),
            ("installation_address", &self.installation_address),
            ("instrument_approval_code", &self.instrument_approval_code),
            ("serial_number", &self.serial_number),
            ("model_line", &self.model_line),
            ("receptor_heading", &self.receptor_heading),
            ("indicator_heading", &self.indicator_heading),
            ("model", &self.model),
            ("manufacturer", &self.manufacturer),
            ("brand", &self.brand),
            ("origin", &self.origin),
            ("approval_number", &self.approval_number),
            ("approval_date", &self.approval_date),
            ("instrument_type", &self.instrument_type),
            ("max", &self.max),
            ("min", &self.min),
            ("e", &self.e),
            ("dd_dt", &self.dd_dt),
            ("class", &self.class),
            ("approval_code", &self.approval_code),
        ]
    }
}

mod defaults {
    use super::FieldLabels;

    // Summary page
    pub fn work_order() -> FieldLabels {
        FieldLabels::contains(&["Nro OT", "N° OT", "Número de O.T."])
    }
    pub fn vpe_number() -> FieldLabels {
        FieldLabels::contains(&["Número:"])
    }
    pub fn company() -> FieldLabels {
        FieldLabels::contains(&["Empresa Solicitante"])
    }
    pub fn represented_user() -> FieldLabels {
        FieldLabels::contains(&["Usuario Representado"])
    }

    // Detail page
    pub fn owner_name() -> FieldLabels {
        FieldLabels::contains(&[
            "Nombre del Usuario del Instrumento",
            "Nombre del Usuario del instrumento",
            "Nombre del Usuario del equipo",
            "Nombre del Usuario",
        ])
    }
    pub fn legal_address() -> FieldLabels {
        FieldLabels::contains(&[
            "Dirección Legal",
            "Dirección legal",
            "Direccion Legal",
            "Direccion legal",
            "Domicilio Legal",
        ])
    }

    // Instrument page
    pub fn installation_address() -> FieldLabels {
        FieldLabels::contains(&["Domicilio"])
    }
    pub fn instrument_approval_code() -> FieldLabels {
        FieldLabels::contains(&["Código de Aprobación de Modelo", "Código de Aprobación"])
    }
    pub fn serial_number() -> FieldLabels {
        FieldLabels::contains(&["Nro de serie", "N° de serie", "Número de serie"])
    }
    pub fn model_line() -> FieldLabels {
        FieldLabels::contains(&["Modelo - Tipo de Instrumento - Marca - Fabricante"])
    }
    pub fn receptor_heading() -> FieldLabels {
        FieldLabels::contains(&["Parte base del Instrumento", "Receptor de Carga"])
    }
    pub fn indicator_heading() -> FieldLabels {
        FieldLabels::contains(&["Indicador Electrónico", "Indicador Electronico"])
    }

    // Model page
    pub fn model() -> FieldLabels {
        FieldLabels::contains(&["Modelo Aprobado", "Modelo"])
    }
    pub fn manufacturer() -> FieldLabels {
        FieldLabels::contains(&["Fabricante/Importador", "Fabricante", "Importador"])
    }
    pub fn brand() -> FieldLabels {
        FieldLabels::contains(&["Marca"])
    }
    pub fn origin() -> FieldLabels {
        FieldLabels::contains(&["País Origen", "País de Origen", "País  Origen", "Pais Origen", "Origen"])
    }
    pub fn approval_number() -> FieldLabels {
        FieldLabels::contains(&[
            "Nº Disposicion",
            "N° Disposicion",
            "Nº Disposición",
            "N° Disposición",
            "Nro Disposición",
            "Nº Disposici",
            "N° Disposici",
            "N° de Aprobación",
            "Nº de Aprobación",
        ])
    }
    pub fn approval_date() -> FieldLabels {
        FieldLabels::contains(&["Fecha Aprobación", "Fecha de Aprobación", "Fecha Aprobacion"])
    }
    pub fn instrument_type() -> FieldLabels {
        FieldLabels::contains(&["Tipo Instrumento", "Tipo de Instrumento"])
    }
    pub fn max() -> FieldLabels {
        FieldLabels::contains(&["Máximo", "Capacidad Máx.", "Capacidad máxima", "Maximo"])
    }
    pub fn min() -> FieldLabels {
        FieldLabels::contains(&["Mínimo", "Capacidad Mín.", "Capacidad mínima", "Minimo"])
    }
    pub fn e() -> FieldLabels {
        FieldLabels::exact(&["e"])
    }
    pub fn dd_dt() -> FieldLabels {
        FieldLabels::exact(&["dd=dt", "dd = dt", "dt", "dd", "d"])
    }
    pub fn class() -> FieldLabels {
        FieldLabels::contains(&["Clase de exactitud", "Clase"])
    }
    pub fn approval_code() -> FieldLabels {
        FieldLabels::contains(&["Código Aprobación", "Codigo Aprobación", "Codigo Aprobacion"])
    }
}
