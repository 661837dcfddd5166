// src/models/instrument.rs

//! Instruments and their model components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Accuracy class assumed when the model page does not state one.
pub const DEFAULT_CLASS: &str = "III";

/// Which sub-component of a truck scale a part describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Load-bearing platform
    Receptor,
    /// Electronic display
    Indicador,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Receptor, Role::Indicador];

    /// Position used when roles are assigned by page order.
    pub fn index(self) -> usize {
        match self {
            Role::Receptor => 0,
            Role::Indicador => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Receptor => f.write_str("receptor"),
            Role::Indicador => f.write_str("indicador"),
        }
    }
}

/// Fields read from a model detail page.
///
/// A lookup that fails leaves its field empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelComponent {
    pub model: String,
    pub brand: String,
    pub manufacturer: String,
    pub origin: String,
    pub approval_number: String,
    pub approval_date: String,
    pub instrument_type: String,
    pub max: String,
    pub min: String,
    pub e: String,
    pub dd_dt: String,
    pub class: String,
    pub approval_code: String,
}

impl ModelComponent {
    /// Component whose model page could not be read.
    pub fn unresolved() -> Self {
        Self {
            model: String::new(),
            brand: String::new(),
            manufacturer: String::new(),
            origin: String::new(),
            approval_number: String::new(),
            approval_date: String::new(),
            instrument_type: String::new(),
            max: String::new(),
            min: String::new(),
            e: String::new(),
            dd_dt: String::new(),
            class: DEFAULT_CLASS.to_string(),
            approval_code: String::new(),
        }
    }
}

impl Default for ModelComponent {
    fn default() -> Self {
        Self::unresolved()
    }
}

/// The "Modelo - Tipo de Instrumento - Marca - Fabricante" line of an
/// instrument page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLine {
    pub model: String,
    pub instrument_type: String,
    pub brand: String,
    pub manufacturer: String,
}

impl ModelLine {
    /// Split on `" - "`; the manufacturer keeps any remaining dashes.
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line.split(" - ").map(str::trim).collect();
        let part = |i: usize| parts.get(i).map(|p| p.to_string()).unwrap_or_default();
        Self {
            model: part(0),
            instrument_type: part(1),
            brand: part(2),
            manufacturer: parts.get(3..).map(|rest| rest.join(" - ")).unwrap_or_default(),
        }
    }
}

/// One sub-component of an instrument as listed on its detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentPart {
    /// Absolute model detail URL, if the page links one
    pub model_href: Option<String>,

    /// Approval code printed on the instrument page
    pub approval_code: String,

    /// Serial number
    pub serial: String,

    /// Model summary line printed on the instrument page
    pub line: ModelLine,

    /// Data from the model detail page
    pub model: ModelComponent,
}

/// One measuring device of a VPE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Portal-assigned id
    pub id: String,

    /// Instrument detail URL
    pub url: String,

    /// Installation street
    pub street: String,

    /// Installation locality
    pub locality: String,

    /// Installation province
    pub province: String,

    pub receptor: InstrumentPart,
    pub indicador: InstrumentPart,
}

impl Instrument {
    /// An instrument with only its link known.
    pub fn bare(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn part(&self, role: Role) -> &InstrumentPart {
        match role {
            Role::Receptor => &self.receptor,
            Role::Indicador => &self.indicador,
        }
    }

    pub fn part_mut(&mut self, role: Role) -> &mut InstrumentPart {
        match role {
            Role::Receptor => &mut self.receptor,
            Role::Indicador => &mut self.indicador,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_component_is_blank_with_default_class() {
        let component = ModelComponent::unresolved();
        assert_eq!(component.class, "III");
        assert!(component.model.is_empty());
        assert!(component.e.is_empty());
        assert!(component.dd_dt.is_empty());
        assert!(component.approval_code.is_empty());
    }

    #[test]
    fn model_line_keeps_dashes_in_manufacturer() {
        let line = ModelLine::parse("BPC-80 - Balanza - Systel - Systel S.A. - Córdoba");
        assert_eq!(line.model, "BPC-80");
        assert_eq!(line.instrument_type, "Balanza");
        assert_eq!(line.brand, "Systel");
        assert_eq!(line.manufacturer, "Systel S.A. - Córdoba");
    }

    #[test]
    fn model_line_with_missing_parts() {
        let line = ModelLine::parse("K-3");
        assert_eq!(line.model, "K-3");
        assert!(line.brand.is_empty());
        assert!(line.manufacturer.is_empty());
    }
}
