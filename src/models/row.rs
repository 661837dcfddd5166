// src/models/row.rs

//! The flat output schema.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Output columns, in workbook order.
pub const COLUMNS: [&str; 33] = [
    "Número de O.T.",
    "VPE Nº",
    "Empresa solicitante",
    "Razón social (Propietario)",
    "Domicilio (Fiscal)",
    "Localidad (Fiscal)",
    "Provincia (Fiscal)",
    "Lugar propio de instalación - Domicilio",
    "Lugar propio de instalación - Localidad",
    "Lugar propio de instalación - Provincia",
    "Instrumento verificado",
    "Fabricante receptor",
    "Marca Receptor",
    "Modelo Receptor",
    "N° de serie Receptor",
    "Cód ap. mod. Receptor",
    "Origen Receptor",
    "e",
    "máx",
    "mín",
    "dd=dt",
    "clase",
    "N° de Aprobación Modelo (Receptor)",
    "Fecha de Aprobación Modelo (Receptor)",
    "Tipo (Indicador)",
    "Fabricante Indicador",
    "Marca Indicador",
    "Modelo Indicador",
    "N° de serie Indicador",
    "Código Aprobación (Indicador)",
    "Origen Indicador",
    "N° de Aprobación Modelo (Indicador)",
    "Fecha de Aprobación Modelo (Indicador)",
];

/// Column names used by the assembler.
pub mod col {
    pub const WORK_ORDER: &str = "Número de O.T.";
    pub const VPE: &str = "VPE Nº";
    pub const COMPANY: &str = "Empresa solicitante";
    pub const OWNER: &str = "Razón social (Propietario)";
    pub const FISCAL_STREET: &str = "Domicilio (Fiscal)";
    pub const FISCAL_LOCALITY: &str = "Localidad (Fiscal)";
    pub const FISCAL_PROVINCE: &str = "Provincia (Fiscal)";
    pub const SITE_STREET: &str = "Lugar propio de instalación - Domicilio";
    pub const SITE_LOCALITY: &str = "Lugar propio de instalación - Localidad";
    pub const SITE_PROVINCE: &str = "Lugar propio de instalación - Provincia";
    pub const DESCRIPTION: &str = "Instrumento verificado";
    pub const REC_MANUFACTURER: &str = "Fabricante receptor";
    pub const REC_BRAND: &str = "Marca Receptor";
    pub const REC_MODEL: &str = "Modelo Receptor";
    pub const REC_SERIAL: &str = "N° de serie Receptor";
    pub const REC_CODE: &str = "Cód ap. mod. Receptor";
    pub const REC_ORIGIN: &str = "Origen Receptor";
    pub const REC_E: &str = "e";
    pub const REC_MAX: &str = "máx";
    pub const REC_MIN: &str = "mín";
    pub const REC_DD_DT: &str = "dd=dt";
    pub const REC_CLASS: &str = "clase";
    pub const REC_APPROVAL_NUMBER: &str = "N° de Aprobación Modelo (Receptor)";
    pub const REC_APPROVAL_DATE: &str = "Fecha de Aprobación Modelo (Receptor)";
    pub const IND_TYPE: &str = "Tipo (Indicador)";
    pub const IND_MANUFACTURER: &str = "Fabricante Indicador";
    pub const IND_BRAND: &str = "Marca Indicador";
    pub const IND_MODEL: &str = "Modelo Indicador";
    pub const IND_SERIAL: &str = "N° de serie Indicador";
    pub const IND_CODE: &str = "Código Aprobación (Indicador)";
    pub const IND_ORIGIN: &str = "Origen Indicador";
    pub const IND_APPROVAL_NUMBER: &str = "N° de Aprobación Modelo (Indicador)";
    pub const IND_APPROVAL_DATE: &str = "Fecha de Aprobación Modelo (Indicador)";
}

/// One instrument flattened into the output schema.
///
/// Every column always holds a string, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    values: Vec<String>,
}

impl Default for OutputRow {
    fn default() -> Self {
        Self {
            values: vec![String::new(); COLUMNS.len()],
        }
    }
}

impl OutputRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of a column, matched exactly.
    pub fn column_index(name: &str) -> Option<usize> {
        COLUMNS.iter().position(|c| *c == name)
    }

    /// Value of a column; unknown names read as empty.
    pub fn get(&self, name: &str) -> &str {
        Self::column_index(name)
            .map(|i| self.values[i].as_str())
            .unwrap_or("")
    }

    /// Set a column, trimming the value. Returns false for unknown names.
    pub fn set(&mut self, name: &str, value: impl AsRef<str>) -> bool {
        match Self::column_index(name) {
            Some(i) => {
                self.values[i] = value.as_ref().trim().to_string();
                true
            }
            None => false,
        }
    }

    /// Values in column order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// (column, value) pairs in column order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        COLUMNS
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    /// Build a row from (column, value) pairs, ignoring unknown columns.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut row = Self::new();
        for (name, value) in pairs {
            row.set(name.trim(), value);
        }
        row
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.is_empty())
    }
}

impl Serialize for OutputRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLUMNS.len()))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
