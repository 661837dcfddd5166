// src/models/config.rs

//! Application configuration structures.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::LabelConfig;

/// Longest worksheet name Excel accepts.
const MAX_SHEET_NAME: usize = 31;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal location, paths and selectors
    #[serde(default)]
    pub portal: PortalConfig,

    /// Label synonyms for every scraped field
    #[serde(default)]
    pub labels: LabelConfig,

    /// Row assembly business rules
    #[serde(default)]
    pub rules: RulesConfig,

    /// Workbook output settings
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let portal = &self.portal;
        Url::parse(&portal.base_url)
            .map_err(|e| AppError::validation(format!("portal.base_url is invalid: {}", e)))?;
        if portal.user_agent.trim().is_empty() {
            return Err(AppError::validation("portal.user_agent is empty"));
        }
        if portal.timeout_secs == 0 {
            return Err(AppError::validation("portal.timeout_secs must be > 0"));
        }
        for (key, path) in [
            ("login_path", &portal.login_path),
            ("search_path", &portal.search_path),
            ("summary_path", &portal.summary_path),
            ("detail_path", &portal.detail_path),
            ("instrument_path", &portal.instrument_path),
        ] {
            if !path.starts_with('/') {
                return Err(AppError::validation(format!(
                    "portal.{} must start with '/'",
                    key
                )));
            }
        }
        for (key, marker) in [
            ("vpe_link_marker", &portal.vpe_link_marker),
            ("instrument_link_marker", &portal.instrument_link_marker),
            ("model_link_marker", &portal.model_link_marker),
            ("instrument_id_param", &portal.instrument_id_param),
        ] {
            if marker.trim().is_empty() {
                return Err(AppError::validation(format!("portal.{} is empty", key)));
            }
        }
        portal.selectors.validate()?;

        for (key, labels) in self.labels.entries() {
            if labels.is_empty() {
                return Err(AppError::validation(format!("labels.{} has no labels", key)));
            }
        }

        self.export.validate()
    }
}

/// Portal location and navigation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Scheme and host of the portal
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds; a page that takes longer is a page fault
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Pause after each navigation in milliseconds
    #[serde(default = "defaults::settle_delay")]
    pub settle_delay_ms: u64,

    #[serde(default = "defaults::login_path")]
    pub login_path: String,

    #[serde(default = "defaults::search_path")]
    pub search_path: String,

    #[serde(default = "defaults::summary_path")]
    pub summary_path: String,

    #[serde(default = "defaults::detail_path")]
    pub detail_path: String,

    #[serde(default = "defaults::instrument_path")]
    pub instrument_path: String,

    /// Substring identifying the VPE link in search results
    #[serde(default = "defaults::vpe_link_marker")]
    pub vpe_link_marker: String,

    /// Substring identifying instrument detail links
    #[serde(default = "defaults::instrument_link_marker")]
    pub instrument_link_marker: String,

    /// Substring identifying model detail links
    #[serde(default = "defaults::model_link_marker")]
    pub model_link_marker: String,

    /// Query parameter carrying the instrument id
    #[serde(default = "defaults::instrument_id_param")]
    pub instrument_id_param: String,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            settle_delay_ms: defaults::settle_delay(),
            login_path: defaults::login_path(),
            search_path: defaults::search_path(),
            summary_path: defaults::summary_path(),
            detail_path: defaults::detail_path(),
            instrument_path: defaults::instrument_path(),
            vpe_link_marker: defaults::vpe_link_marker(),
            instrument_link_marker: defaults::instrument_link_marker(),
            model_link_marker: defaults::model_link_marker(),
            instrument_id_param: defaults::instrument_id_param(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Absolute URL of a portal path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Instrument detail URL for an instrument id.
    pub fn instrument_url(&self, id: &str) -> String {
        format!(
            "{}?{}={}",
            self.url(&self.instrument_path),
            self.instrument_id_param,
            id
        )
    }
}

/// Ordered CSS selector variants for the login and search forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "defaults::user_field")]
    pub user_field: Vec<String>,

    #[serde(default = "defaults::password_field")]
    pub password_field: Vec<String>,

    #[serde(default = "defaults::login_submit")]
    pub login_submit: Vec<String>,

    #[serde(default = "defaults::work_order_field")]
    pub work_order_field: Vec<String>,

    /// Text near the work order box when no selector matches
    #[serde(default = "defaults::work_order_field_labels")]
    pub work_order_field_labels: Vec<String>,

    #[serde(default = "defaults::search_submit")]
    pub search_submit: Vec<String>,

    /// Hidden inputs listing instrument ids on the detail page
    #[serde(default = "defaults::instrument_id_input")]
    pub instrument_id_input: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            user_field: defaults::user_field(),
            password_field: defaults::password_field(),
            login_submit: defaults::login_submit(),
            work_order_field: defaults::work_order_field(),
            work_order_field_labels: defaults::work_order_field_labels(),
            search_submit: defaults::search_submit(),
            instrument_id_input: defaults::instrument_id_input(),
        }
    }
}

impl SelectorConfig {
    fn validate(&self) -> Result<()> {
        for (key, variants) in [
            ("user_field", &self.user_field),
            ("password_field", &self.password_field),
            ("work_order_field", &self.work_order_field),
        ] {
            if variants.is_empty() {
                return Err(AppError::validation(format!(
                    "portal.selectors.{} has no variants",
                    key
                )));
            }
        }

        let all = self
            .user_field
            .iter()
            .chain(&self.password_field)
            .chain(&self.login_submit)
            .chain(&self.work_order_field)
            .chain(&self.search_submit)
            .chain(std::iter::once(&self.instrument_id_input));
        for selector in all {
            Selector::parse(selector).map_err(|e| AppError::selector(selector, e))?;
        }
        Ok(())
    }
}

/// Row assembly rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Render approval dates as "22 de abril de 1997"
    #[serde(default = "defaults::enabled")]
    pub spanish_dates: bool,

    /// Export the receptor `e` as its `dd/dt` value
    #[serde(default = "defaults::enabled")]
    pub receptor_e_from_dd_dt: bool,

    /// Value of the "Instrumento verificado" column
    #[serde(default = "defaults::instrument_description")]
    pub instrument_description: String,

    /// Value of the "Tipo (Indicador)" column
    #[serde(default = "defaults::indicator_type")]
    pub indicator_type: String,

    /// Split the legal address into street, locality and province
    #[serde(default)]
    pub split_fiscal_address: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            spanish_dates: true,
            receptor_e_from_dd_dt: true,
            instrument_description: defaults::instrument_description(),
            indicator_type: defaults::indicator_type(),
            split_fiscal_address: false,
        }
    }
}

/// Workbook layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// One row per instrument
    Wide,
    /// Two columns, one row per field
    #[default]
    CampoValor,
    /// Fill a pre-formatted template workbook
    Template,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "wide" | "tabla" => Ok(Self::Wide),
            "campo-valor" | "2col" | "two-column" => Ok(Self::CampoValor),
            "template" | "plantilla" => Ok(Self::Template),
            other => Err(format!(
                "unknown output format '{}' (expected wide, campo-valor or template)",
                other
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wide => "wide",
            Self::CampoValor => "campo-valor",
            Self::Template => "template",
        };
        f.write_str(name)
    }
}

/// Workbook output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Sheet name of the wide layout
    #[serde(default = "defaults::wide_sheet")]
    pub wide_sheet: String,

    /// Sheet name of the Campo/Valor layout
    #[serde(default = "defaults::campo_valor_sheet")]
    pub campo_valor_sheet: String,

    /// Add a per-model summary sheet to the wide layout
    #[serde(default = "defaults::enabled")]
    pub summary_sheet: bool,

    #[serde(default)]
    pub template: TemplateConfig,

    #[serde(default)]
    pub merge: MergeConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            wide_sheet: defaults::wide_sheet(),
            campo_valor_sheet: defaults::campo_valor_sheet(),
            summary_sheet: true,
            template: TemplateConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<()> {
        for (key, name) in [
            ("export.wide_sheet", &self.wide_sheet),
            ("export.campo_valor_sheet", &self.campo_valor_sheet),
            ("export.template.sheet", &self.template.sheet),
            ("export.merge.sheet_name", &self.merge.sheet_name),
        ] {
            validate_sheet_name(key, name)?;
        }
        if self.merge.copy_suffix.trim().is_empty() {
            return Err(AppError::validation("export.merge.copy_suffix is empty"));
        }

        let cell_re = Regex::new(r"^[A-Z]{1,3}[1-9][0-9]*$")
            .map_err(|e| AppError::config(e.to_string()))?;
        for (field, target) in &self.template.cells {
            if !cell_re.is_match(target.cell()) {
                return Err(AppError::validation(format!(
                    "export.template.cells.{}: '{}' is not a cell reference",
                    field,
                    target.cell()
                )));
            }
        }
        Ok(())
    }
}

fn validate_sheet_name(key: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation(format!("{} is empty", key)));
    }
    if name.chars().count() > MAX_SHEET_NAME {
        return Err(AppError::validation(format!(
            "{} is longer than {} characters",
            key, MAX_SHEET_NAME
        )));
    }
    if name.contains(['[', ']', ':', '*', '?', '/', '\\']) {
        return Err(AppError::validation(format!(
            "{} contains a character Excel rejects",
            key
        )));
    }
    Ok(())
}

/// Template fill settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Template workbook used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Worksheet to fill
    #[serde(default = "defaults::template_sheet")]
    pub sheet: String,

    /// Write one workbook per instrument instead of only the first
    #[serde(default = "defaults::enabled")]
    pub one_file_per_instrument: bool,

    /// Column name to cell overrides, applied after label matching
    #[serde(default)]
    pub cells: BTreeMap<String, CellTarget>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            path: None,
            sheet: defaults::template_sheet(),
            one_file_per_instrument: true,
            cells: BTreeMap::new(),
        }
    }
}

/// Explicit target cell for a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellTarget {
    /// `"B7"`
    Cell(String),
    /// `{ cell = "B7", keep_existing = true }`
    Detailed {
        cell: String,
        #[serde(default)]
        keep_existing: bool,
    },
}

impl CellTarget {
    pub fn cell(&self) -> &str {
        match self {
            Self::Cell(cell) | Self::Detailed { cell, .. } => cell,
        }
    }

    /// Leave a non-empty template cell alone.
    pub fn keep_existing(&self) -> bool {
        matches!(
            self,
            Self::Detailed {
                keep_existing: true,
                ..
            }
        )
    }
}

/// Settings for inserting the data sheet into an existing workbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Name of the inserted sheet
    #[serde(default = "defaults::merge_sheet")]
    pub sheet_name: String,

    /// Suffix of the copied workbook's file stem
    #[serde(default = "defaults::merge_suffix")]
    pub copy_suffix: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            sheet_name: defaults::merge_sheet(),
            copy_suffix: defaults::merge_suffix(),
        }
    }
}

mod defaults {
    // Portal defaults
    pub fn base_url() -> String {
        "https://app.inti.gob.ar".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; metroweb/0.1)".into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn settle_delay() -> u64 {
        300
    }
    pub fn login_path() -> String {
        "/MetroWeb/pages/ingreso.jsp".into()
    }
    pub fn search_path() -> String {
        "/MetroWeb/entrarPML.do".into()
    }
    pub fn summary_path() -> String {
        "/MetroWeb/pages/tramiteVPE/resumen.jsp".into()
    }
    pub fn detail_path() -> String {
        "/MetroWeb/pages/tramiteVPE/detalle.jsp".into()
    }
    pub fn instrument_path() -> String {
        "/MetroWeb/instrumentoDetalle.do".into()
    }
    pub fn vpe_link_marker() -> String {
        "tramiteVPE".into()
    }
    pub fn instrument_link_marker() -> String {
        "instrumentoDetalle.do".into()
    }
    pub fn model_link_marker() -> String {
        "modeloDetalle.do".into()
    }
    pub fn instrument_id_param() -> String {
        "idInstrumento".into()
    }

    // Selector defaults
    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }
    pub fn user_field() -> Vec<String> {
        list(&[
            r#"input[name="usuario"]"#,
            "input#usuario",
            r#"input[type="text"]"#,
        ])
    }
    pub fn password_field() -> Vec<String> {
        list(&[
            r#"input[name="contrasena"]"#,
            r#"input[name="password"]"#,
            r#"input[type="password"]"#,
        ])
    }
    pub fn login_submit() -> Vec<String> {
        list(&[
            r#"input[value="Ingresar"]"#,
            r#"input[type="submit"]"#,
            r#"button[type="submit"]"#,
        ])
    }
    pub fn work_order_field() -> Vec<String> {
        list(&[r#"input[name="numeroOT"]"#, r#"input[name="nroOT"]"#])
    }
    pub fn work_order_field_labels() -> Vec<String> {
        list(&["Número OT", "Numero OT", "Nro OT"])
    }
    pub fn search_submit() -> Vec<String> {
        list(&[r#"input[value="Buscar"]"#, r#"input[type="submit"]"#])
    }
    pub fn instrument_id_input() -> String {
        r#"input[name^="instrumentos["][name$=".idInstrumento"]"#.into()
    }

    // Rule defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn instrument_description() -> String {
        "Balanza para pesar camiones".into()
    }
    pub fn indicator_type() -> String {
        "electrónica".into()
    }

    // Export defaults
    pub fn wide_sheet() -> String {
        "Instrumentos".into()
    }
    pub fn campo_valor_sheet() -> String {
        "Verificación".into()
    }
    pub fn template_sheet() -> String {
        "Identificación del Instrumento".into()
    }
    pub fn merge_sheet() -> String {
        "datos vpe".into()
    }
    pub fn merge_suffix() -> String {
        "_con_datos_vpe".into()
    }
}
