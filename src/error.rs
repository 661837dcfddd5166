// src/error.rs

//! Unified error handling for the extraction application.

use std::fmt;

use thiserror::Error;

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// None of the known selector variants matched a login field
    #[error("Login field not found: {0}")]
    LoginFieldNotFound(String),

    /// The portal rejected the credentials
    #[error("Authentication failed: the portal is still showing the login form")]
    AuthenticationFailed,

    /// The work order search did not yield a VPE link
    #[error("VPE not found for work order {0}")]
    VpeNotFound(String),

    /// A required page, link or form was missing
    #[error("Navigation error at {context}: {message}")]
    Navigation { context: String, message: String },

    /// The run cannot produce any row
    #[error("Aborted run: {0}")]
    AbortedRun(String),

    /// Workbook writing failed
    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Workbook reading failed
    #[error("Spreadsheet read error: {0}")]
    Spreadsheet(String),

    /// XLSX package (zip container) error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Worksheet XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Template workbook could not be filled
    #[error("Template error: {0}")]
    Template(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a navigation error with context.
    pub fn navigation(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Navigation {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a template error.
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template(message.into())
    }

    /// Create a spreadsheet read error.
    pub fn spreadsheet(message: impl fmt::Display) -> Self {
        Self::Spreadsheet(message.to_string())
    }

    /// Whether the error stopped the run before any page data was read.
    pub fn is_navigation_failure(&self) -> bool {
        matches!(
            self,
            Self::LoginFieldNotFound(_)
                | Self::AuthenticationFailed
                | Self::VpeNotFound(_)
                | Self::Navigation { .. }
                | Self::AbortedRun(_)
        )
    }
}
