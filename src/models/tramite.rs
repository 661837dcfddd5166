// src/models/tramite.rs

//! Work order and trámite records.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static WORK_ORDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}-\d{5}$").expect("work order regex"));

/// A work order (OT) number as typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder(String);

impl WorkOrder {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the number has the usual `NNN-NNNNN` shape.
    ///
    /// Other shapes are still searched; the portal is the authority.
    pub fn is_well_formed(&self) -> bool {
        WORK_ORDER_RE.is_match(&self.0)
    }
}

impl fmt::Display for WorkOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trámite-level data shared by every instrument of a VPE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tramite {
    /// OT number as shown on the summary page
    pub work_order: String,

    /// Numeric VPE identifier
    pub vpe: String,

    /// Requesting company
    pub company: String,

    /// Represented user from the summary page
    pub represented_user: String,

    /// Instrument owner from the detail page
    pub owner_name: String,

    /// Legal (fiscal) address from the detail page
    pub legal_address: String,
}

impl Tramite {
    /// Owner name, falling back to the represented user.
    pub fn owner(&self) -> &str {
        if self.owner_name.trim().is_empty() {
            self.represented_user.trim()
        } else {
            self.owner_name.trim()
        }
    }

    /// Every row carries the OT and the VPE number; both must be known.
    pub fn is_identified(&self) -> bool {
        !self.work_order.trim().is_empty() && !self.vpe.trim().is_empty()
    }
}
