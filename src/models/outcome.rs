// src/models/outcome.rs

//! Per-step extraction outcomes.
//!
//! A step either resolves, degrades to a fallback value with a reason, or
//! fails the run through `AppError`. Degradations are collected into an
//! [`ExtractionReport`] and shown at the end of the run.

use serde::Serialize;

/// Result of one non-fatal extraction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Resolved(T),
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Resolved(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Take the value, recording a degradation under `context`.
    pub fn record(self, report: &mut ExtractionReport, context: impl Into<String>) -> T {
        match self {
            Self::Resolved(value) => value,
            Self::Degraded { value, reason } => {
                report.push(context, reason);
                value
            }
        }
    }
}

/// A step that fell back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    /// Where it happened, e.g. "instrument 2 / indicador model"
    pub context: String,
    pub reason: String,
}

/// Summary of a run's degraded steps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    pub instruments_total: usize,
    pub degradations: Vec<Degradation>,
}

impl ExtractionReport {
    pub fn push(&mut self, context: impl Into<String>, reason: impl Into<String>) {
        let degradation = Degradation {
            context: context.into(),
            reason: reason.into(),
        };
        log::warn!("{}: {}", degradation.context, degradation.reason);
        self.degradations.push(degradation);
    }

    pub fn is_clean(&self) -> bool {
        self.degradations.is_empty()
    }
}
