// src/presenter.rs

//! Front-end seam for the extraction pipeline.

use crate::error::Result;
use crate::models::Credentials;

/// What the pipeline needs from whoever is driving it.
pub trait Presenter: Send + Sync {
    /// Show a progress message to the operator.
    fn log(&self, message: &str);

    /// Called after each instrument completes.
    fn progress(&self, current: usize, total: usize);

    /// Ask the operator for portal credentials.
    fn prompt_credentials(&self) -> Result<Credentials>;
}

/// Presenter that only logs; credentials must be supplied up front.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn log(&self, message: &str) {
        log::info!("{}", message);
    }

    fn progress(&self, current: usize, total: usize) {
        log::info!("Progress: {}/{}", current, total);
    }

    fn prompt_credentials(&self) -> Result<Credentials> {
        Err(crate::error::AppError::config(
            "no credentials given and no interactive prompt available",
        ))
    }
}
