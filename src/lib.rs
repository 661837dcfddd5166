// src/lib.rs

//! MetroWeb VPE extraction library

pub mod error;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod presenter;
pub mod services;
pub mod utils;
