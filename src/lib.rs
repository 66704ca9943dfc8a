//! `delivery-plan` library crate.
//!
//! Turns a delivery-plan workbook (a "regular products" sheet with numbered
//! batch columns and an "S-level products" sheet with one column per date)
//! into a deduplicated SKU x 60-day upload schedule.
//!
//! The binary is a thin wrapper around [`cli::run_with_args`]; the HTTP
//! front-end in [`server`] drives the same [`pipeline`] functions.

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod server;
