//! Purchase-order automation: field extraction from PO and technical-report
//! PDFs into Excel, and order-form filling from PO export sheets.

pub mod activation;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod excel;
pub mod extractors;
pub mod logging;
pub mod models;
pub mod pdf;
pub mod services;
pub mod sheet_source;
pub mod types;

use clap::Parser;

pub use activation::Capability;
pub use config::Config;
pub use error::AppError;
pub use types::{ExtractedDocument, FieldSchema, PoField, ReportField};

/// Parses the command line, loads configuration, and runs the chosen command.
pub fn run() -> Result<(), AppError> {
    let cli = cli::Cli::parse();
    logging::setup_logging(cli.verbose);
    let config = Config::from_env()?;
    tracing::debug!(?config, "Configuration loaded");
    cli::execute(cli, config)
}
