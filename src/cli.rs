//! Command-line surface.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::activation::{self, Capability};
use crate::commands::{
    extract_purchase_orders, extract_technical_reports, fill_order_form, ExtractRequest,
    ExtractionReport, OrderFormReport, OrderFormRequest,
};
use crate::config::Config;
use crate::error::AppError;
use crate::types::FieldSchema;

/// Extract purchase-order and technical-report fields from PDFs into Excel,
/// and fill order forms from PO exports.
#[derive(Parser, Debug)]
#[command(name = "po-automation", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Skip the activation check
    #[arg(long, global = true)]
    pub offline: bool,

    /// Print the run result as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Documents decoded at once (overrides PO_AUTOMATION_CONCURRENCY)
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract purchase-order PDFs into one workbook row each
    PurchaseOrders(ExtractArgs),
    /// Extract technical-report PDFs into one workbook row each
    TechnicalReports(ExtractArgs),
    /// Fill an order form with label quantities from a PO export sheet
    OrderForm(OrderFormArgs),
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// PDF files to extract
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Path of the new workbook (default: timestamped name in the output directory)
    #[arg(short, long, conflicts_with = "append_to")]
    pub output: Option<PathBuf>,

    /// Append rows to this existing workbook instead of creating one
    #[arg(long)]
    pub append_to: Option<PathBuf>,

    /// Sheet to append to (default: first sheet)
    #[arg(long, requires = "append_to")]
    pub sheet: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct OrderFormArgs {
    /// PO export sheet (xlsx, xls, or HTML saved as a spreadsheet)
    pub po_sheet: PathBuf,

    /// Order form workbook to fill
    pub order_form: PathBuf,

    /// Where to save the filled form
    #[arg(short, long, conflicts_with = "in_place")]
    pub output: Option<PathBuf>,

    /// Overwrite the order form itself
    #[arg(long)]
    pub in_place: bool,

    /// Order date as DD/MM/YYYY (default: today)
    #[arg(long)]
    pub order_date: Option<String>,
}

impl From<ExtractArgs> for ExtractRequest {
    fn from(args: ExtractArgs) -> Self {
        Self {
            inputs: args.inputs,
            output: args.output,
            append_to: args.append_to,
            sheet: args.sheet,
        }
    }
}

impl From<OrderFormArgs> for OrderFormRequest {
    fn from(args: OrderFormArgs) -> Self {
        Self {
            po_sheet: args.po_sheet,
            order_form: args.order_form,
            output: args.output,
            in_place: args.in_place,
            order_date: args.order_date,
        }
    }
}

/// Runs a parsed command line. Failed documents inside a batch do not make this fail.
pub fn execute(cli: Cli, mut config: Config) -> Result<(), AppError> {
    if let Some(n) = cli.concurrency {
        if n == 0 {
            return Err(AppError::Config("--concurrency must be at least 1".to_string()));
        }
        config.concurrency = n;
    }

    let capability = if cli.offline {
        info!("Offline mode, activation check skipped");
        Capability::offline()
    } else {
        activation::verify(&config)?
    };

    match cli.command {
        Command::PurchaseOrders(args) => {
            let report = extract_purchase_orders(&capability, &config, &args.into())?;
            emit(cli.json, &report, || summarize_extraction(&report))
        }
        Command::TechnicalReports(args) => {
            let report = extract_technical_reports(&capability, &config, &args.into())?;
            emit(cli.json, &report, || summarize_extraction(&report))
        }
        Command::OrderForm(args) => {
            let report = fill_order_form(&capability, &args.into())?;
            emit(cli.json, &report, || summarize_order_form(&report))
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, summary: impl FnOnce() -> String) -> Result<(), AppError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", summary());
    }
    Ok(())
}

fn summarize_extraction<F: FieldSchema>(report: &ExtractionReport<F>) -> String {
    let mut out = format!(
        "{} {} document(s) {} {}",
        report.result.successes.len(),
        F::DOCUMENT,
        if report.appended { "appended to" } else { "written to" },
        report.workbook.display()
    );
    for failure in &report.result.failures {
        out.push_str(&format!("\n  failed: {} ({})", failure.file_name, failure.error));
    }
    out
}

fn summarize_order_form(report: &OrderFormReport) -> String {
    format!(
        "PO {}: {} label(s), {} cell(s) written to {}",
        report.outcome.po_number,
        report.sheet.entries.len(),
        report.outcome.cells_written,
        report.outcome.output_path.display()
    )
}
