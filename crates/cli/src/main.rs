// dsr - daily sales report generator for point-of-sale exports

mod exit_codes;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dsr_report::ReportError;

use exit_codes::{report_exit_code, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "dsr")]
#[command(about = "Daily sales report workbooks from point-of-sale exports")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one report workbook per branch for a month
    #[command(after_help = "\
Examples:
  dsr generate orders.csv --month 2021-07
  dsr generate orders.xlsx --month 2021-07 --out-dir reports --prefix Sales_
  dsr generate orders.csv --month 2021-07 --template Branch_Daily_Sales_Report_Sample.xlsx --sheet JUL
  dsr generate orders.csv --month 2021-07 --config dsr.toml --json")]
    Generate {
        /// POS order-lines export (.csv, .tsv, .txt, .xlsx, .xls, .ods)
        input: PathBuf,

        /// Report month as YYYY-MM
        #[arg(long, short = 'm')]
        month: String,

        /// Directory receiving the workbooks (created if missing)
        #[arg(long, short = 'o', default_value = ".")]
        out_dir: PathBuf,

        /// Workbook file name prefix [default: DSR_]
        #[arg(long)]
        prefix: Option<String>,

        /// Template workbook copied for every branch
        #[arg(long)]
        template: Option<PathBuf>,

        /// Template sheet receiving the report (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Report config (TOML)
        #[arg(long, env = "DSR_CONFIG")]
        config: Option<PathBuf>,

        /// Print the run outcome as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Only log warnings and errors
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Print the month-filled wide table as CSV
    #[command(after_help = "\
Examples:
  dsr preview orders.csv --month 2021-07
  dsr preview orders.csv --month 2021-07 --branch Salmiya > salmiya.csv")]
    Preview {
        /// POS order-lines export
        input: PathBuf,

        /// Report month as YYYY-MM
        #[arg(long, short = 'm')]
        month: String,

        /// Only this branch
        #[arg(long, short = 'b')]
        branch: Option<String>,

        /// Report config (TOML)
        #[arg(long, env = "DSR_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print the report cell layout with A1 addresses
    #[command(after_help = "\
Examples:
  dsr layout
  dsr layout --config dsr.toml --json")]
    Layout {
        /// Report config (TOML)
        #[arg(long, env = "DSR_CONFIG")]
        config: Option<PathBuf>,

        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Log to stderr; `RUST_LOG` overrides the default filter.
fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "dsr=info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: dsr <command> [options]");
            eprintln!("       dsr --help for more information");
            Ok(())
        }
        Some(Commands::Generate {
            input,
            month,
            out_dir,
            prefix,
            template,
            sheet,
            config,
            json,
            quiet,
        }) => {
            init_logging(quiet);
            report::cmd_generate(report::GenerateArgs {
                input,
                month,
                out_dir,
                prefix,
                template,
                sheet,
                config,
                json,
                quiet,
            })
        }
        Some(Commands::Preview { input, month, branch, config }) => {
            init_logging(true);
            report::cmd_preview(input, month, branch, config)
        }
        Some(Commands::Layout { config, json }) => report::cmd_layout(config, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReportError> for CliError {
    fn from(err: ReportError) -> Self {
        let hint = match &err {
            ReportError::MissingColumn { .. } => Some(format!(
                "expected a POS order-lines export with columns: {}",
                dsr_report::columns::REQUIRED.join(", ")
            )),
            ReportError::InvalidMonth(_) => Some("use YYYY-MM, e.g. 2021-07".to_string()),
            ReportError::Template(_) => Some("check --template and --sheet".to_string()),
            _ => None,
        };
        Self {
            code: report_exit_code(&err),
            message: err.to_string(),
            hint,
        }
    }
}
