//! `dsr generate`, `dsr preview` and `dsr layout`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use dsr_io::{generate_report, read_table, ReportOptions};
use dsr_report::cellmap::cell_address;
use dsr_report::model::{BRANCH_COLUMN, DATE_COLUMN};
use dsr_report::{BranchReport, CellValue, ReportConfig, YearMonth};

use crate::exit_codes::{EXIT_IO, EXIT_PARTIAL};
use crate::CliError;

pub struct GenerateArgs {
    pub input: PathBuf,
    pub month: String,
    pub out_dir: PathBuf,
    pub prefix: Option<String>,
    pub template: Option<PathBuf>,
    pub sheet: Option<String>,
    pub config: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

fn io_err(e: impl std::fmt::Display) -> CliError {
    CliError::new(EXIT_IO, e.to_string())
}

/// Load the report config, or defaults when none is given. Also returns the config's directory.
fn load_config(path: Option<&Path>) -> Result<(ReportConfig, Option<PathBuf>), CliError> {
    let Some(path) = path else {
        return Ok((ReportConfig::default(), None));
    };
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| io_err(format!("cannot read config {}: {e}", path.display())))?;
    let config = ReportConfig::from_toml(&config_str)?;
    let dir = path.parent().map(|p| p.to_path_buf());
    Ok((config, dir))
}

// ============================================================================
// generate
// ============================================================================

pub fn cmd_generate(args: GenerateArgs) -> Result<(), CliError> {
    let month: YearMonth = args.month.parse()?;
    let (config, config_dir) = load_config(args.config.as_deref())?;

    // Flags win over the config file
    let mut options = ReportOptions::from_config(&config, config_dir.as_deref());
    if let Some(prefix) = args.prefix {
        options.prefix = prefix;
    }
    if let Some(template) = args.template {
        options.template = Some(template);
    }
    if let Some(sheet) = args.sheet {
        options.sheet = Some(sheet);
    }

    let outcome = generate_report(&args.input, &args.out_dir, month, &options)?;

    if args.json {
        let json_str = serde_json::to_string_pretty(&outcome)
            .map_err(|e| io_err(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    if !args.quiet {
        let s = &outcome.stats;
        eprintln!(
            "{}: {} workbook(s) in {} from {} rows ({} classified, {} without subtotal, {} excluded)",
            outcome.month,
            outcome.files.len(),
            args.out_dir.display(),
            s.rows_read,
            s.classified_rows,
            s.dropped_missing_subtotal,
            s.excluded_gift_coupon + s.excluded_bathclub,
        );
    }

    if !outcome.is_complete() {
        let failed: Vec<&str> = outcome.failures.iter().map(|f| f.branch.as_str()).collect();
        return Err(CliError::new(
            EXIT_PARTIAL,
            format!(
                "{} of {} branch workbook(s) failed: {}",
                failed.len(),
                failed.len() + outcome.files.len(),
                failed.join(", ")
            ),
        ));
    }

    Ok(())
}

// ============================================================================
// preview
// ============================================================================

pub fn cmd_preview(
    input: PathBuf,
    month: String,
    branch: Option<String>,
    config: Option<PathBuf>,
) -> Result<(), CliError> {
    let month: YearMonth = month.parse()?;
    let (config, _) = load_config(config.as_deref())?;

    let table = read_table(&input)?;
    let plan = dsr_report::run(&table, month, &config.cell_map())?;

    let branches: Vec<&BranchReport> = match branch {
        Some(ref name) => {
            let found = plan.branch(name).ok_or_else(|| {
                let available: Vec<&str> = plan.branches.iter().map(|b| b.branch.as_str()).collect();
                CliError::args(format!("unknown branch: \"{name}\""))
                    .with_hint(format!("available branches: {}", available.join(", ")))
            })?;
            vec![found]
        }
        None => plan.branches.iter().collect(),
    };

    let columns: Vec<&str> = [BRANCH_COLUMN, DATE_COLUMN]
        .into_iter()
        .chain(plan.columns.iter().map(String::as_str))
        .collect();

    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());
    writer.write_record(&columns).map_err(io_err)?;

    for report in branches {
        for row in &report.rows {
            let record: Vec<String> = columns.iter().map(|c| cell_text(&row.cell(c))).collect();
            writer.write_record(&record).map_err(io_err)?;
        }
    }

    writer.flush().map_err(io_err)?;
    Ok(())
}

fn cell_text(value: &CellValue) -> String {
    match value {
        // Format nicely: integers without decimals
        CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        CellValue::Number(n) => format!("{}", n),
        CellValue::Text(s) => s.clone(),
    }
}

// ============================================================================
// layout
// ============================================================================

pub fn cmd_layout(config: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let (config, _) = load_config(config.as_deref())?;
    let map = config.cell_map();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        let json_str = serde_json::to_string_pretty(&map)
            .map_err(|e| io_err(format!("JSON serialization error: {e}")))?;
        writeln!(out, "{json_str}").map_err(io_err)?;
        return Ok(());
    }

    writeln!(out, "# first cell of each column; one row per day of the month below it").map_err(io_err)?;

    // Config validation keeps every block on the sheet
    for block in &map.blocks {
        let mut row = block.row;
        if block.header {
            for (offset, column) in block.columns.iter().enumerate() {
                let Some(col) = block.col_at(offset) else { break };
                writeln!(out, "{}\t{} (header)", cell_address(row, col), column.label).map_err(io_err)?;
            }
            row = row.saturating_add(1);
        }
        for (offset, column) in block.columns.iter().enumerate() {
            let Some(col) = block.col_at(offset) else { break };
            writeln!(out, "{}\t{}", cell_address(row, col), column.source).map_err(io_err)?;
        }
    }

    let channels = &map.channels;
    let mut row = channels.row;
    if channels.header {
        writeln!(
            out,
            "{}\tapp channel names, then {} (header)",
            cell_address(row, channels.col),
            channels.total_column
        )
        .map_err(io_err)?;
        row = row.saturating_add(1);
    }
    writeln!(
        out,
        "{}\tone column per app channel, then {}",
        cell_address(row, channels.col),
        channels.total_column
    )
    .map_err(io_err)?;

    Ok(())
}
