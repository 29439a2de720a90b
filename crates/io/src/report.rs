// Report generation: input file in, one workbook per branch out

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use dsr_report::config::DEFAULT_PREFIX;
use dsr_report::{run, CellMap, RawTable, ReportConfig, ReportError, RunStats, YearMonth};

use crate::xlsx::TemplateBlueprint;

/// How to render a run's workbooks.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    /// File name prefix; outputs are `{prefix}{branch}.xlsx`.
    pub prefix: String,
    pub template: Option<PathBuf>,
    /// Target sheet of the template. First sheet when unset.
    pub sheet: Option<String>,
    pub layout: CellMap,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            template: None,
            sheet: None,
            layout: CellMap::standard(),
        }
    }
}

impl ReportOptions {
    /// Options from a report config. A relative template path is resolved against `config_dir`.
    pub fn from_config(config: &ReportConfig, config_dir: Option<&Path>) -> Self {
        let template = config.template.as_ref().map(|t| match config_dir {
            Some(dir) if t.is_relative() => dir.join(t),
            _ => t.clone(),
        });
        Self {
            prefix: config.prefix.clone(),
            template,
            sheet: config.sheet.clone(),
            layout: config.cell_map(),
        }
    }
}

/// A branch whose workbook could not be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchFailure {
    pub branch: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutcome {
    pub month: String,
    /// Workbooks written, in branch order.
    pub files: Vec<PathBuf>,
    pub failures: Vec<BranchFailure>,
    pub stats: RunStats,
}

impl ReportOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// File name of a branch workbook, `{prefix}{branch}.xlsx`.
///
/// Branch names come from the input, so path separators, control characters and
/// characters Windows rejects in file names are replaced with `_`.
pub fn workbook_file_name(prefix: &str, branch: &str) -> String {
    let safe: String = branch
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{prefix}{safe}.xlsx")
}

/// Read a POS export: Excel workbooks by extension, anything else as delimited text.
pub fn read_table(path: &Path) -> Result<RawTable, ReportError> {
    if !path.exists() {
        return Err(ReportError::Io(format!("{}: file not found", path.display())));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => crate::xlsx::import_table(path).map_err(ReportError::Input),
        "tsv" => crate::csv::import_tsv(path),
        _ => crate::csv::import(path),
    }
}

/// Generate one daily sales report workbook per branch for `month`.
///
/// Input, template and output-directory problems abort the run. A branch whose
/// workbook cannot be written is recorded in [`ReportOutcome::failures`] and the
/// remaining branches are still rendered.
pub fn generate_report(
    input_path: &Path,
    output_dir: &Path,
    month: YearMonth,
    options: &ReportOptions,
) -> Result<ReportOutcome, ReportError> {
    if options.prefix.contains(|c: char| c == '/' || c == '\\') {
        return Err(ReportError::ConfigValidation(format!(
            "prefix must not contain path separators, got '{}'",
            options.prefix
        )));
    }

    let table = read_table(input_path)?;
    let plan = run(&table, month, &options.layout)?;

    let blueprint = match options.template {
        Some(ref template) => TemplateBlueprint::load(template).map_err(ReportError::Template)?,
        None => TemplateBlueprint::blank(),
    };
    let target = blueprint
        .sheet_index(options.sheet.as_deref())
        .map_err(ReportError::Template)?;

    std::fs::create_dir_all(output_dir)
        .map_err(|e| ReportError::Io(format!("{}: {}", output_dir.display(), e)))?;

    let mut files = Vec::new();
    let mut failures = Vec::new();

    let mut used_names = HashSet::new();

    for branch in &plan.branches {
        let file_name = workbook_file_name(&options.prefix, &branch.branch);
        let path = output_dir.join(&file_name);

        let rendered = if used_names.insert(file_name.clone()) {
            plan.cells_for(branch)
                .map_err(|e| e.to_string())
                .and_then(|cells| blueprint.render(target, &cells, &path))
        } else {
            Err(format!("{} is already written for another branch", file_name))
        };

        match rendered {
            Ok(written) => {
                log::info!("wrote {} ({} cells)", path.display(), written);
                files.push(path);
            }
            Err(message) => {
                log::warn!("branch '{}': {}", branch.branch, message);
                failures.push(BranchFailure {
                    branch: branch.branch.clone(),
                    message,
                });
            }
        }
    }

    if plan.branches.is_empty() {
        log::warn!("no branches found in {}", input_path.display());
    }

    Ok(ReportOutcome {
        month: month.to_string(),
        files,
        failures,
        stats: plan.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = ReportOptions::default();
        assert_eq!(options.prefix, "DSR_");
        assert!(options.template.is_none());
        assert_eq!(options.layout, CellMap::standard());
    }

    #[test]
    fn config_template_is_relative_to_config_dir() {
        let config = ReportConfig::from_toml(
            r#"
prefix = "Sales_"
template = "templates/dsr.xlsx"
sheet = "JUL"
"#,
        )
        .unwrap();
        let options = ReportOptions::from_config(&config, Some(Path::new("/srv/reports")));
        assert_eq!(options.prefix, "Sales_");
        assert_eq!(options.template, Some(PathBuf::from("/srv/reports/templates/dsr.xlsx")));
        assert_eq!(options.sheet.as_deref(), Some("JUL"));

        let options = ReportOptions::from_config(&config, None);
        assert_eq!(options.template, Some(PathBuf::from("templates/dsr.xlsx")));
    }

    #[test]
    fn file_names_stay_inside_output_dir() {
        assert_eq!(workbook_file_name("DSR_", "Salmiya"), "DSR_Salmiya.xlsx");
        assert_eq!(workbook_file_name("", "../escaped"), ".._escaped.xlsx");
        assert_eq!(workbook_file_name("DSR_", "A/B"), "DSR_A_B.xlsx");
        assert_eq!(workbook_file_name("DSR_", "C:\\x\t"), "DSR_C__x_.xlsx");

        let name = workbook_file_name("", "../../etc");
        assert_eq!(Path::new(&name).components().count(), 1);
    }

    #[test]
    fn read_table_missing_file() {
        let err = read_table(Path::new("/nonexistent/export.csv")).unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
