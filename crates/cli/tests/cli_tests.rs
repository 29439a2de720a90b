// Integration tests for the dsr binary: exit codes, stdout contracts, written workbooks.
//
// Run with: cargo test -p dsr-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use tempfile::tempdir;

fn dsr() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dsr"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("DSR_CONFIG");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../report/tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run dsr")
}

fn code(output: &Output) -> i32 {
    output.status.code().expect("dsr terminated by signal")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn read_report(path: &Path) -> calamine::Range<Data> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).unwrap();
    workbook.worksheet_range("Report").unwrap()
}

// ===========================================================================
// dsr generate
// ===========================================================================

#[test]
fn generate_writes_branch_workbook() {
    let dir = tempdir().unwrap();
    let out = dir.path().to_str().unwrap();

    let output = run(dsr().args(["generate", fixture("three_sales.csv").as_str(), "--month", "2021-07", "--out-dir", out]));
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty(), "stdout should be empty without --json");
    assert!(stderr(&output).contains("2021-07: 1 workbook(s)"), "stderr: {}", stderr(&output));

    let range = read_report(&dir.path().join("DSR_Salmiya.xlsx"));
    assert_eq!(range.get_value((17, 3)), Some(&Data::Float(12.0)));
    assert_eq!(range.get_value((17, 12)), Some(&Data::Float(45.0)));
    assert_eq!(range.get_value((17, 26)), Some(&Data::Float(65.0)));
}

#[test]
fn generate_json_outcome() {
    let dir = tempdir().unwrap();
    let out = dir.path().to_str().unwrap();

    let output = run(dsr().args([
        "generate",
        fixture("july.csv").as_str(),
        "--month",
        "2021-07",
        "--out-dir",
        out,
        "--json",
        "--quiet",
    ]));
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));

    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim())
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {e}\n{}", stdout(&output)));

    assert_eq!(val["month"], "2021-07");
    assert_eq!(val["files"].as_array().unwrap().len(), 2);
    assert_eq!(val["failures"].as_array().unwrap().len(), 0);
    assert_eq!(val["stats"]["rows_read"], 14);
    assert_eq!(val["stats"]["classified_rows"], 11);
    assert_eq!(val["stats"]["app_channels"], serde_json::json!(["Card|Jebly", "Talabat"]));

    // Quiet keeps stderr free of the summary
    assert!(!stderr(&output).contains("workbook(s)"));
}

#[test]
fn generate_flags_override_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("dsr.toml");
    std::fs::write(&config, "prefix = \"Cfg_\"\n").unwrap();
    let out = dir.path().join("out");

    let output = run(dsr().args([
        "generate",
        fixture("three_sales.csv").as_str(),
        "--month",
        "2021-07",
        "--out-dir",
        out.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]));
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert!(out.join("Cfg_Salmiya.xlsx").is_file());

    let output = run(dsr().args([
        "generate",
        fixture("three_sales.csv").as_str(),
        "--month",
        "2021-07",
        "--out-dir",
        out.to_str().unwrap(),
        "--prefix",
        "Cli_",
    ]).env("DSR_CONFIG", &config));
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert!(out.join("Cli_Salmiya.xlsx").is_file());
}

#[test]
fn generate_partial_failure_exits_1() {
    let dir = tempdir().unwrap();
    std::fs::create_dir(dir.path().join("DSR_Hawally.xlsx")).unwrap();

    let output = run(dsr().args([
        "generate",
        fixture("july.csv").as_str(),
        "--month",
        "2021-07",
        "--out-dir",
        dir.path().to_str().unwrap(),
    ]));
    assert_eq!(code(&output), 1);
    assert!(stderr(&output).contains("1 of 2 branch workbook(s) failed: Hawally"), "stderr: {}", stderr(&output));
    assert!(dir.path().join("DSR_Salmiya.xlsx").is_file());
}

#[test]
fn generate_bad_month_exits_2() {
    let dir = tempdir().unwrap();
    let output = run(dsr().args([
        "generate",
        fixture("three_sales.csv").as_str(),
        "--month",
        "July",
        "--out-dir",
        dir.path().to_str().unwrap(),
    ]));
    assert_eq!(code(&output), 2);
    assert!(stderr(&output).contains("hint:  use YYYY-MM"));
}

#[test]
fn generate_missing_column_exits_3() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("orders.csv");
    std::fs::write(&input, "Order Date,Total\n2021-07-01,5\n").unwrap();

    let output = run(dsr().args([
        "generate",
        input.to_str().unwrap(),
        "--month",
        "2021-07",
        "--out-dir",
        dir.path().to_str().unwrap(),
    ]));
    assert_eq!(code(&output), 3);
    let err = stderr(&output);
    assert!(err.contains("missing column 'Point of Sale Name'"), "stderr: {err}");
    assert!(err.contains("hint:"));
}

#[test]
fn generate_bad_config_exits_4() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("dsr.toml");
    std::fs::write(&config, "[[layout.blocks]]\nrow = 0\ncol = 1\ncolumns = [\"Date\"]\n\n[layout.channels]\nrow = 3\ncol = 26\n").unwrap();

    let output = run(dsr().args([
        "generate",
        fixture("three_sales.csv").as_str(),
        "--month",
        "2021-07",
        "--config",
        config.to_str().unwrap(),
    ]));
    assert_eq!(code(&output), 4);
    assert!(stderr(&output).contains("config validation error"));
}

#[test]
fn generate_missing_input_exits_5() {
    let dir = tempdir().unwrap();
    let output = run(dsr().args([
        "generate",
        dir.path().join("missing.csv").to_str().unwrap(),
        "--month",
        "2021-07",
        "--out-dir",
        dir.path().to_str().unwrap(),
    ]));
    assert_eq!(code(&output), 5);
}

#[test]
fn generate_missing_template_exits_5() {
    let dir = tempdir().unwrap();
    let output = run(dsr().args([
        "generate",
        fixture("three_sales.csv").as_str(),
        "--month",
        "2021-07",
        "--out-dir",
        dir.path().to_str().unwrap(),
        "--template",
        dir.path().join("missing.xlsx").to_str().unwrap(),
    ]));
    assert_eq!(code(&output), 5);
    assert!(stderr(&output).contains("template error"));
}

// ===========================================================================
// dsr preview
// ===========================================================================

#[test]
fn preview_prints_month_csv() {
    let output = run(dsr().args([
        "preview",
        fixture("three_sales.csv").as_str(),
        "--month",
        "2021-07",
        "--branch",
        "Salmiya",
    ]));
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 32, "header + 31 days");
    assert!(lines[0].starts_with("Branch,Date,"));
    assert!(lines[0].ends_with(",Total"));
    assert!(lines[1].starts_with("Salmiya,2021-07-01,"));

    let header: Vec<&str> = lines[0].split(',').collect();
    let day15: Vec<&str> = lines[15].split(',').collect();
    let at = |name: &str| day15[header.iter().position(|h| *h == name).unwrap()];
    assert_eq!(at("Date"), "2021-07-15");
    assert_eq!(at("Cash_P"), "12");
    assert_eq!(at("Card_G"), "45");
    assert_eq!(at("Talabat_App"), "8");
    assert_eq!(at("Total"), "65");
}

#[test]
fn preview_unknown_branch_exits_2() {
    let output = run(dsr().args([
        "preview",
        fixture("july.csv").as_str(),
        "--month",
        "2021-07",
        "--branch",
        "Fintas",
    ]));
    assert_eq!(code(&output), 2);
    assert!(stderr(&output).contains("available branches: Hawally, Salmiya"));
}

// ===========================================================================
// dsr layout
// ===========================================================================

#[test]
fn layout_lists_addresses() {
    let output = run(dsr().args(["layout"]));
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("A4\tDate"));
    assert!(text.contains("D4\tCash_P"));
    assert!(text.contains("I4\tRefunds_P"));
    assert!(text.contains("L4\tCash_G"));
    assert!(text.contains("Z3\tapp channel names, then Total (header)"));
    assert!(text.contains("Z4\tone column per app channel, then Total"));
}

#[test]
fn layout_json() {
    let output = run(dsr().args(["layout", "--json"]));
    assert_eq!(code(&output), 0);

    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(val["blocks"].as_array().unwrap().len(), 3);
    assert_eq!(val["channels"]["col"], 26);
    assert_eq!(val["channels"]["total_column"], "Total");
}
