use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::Workbook;
use tempfile::tempdir;

use dsr_io::{generate_report, read_table, ReportOptions};
use dsr_report::{ReportError, YearMonth};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../report/tests/fixtures")
}

fn july() -> YearMonth {
    "2021-07".parse().unwrap()
}

fn open(path: &Path) -> Sheets<std::io::BufReader<std::fs::File>> {
    open_workbook_auto(path).unwrap_or_else(|e| panic!("cannot open {}: {e}", path.display()))
}

fn is_blank(value: Option<&Data>) -> bool {
    matches!(value, None | Some(Data::Empty))
}

#[test]
fn three_sales_end_to_end() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let outcome = generate_report(
        &fixtures_dir().join("three_sales.csv"),
        &out,
        july(),
        &ReportOptions::default(),
    )
    .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.month, "2021-07");
    assert_eq!(outcome.files, vec![out.join("DSR_Salmiya.xlsx")]);

    let mut workbook = open(&outcome.files[0]);
    let range = workbook.worksheet_range("Report").unwrap();

    // Dates from A4, one row per day
    assert_eq!(range.get_value((3, 0)), Some(&Data::String("2021-07-01".into())));
    assert_eq!(range.get_value((17, 0)), Some(&Data::String("2021-07-15".into())));
    assert_eq!(range.get_value((33, 0)), Some(&Data::String("2021-07-31".into())));
    assert!(is_blank(range.get_value((34, 0))));

    // Cash product at D18, grooming card at M18
    assert_eq!(range.get_value((17, 3)), Some(&Data::Float(12.0)));
    assert_eq!(range.get_value((17, 12)), Some(&Data::Float(45.0)));
    // Quiet days are written as zero
    assert_eq!(range.get_value((3, 3)), Some(&Data::Float(0.0)));

    // App block: header at Z3, Talabat then Total
    assert_eq!(range.get_value((2, 25)), Some(&Data::String("Talabat".into())));
    assert_eq!(range.get_value((2, 26)), Some(&Data::String("Total".into())));
    assert_eq!(range.get_value((17, 25)), Some(&Data::Float(8.0)));
    assert_eq!(range.get_value((17, 26)), Some(&Data::Float(65.0)));
}

#[test]
fn one_workbook_per_branch() {
    let dir = tempdir().unwrap();
    let options = ReportOptions {
        prefix: "Sales_".into(),
        ..ReportOptions::default()
    };

    let outcome = generate_report(&fixtures_dir().join("july.csv"), dir.path(), july(), &options).unwrap();

    assert_eq!(
        outcome.files,
        vec![
            dir.path().join("Sales_Hawally.xlsx"),
            dir.path().join("Sales_Salmiya.xlsx"),
        ]
    );
    assert_eq!(outcome.stats.branches, 2);
    assert_eq!(outcome.stats.classified_rows, 11);
    assert_eq!(outcome.stats.app_channels, vec!["Card|Jebly", "Talabat"]);

    let mut workbook = open(&outcome.files[0]);
    let range = workbook.worksheet_range("Report").unwrap();
    // Both channels get a column on every branch, then the total
    assert_eq!(range.get_value((2, 25)), Some(&Data::String("Card|Jebly".into())));
    assert_eq!(range.get_value((2, 26)), Some(&Data::String("Talabat".into())));
    assert_eq!(range.get_value((2, 27)), Some(&Data::String("Total".into())));
    // Hawally 2021-07-04
    assert_eq!(range.get_value((6, 25)), Some(&Data::Float(20.0)));
    assert_eq!(range.get_value((6, 26)), Some(&Data::Float(0.0)));
    assert_eq!(range.get_value((6, 27)), Some(&Data::Float(47.0)));
    // Credit|Note product at F7, discount at H7
    assert_eq!(range.get_value((6, 5)), Some(&Data::Float(27.0)));
    assert_eq!(range.get_value((6, 7)), Some(&Data::Float(3.0)));
}

#[test]
fn renders_into_template_sheet() {
    let dir = tempdir().unwrap();
    let template = dir.path().join("Branch_Daily_Sales_Report_Sample.xlsx");
    {
        let mut workbook = Workbook::new();
        let cover = workbook.add_worksheet().set_name("Cover").unwrap();
        cover.write_string(0, 0, "Branch Daily Sales Report").unwrap();
        let jul = workbook.add_worksheet().set_name("JUL").unwrap();
        jul.write_string(1, 3, "Product Sales").unwrap();
        jul.write_formula(35, 3, "=SUM(D4:D34)").unwrap();
        workbook.save(&template).unwrap();
    }

    let options = ReportOptions {
        template: Some(template),
        sheet: Some("JUL".into()),
        ..ReportOptions::default()
    };
    let out = dir.path().join("out");
    let outcome = generate_report(&fixtures_dir().join("three_sales.csv"), &out, july(), &options).unwrap();
    assert_eq!(outcome.files.len(), 1);

    let mut workbook = open(&outcome.files[0]);
    assert_eq!(workbook.sheet_names().to_vec(), vec!["Cover".to_string(), "JUL".to_string()]);

    let cover = workbook.worksheet_range("Cover").unwrap();
    assert_eq!(
        cover.get_value((0, 0)),
        Some(&Data::String("Branch Daily Sales Report".into()))
    );

    let jul = workbook.worksheet_range("JUL").unwrap();
    assert_eq!(jul.get_value((1, 3)), Some(&Data::String("Product Sales".into())));
    assert_eq!(jul.get_value((17, 3)), Some(&Data::Float(12.0)));

    let formulas = workbook.worksheet_formula("JUL").unwrap();
    assert_eq!(formulas.get_value((35, 3)), Some(&"SUM(D4:D34)".to_string()));
}

#[test]
fn branch_failure_does_not_stop_others() {
    let dir = tempdir().unwrap();
    // A directory where the Hawally workbook should go makes its save fail
    std::fs::create_dir(dir.path().join("DSR_Hawally.xlsx")).unwrap();

    let outcome = generate_report(
        &fixtures_dir().join("july.csv"),
        dir.path(),
        july(),
        &ReportOptions::default(),
    )
    .unwrap();

    assert!(!outcome.is_complete());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].branch, "Hawally");
    assert_eq!(outcome.files, vec![dir.path().join("DSR_Salmiya.xlsx")]);
    assert!(outcome.files[0].is_file());
}

#[test]
fn missing_template_sheet_is_fatal() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    let options = ReportOptions {
        sheet: Some("AUG".into()),
        ..ReportOptions::default()
    };

    let err = generate_report(&fixtures_dir().join("three_sales.csv"), &out, july(), &options).unwrap_err();
    assert!(matches!(err, ReportError::Template(_)));
    assert!(!out.exists());
}

#[test]
fn malformed_input_writes_nothing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("bad.csv");
    let content = std::fs::read_to_string(fixtures_dir().join("three_sales.csv"))
        .unwrap()
        .replace(",12\n", ",12 KWD\n");
    std::fs::write(&input, content).unwrap();

    let out = dir.path().join("out");
    let err = generate_report(&input, &out, july(), &ReportOptions::default()).unwrap_err();
    assert!(err.is_input_format(), "{err}");
    assert!(!out.exists());
}

#[test]
fn tab_separated_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("export.tsv");
    let content = std::fs::read_to_string(fixtures_dir().join("three_sales.csv"))
        .unwrap()
        .replace(',', "\t");
    std::fs::write(&input, content).unwrap();

    let table = read_table(&input).unwrap();
    assert_eq!(table.rows.len(), 3);

    let outcome = generate_report(&input, dir.path(), july(), &ReportOptions::default()).unwrap();
    assert_eq!(outcome.files.len(), 1);
}

#[test]
fn prefix_with_separator_is_rejected() {
    let dir = tempdir().unwrap();
    let options = ReportOptions {
        prefix: "../DSR_".into(),
        ..ReportOptions::default()
    };
    let err = generate_report(&fixtures_dir().join("three_sales.csv"), dir.path(), july(), &options).unwrap_err();
    assert!(matches!(err, ReportError::ConfigValidation(_)));
}

#[test]
fn branch_names_cannot_leave_output_dir() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("orders.csv");
    let content = std::fs::read_to_string(fixtures_dir().join("three_sales.csv"))
        .unwrap()
        .replacen("Salmiya Main Shop", "../escaped Shop", 1)
        .replacen("Salmiya Main Shop", "A/B Shop", 1)
        .replacen("Salmiya Main Shop", "A_B Shop", 1);
    std::fs::write(&input, content).unwrap();

    let out = dir.path().join("out");
    let options = ReportOptions {
        prefix: String::new(),
        ..ReportOptions::default()
    };
    let outcome = generate_report(&input, &out, july(), &options).unwrap();

    assert_eq!(outcome.files, vec![out.join(".._escaped.xlsx"), out.join("A_B.xlsx")]);
    assert!(!dir.path().join("escaped.xlsx").exists());
    for file in &outcome.files {
        assert_eq!(file.parent(), Some(out.as_path()));
        assert!(file.is_file());
    }

    // "A/B" and "A_B" share a file name; the first branch keeps it
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].branch, "A_B");
    assert!(outcome.failures[0].message.contains("another branch"));
}
