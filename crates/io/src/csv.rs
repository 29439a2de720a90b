// CSV/TSV import of point-of-sale exports

use std::path::Path;

use dsr_report::columns::REQUIRED;
use dsr_report::table::parse_delimited;
use dsr_report::{RawTable, ReportError};

/// Candidate delimiters. On a tie the earlier one wins.
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Data rows compared against the header when sniffing.
const SNIFF_ROWS: usize = 9;

/// Import a delimited export, sniffing the delimiter.
pub fn import(path: &Path) -> Result<RawTable, ReportError> {
    let content = read_text(path)?;
    let delimiter = sniff_delimiter(&content);
    log::debug!("{}: delimiter {:?}", path.display(), delimiter as char);
    parse_delimited(&content, delimiter)
}

pub fn import_tsv(path: &Path) -> Result<RawTable, ReportError> {
    import_with_delimiter(path, b'\t')
}

pub fn import_with_delimiter(path: &Path, delimiter: u8) -> Result<RawTable, ReportError> {
    let content = read_text(path)?;
    parse_delimited(&content, delimiter)
}

/// Pick the delimiter of a POS export.
///
/// The header is split with every candidate and the one that recovers the most
/// required column names wins. A header naming none of them (a foreign export)
/// falls back to the candidate whose field count holds steady over the first rows.
pub fn sniff_delimiter(content: &str) -> u8 {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return b',';
    };
    let sample: Vec<&str> = lines.take(SNIFF_ROWS).collect();

    let mut best = b',';
    let mut best_key = (0usize, 0usize);

    for delimiter in DELIMITERS {
        let names = split_line(header, delimiter);
        if names.len() <= 1 {
            continue;
        }

        let known = names
            .iter()
            .filter(|name| REQUIRED.contains(&name.trim_start_matches('\u{feff}').trim()))
            .count();
        let steady_rows = 1 + sample
            .iter()
            .filter(|line| split_line(line, delimiter).len() == names.len())
            .count();

        let key = (known, steady_rows * names.len());
        if key > best_key {
            best_key = key;
            best = delimiter;
        }
    }

    best
}

/// Fields of one line, honouring quotes.
fn split_line(line: &str, delimiter: u8) -> Vec<String> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|record| record.ok())
        .map(|record| record.iter().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Read an export as text. Files that are not UTF-8 come from Windows POS
/// terminals and are decoded as Windows-1252.
fn read_text(path: &Path) -> Result<String, ReportError> {
    let bytes = std::fs::read(path).map_err(|e| ReportError::Io(format!("{}: {}", path.display(), e)))?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(e.as_bytes());
            log::debug!("{}: not UTF-8, decoded as Windows-1252", path.display());
            Ok(text.into_owned())
        }
    }
}
