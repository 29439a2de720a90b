use crate::error::ReportError;
use crate::model::{RawRow, RawTable};

/// Parse delimited text with a header row into a [`RawTable`].
///
/// Short rows are padded with empty (missing) fields; fields are trimmed.
pub fn parse_delimited(data: &str, delimiter: u8) -> Result<RawTable, ReportError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReportError::Input(e.to_string()))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ReportError::Input("no header row".into()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReportError::Input(e.to_string()))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 2);

        // Blank lines carry no data
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let mut fields: Vec<String> = record.iter().map(|f| f.trim().to_string()).collect();
        fields.resize(headers.len(), String::new());
        rows.push(RawRow { line, fields });
    }

    Ok(RawTable { headers, rows })
}
