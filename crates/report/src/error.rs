use std::fmt;

#[derive(Debug)]
pub enum ReportError {
    /// A required input column is absent from the header row.
    MissingColumn { column: String },
    /// Numeric text that is still not a number after cleanup.
    NumberParse { line: usize, column: String, value: String },
    /// Order date that cannot be read as `YYYY-MM-DD`.
    DateParse { line: usize, value: String },
    /// Malformed or unreadable tabular input.
    Input(String),
    /// Target month is not `YYYY-MM`.
    InvalidMonth(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad coordinates, empty blocks, etc.).
    ConfigValidation(String),
    /// Template workbook could not be loaded.
    Template(String),
    /// IO error (output directory, file read, etc.).
    Io(String),
}

impl ReportError {
    /// Errors caused by the shape or content of the input file.
    pub fn is_input_format(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. } | Self::NumberParse { .. } | Self::DateParse { .. } | Self::Input(_)
        )
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { column } => write!(f, "missing column '{column}'"),
            Self::NumberParse { line, column, value } => {
                write!(f, "line {line}: column '{column}': cannot parse number '{value}'")
            }
            Self::DateParse { line, value } => {
                write!(f, "line {line}: cannot parse order date '{value}'")
            }
            Self::Input(msg) => write!(f, "input error: {msg}"),
            Self::InvalidMonth(value) => {
                write!(f, "invalid month '{value}' (expected YYYY-MM)")
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Template(msg) => write!(f, "template error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReportError {}
