//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success, every branch workbook written                    |
//! | 1    | Partial: some branch workbooks could not be written       |
//! | 2    | Usage error (bad args, bad month, unknown branch)         |
//! | 3    | Input format error (missing column, unparsable value)     |
//! | 4    | Config error (TOML parse or validation)                   |
//! | 5    | IO error (input, template, output directory)              |

use dsr_report::ReportError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Report generated, but at least one branch failed to render.
pub const EXIT_PARTIAL: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Input file is not a readable POS export.
pub const EXIT_INPUT_FORMAT: u8 = 3;

/// Report config could not be parsed or failed validation.
pub const EXIT_CONFIG: u8 = 4;

/// Filesystem error: input unreadable, template unusable, output not writable.
pub const EXIT_IO: u8 = 5;

/// Map a ReportError to its exit code.
pub fn report_exit_code(err: &ReportError) -> u8 {
    match err {
        ReportError::MissingColumn { .. }
        | ReportError::NumberParse { .. }
        | ReportError::DateParse { .. }
        | ReportError::Input(_) => EXIT_INPUT_FORMAT,
        ReportError::InvalidMonth(_) => EXIT_USAGE,
        ReportError::ConfigParse(_) | ReportError::ConfigValidation(_) => EXIT_CONFIG,
        ReportError::Template(_) | ReportError::Io(_) => EXIT_IO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_format_errors_share_a_code() {
        let errors = [
            ReportError::MissingColumn { column: "Order Date".into() },
            ReportError::NumberParse {
                line: 2,
                column: "Order Lines/Subtotal".into(),
                value: "x".into(),
            },
            ReportError::DateParse { line: 2, value: "x".into() },
            ReportError::Input("bad".into()),
        ];
        for err in &errors {
            assert!(err.is_input_format());
            assert_eq!(report_exit_code(err), EXIT_INPUT_FORMAT);
        }
    }

    #[test]
    fn other_codes() {
        assert_eq!(report_exit_code(&ReportError::InvalidMonth("x".into())), EXIT_USAGE);
        assert_eq!(report_exit_code(&ReportError::ConfigParse("x".into())), EXIT_CONFIG);
        assert_eq!(report_exit_code(&ReportError::ConfigValidation("x".into())), EXIT_CONFIG);
        assert_eq!(report_exit_code(&ReportError::Template("x".into())), EXIT_IO);
        assert_eq!(report_exit_code(&ReportError::Io("x".into())), EXIT_IO);
    }
}
