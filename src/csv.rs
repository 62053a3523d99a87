use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::model::{
    AcquisitivePeriod, Operation, RequestCategory, RequestId, RequestStatus, SubjectId,
};

/// Errors that can occur when parsing operation rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation type '{op_type}'")]
    UnrecognizedType { line: usize, op_type: String },

    #[error("line {line}: {op_type} missing {field}")]
    MissingField {
        line: usize,
        op_type: &'static str,
        field: &'static str,
    },

    #[error("line {line}: unknown category '{token}'")]
    UnknownCategory { line: usize, token: String },

    #[error("line {line}: unknown status '{token}'")]
    UnknownStatus { line: usize, token: String },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    subject: Option<SubjectId>,
    year: Option<i32>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    category: Option<String>,
    days: Option<u32>,
    request: Option<RequestId>,
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    subject: SubjectId,
    year: i32,
    balance: u32,
}

fn require<T>(
    value: Option<T>,
    line: usize,
    op_type: &'static str,
    field: &'static str,
) -> Result<T, CsvError> {
    value.ok_or(CsvError::MissingField {
        line,
        op_type,
        field,
    })
}

/// Read ledger operations from a csv file
pub fn read_operations(
    path: impl AsRef<Path>,
) -> impl Iterator<Item = Result<Operation, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            match row.r#type.as_str() {
                "grant" => Ok(Operation::Grant {
                    subject: require(row.subject, line, "grant", "subject")?,
                    reference_year: require(row.year, line, "grant", "year")?,
                    period_start: require(row.start, line, "grant", "start")?,
                    period_end: require(row.end, line, "grant", "end")?,
                }),
                "request" => {
                    let token = require(row.category, line, "request", "category")?;
                    let category = RequestCategory::parse(&token)
                        .ok_or(CsvError::UnknownCategory { line, token })?;
                    Ok(Operation::Submit {
                        subject: require(row.subject, line, "request", "subject")?,
                        category,
                        start_date: require(row.start, line, "request", "start")?,
                        explicit_days: row.days,
                    })
                }
                "transition" => {
                    let token = require(row.status, line, "transition", "status")?;
                    let status = RequestStatus::parse(&token)
                        .ok_or(CsvError::UnknownStatus { line, token })?;
                    Ok(Operation::Transition {
                        request: require(row.request, line, "transition", "request")?,
                        status,
                        reason: row.reason,
                    })
                }
                other => Err(CsvError::UnrecognizedType {
                    line,
                    op_type: other.to_string(),
                }),
            }
        })
}

/// Write final period balances as csv to stdout
pub fn write_balances<'a>(periods: impl IntoIterator<Item = &'a AcquisitivePeriod>) {
    let mut writer = csv::Writer::from_writer(io::stdout());
    for period in periods {
        writer
            .serialize(OutputRow {
                subject: period.subject_id,
                year: period.reference_year,
                balance: period.balance_days,
            })
            .expect("failed to write balance row");
    }
    writer.flush().expect("failed to flush csv output");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const HEADER: &str = "type,subject,year,start,end,category,days,request,status,reason\n";

    #[test]
    fn parses_each_operation_type() {
        let file = write_fixture(&format!(
            "{HEADER}\
             grant,1,2024,2024-01-01,2024-12-31,,,,,\n\
             request,1,,2026-09-01,,DESCONTO,12,,,\n\
             transition,,,,,,,1,rejected,roster conflict\n"
        ));

        let ops: Vec<Operation> = read_operations(file.path())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ops.len(), 3);

        assert!(matches!(
            ops[0],
            Operation::Grant {
                subject: 1,
                reference_year: 2024,
                ..
            }
        ));
        assert!(matches!(
            ops[1],
            Operation::Submit {
                subject: 1,
                category: RequestCategory::Discount,
                explicit_days: Some(12),
                ..
            }
        ));
        match &ops[2] {
            Operation::Transition {
                request,
                status,
                reason,
            } => {
                assert_eq!(*request, 1);
                assert_eq!(*status, RequestStatus::Rejected);
                assert_eq!(reason.as_deref(), Some("roster conflict"));
            }
            other => panic!("expected transition, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_type_reports_the_line() {
        let file = write_fixture(&format!("{HEADER}vacation,1,,,,,,,,\n"));
        let err = read_operations(file.path()).next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            CsvError::UnrecognizedType { line: 2, ref op_type } if op_type == "vacation"
        ));
    }

    #[test]
    fn missing_fields_are_reported_per_field() {
        let file = write_fixture(&format!(
            "{HEADER}\
             grant,1,2024,2024-01-01,,,,,,\n\
             request,1,,2026-09-01,,,,,,\n\
             transition,,,,,,,1,,\n"
        ));
        let errors: Vec<CsvError> = read_operations(file.path())
            .map(|r| r.unwrap_err())
            .collect();

        assert!(matches!(
            errors[0],
            CsvError::MissingField {
                line: 2,
                op_type: "grant",
                field: "end"
            }
        ));
        assert!(matches!(
            errors[1],
            CsvError::MissingField {
                line: 3,
                op_type: "request",
                field: "category"
            }
        ));
        assert!(matches!(
            errors[2],
            CsvError::MissingField {
                line: 4,
                op_type: "transition",
                field: "status"
            }
        ));
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        let file = write_fixture(&format!(
            "{HEADER}\
             request,1,,2026-09-01,,99_DIAS,,,,\n\
             transition,,,,,,,1,archived,\n"
        ));
        let errors: Vec<CsvError> = read_operations(file.path())
            .map(|r| r.unwrap_err())
            .collect();

        assert!(matches!(
            errors[0],
            CsvError::UnknownCategory { line: 2, ref token } if token == "99_DIAS"
        ));
        assert!(matches!(
            errors[1],
            CsvError::UnknownStatus { line: 3, ref token } if token == "archived"
        ));
    }
}
