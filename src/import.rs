use std::collections::BTreeMap;
use std::io::Read;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::rating::{Rating, RatingError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {source}")]
    InvalidRating {
        line: u64,
        #[source]
        source: RatingError,
    },

    #[error("line {line}: response {key} disagrees with its earlier rows on {field}")]
    ConflictingRows {
        line: u64,
        key: String,
        field: &'static str,
    },

    #[error("response {key} was already imported with a different {field}")]
    ConflictingStoredResponse { key: String, field: &'static str },
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    response_key: String,
    survey_id: Uuid,
    respondent_email: Option<String>,
    question_id: Uuid,
    rating: i32,
    comment: Option<String>,
    submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedAnswer {
    pub question_id: Uuid,
    pub rating: Rating,
    pub comment: Option<String>,
}

/// One submission assembled from every CSV row sharing a `response_key`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedResponse {
    pub source_key: String,
    pub survey_id: Uuid,
    pub respondent_email: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub answers: Vec<ImportedAnswer>,
}

/// Parses and validates a whole CSV before anything touches the database.
/// The first bad row aborts the import.
pub fn parse_responses<R: Read>(input: R) -> Result<Vec<ImportedResponse>, ImportError> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers()?.clone();
    let mut record = csv::StringRecord::new();
    let mut responses: BTreeMap<String, ImportedResponse> = BTreeMap::new();

    while reader.read_record(&mut record)? {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: CsvRow = record.deserialize(Some(&headers))?;
        let rating = Rating::try_from(row.rating)
            .map_err(|source| ImportError::InvalidRating { line, source })?;

        let response = responses
            .entry(row.response_key.clone())
            .or_insert_with(|| ImportedResponse {
                source_key: row.response_key.clone(),
                survey_id: row.survey_id,
                respondent_email: non_empty(row.respondent_email.clone()),
                submitted_at: row.submitted_at,
                answers: Vec::new(),
            });

        let field = if response.survey_id != row.survey_id {
            Some("survey_id")
        } else if response.respondent_email != non_empty(row.respondent_email.clone()) {
            Some("respondent_email")
        } else if response.submitted_at != row.submitted_at {
            Some("submitted_at")
        } else {
            None
        };
        if let Some(field) = field {
            return Err(ImportError::ConflictingRows {
                line,
                key: row.response_key,
                field,
            });
        }

        response.answers.push(ImportedAnswer {
            question_id: row.question_id,
            rating,
            comment: non_empty(row.comment),
        });
    }

    Ok(responses.into_values().collect())
}

/// Checks that a response row found by `source_key` is the one being
/// imported, so a re-import never attaches answers to someone else's
/// submission.
pub fn check_stored_response(
    response: &ImportedResponse,
    respondent_id: Option<Uuid>,
    stored_survey_id: Uuid,
    stored_respondent_id: Option<Uuid>,
) -> Result<(), ImportError> {
    let field = if stored_survey_id != response.survey_id {
        "survey_id"
    } else if stored_respondent_id != respondent_id {
        "respondent"
    } else {
        return Ok(());
    };

    Err(ImportError::ConflictingStoredResponse {
        key: response.source_key.clone(),
        field,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "response_key,survey_id,respondent_email,question_id,rating,comment,submitted_at\n";
    const SURVEY: &str = "6a1c7f0e-2f8b-4c55-9d0e-1b2a3c4d5e6f";
    const OTHER_SURVEY: &str = "7b2d8a1f-3a9c-4d66-8e1f-2c3b4d5e6f70";
    const Q1: &str = "11111111-2222-4333-8444-555555555555";
    const Q2: &str = "21111111-2222-4333-8444-555555555555";

    fn csv(rows: &[String]) -> String {
        let mut input = HEADER.to_string();
        for row in rows {
            input.push_str(row);
            input.push('\n');
        }
        input
    }

    #[test]
    fn groups_rows_into_responses() {
        let input = csv(&[
            format!("r-1,{SURVEY},avery.lee@example.com,{Q1},4,Great pace,2025-05-10T10:00:00Z"),
            format!("r-1,{SURVEY},avery.lee@example.com,{Q2},3,,2025-05-10T10:00:00Z"),
            format!("r-2,{SURVEY},,{Q1},2,,2025-05-11T09:30:00Z"),
        ]);

        let responses = parse_responses(input.as_bytes()).unwrap();

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].source_key, "r-1");
        assert_eq!(responses[0].answers.len(), 2);
        assert_eq!(
            responses[0].respondent_email.as_deref(),
            Some("avery.lee@example.com")
        );
        assert_eq!(responses[0].answers[0].comment.as_deref(), Some("Great pace"));
        assert_eq!(responses[0].answers[1].comment, None);
        assert_eq!(responses[1].respondent_email, None);
        assert_eq!(responses[1].answers[0].rating.value(), 2);
    }

    #[test]
    fn rejects_out_of_range_rating_with_line() {
        let input = csv(&[
            format!("r-1,{SURVEY},,{Q1},4,,2025-05-10T10:00:00Z"),
            format!("r-2,{SURVEY},,{Q1},5,,2025-05-10T10:00:00Z"),
        ]);

        let err = parse_responses(input.as_bytes()).unwrap_err();

        match err {
            ImportError::InvalidRating { line, source } => {
                assert_eq!(line, 3);
                assert_eq!(source, RatingError::OutOfRange(5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_response_spanning_surveys() {
        let input = csv(&[
            format!("r-1,{SURVEY},,{Q1},4,,2025-05-10T10:00:00Z"),
            format!("r-1,{OTHER_SURVEY},,{Q2},3,,2025-05-10T10:00:00Z"),
        ]);

        let err = parse_responses(input.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ImportError::ConflictingRows {
                line: 3,
                field: "survey_id",
                ..
            }
        ));
    }

    #[test]
    fn rejects_response_spanning_respondents() {
        let input = csv(&[
            format!("r-1,{SURVEY},avery.lee@example.com,{Q1},4,,2025-05-10T10:00:00Z"),
            format!("r-1,{SURVEY},kiara.patel@example.com,{Q2},1,,2025-05-10T10:00:00Z"),
        ]);

        let err = parse_responses(input.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ImportError::ConflictingRows {
                line: 3,
                field: "respondent_email",
                ..
            }
        ));
    }

    #[test]
    fn rejects_anonymous_row_joining_named_response() {
        let input = csv(&[
            format!("r-1,{SURVEY},avery.lee@example.com,{Q1},4,,2025-05-10T10:00:00Z"),
            format!("r-1,{SURVEY},,{Q2},3,,2025-05-10T10:00:00Z"),
        ]);

        let err = parse_responses(input.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ImportError::ConflictingRows {
                field: "respondent_email",
                ..
            }
        ));
    }

    #[test]
    fn rejects_response_spanning_timestamps() {
        let input = csv(&[
            format!("r-1,{SURVEY},,{Q1},4,,2025-05-10T10:00:00Z"),
            format!("r-1,{SURVEY},,{Q2},1,,2025-06-30T10:00:00Z"),
        ]);

        let err = parse_responses(input.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ImportError::ConflictingRows {
                line: 3,
                field: "submitted_at",
                ..
            }
        ));
    }

    fn imported(survey_id: Uuid) -> ImportedResponse {
        ImportedResponse {
            source_key: "r-1".to_string(),
            survey_id,
            respondent_email: None,
            submitted_at: "2025-05-10T10:00:00Z".parse().unwrap(),
            answers: Vec::new(),
        }
    }

    #[test]
    fn stored_response_must_match_import() {
        let survey: Uuid = SURVEY.parse().unwrap();
        let avery = Uuid::new_v4();
        let response = imported(survey);

        assert!(check_stored_response(&response, Some(avery), survey, Some(avery)).is_ok());
        assert!(check_stored_response(&response, None, survey, None).is_ok());
    }

    #[test]
    fn stored_response_for_other_survey_is_rejected() {
        let survey: Uuid = SURVEY.parse().unwrap();
        let other: Uuid = OTHER_SURVEY.parse().unwrap();

        let err = check_stored_response(&imported(survey), None, other, None).unwrap_err();
        assert!(matches!(
            err,
            ImportError::ConflictingStoredResponse {
                field: "survey_id",
                ..
            }
        ));
    }

    #[test]
    fn stored_response_for_other_respondent_is_rejected() {
        let survey: Uuid = SURVEY.parse().unwrap();

        let err = check_stored_response(
            &imported(survey),
            Some(Uuid::new_v4()),
            survey,
            Some(Uuid::new_v4()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "response r-1 was already imported with a different respondent"
        );
    }

    #[test]
    fn malformed_rows_surface_csv_errors() {
        let input = csv(&[format!("r-1,not-a-uuid,,{Q1},4,,2025-05-10T10:00:00Z")]);
        let err = parse_responses(input.as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::Csv(_)));
    }

    #[test]
    fn empty_file_imports_nothing() {
        let responses = parse_responses(HEADER.as_bytes()).unwrap();
        assert!(responses.is_empty());
    }
}
