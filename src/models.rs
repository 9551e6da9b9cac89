use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::rating::Rating;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurveyStatus {
    Draft,
    Active,
    Closed,
}

impl SurveyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SurveyStatus::Draft => "Draft",
            SurveyStatus::Active => "Active",
            SurveyStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurveyStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "draft" => Ok(SurveyStatus::Draft),
            "active" => Ok(SurveyStatus::Active),
            "closed" => Ok(SurveyStatus::Closed),
            other => anyhow::bail!("unknown survey status: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Survey {
    pub id: Uuid,
    pub name: String,
    pub status: SurveyStatus,
    pub is_anonymous: bool,
    pub template_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub department: Option<String>,
}

/// An employee invited to a survey, whether or not they responded.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub survey_id: Uuid,
    pub employee_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub respondent_id: Option<Uuid>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub response_id: Uuid,
    pub question_id: Uuid,
    pub rating: Rating,
    pub comment: Option<String>,
}

/// Everything one report is computed from. Questions are kept in template
/// order; the other collections carry no ordering guarantee.
#[derive(Debug, Clone, Default)]
pub struct ReportSnapshot {
    pub questions: Vec<Question>,
    pub responses: Vec<Response>,
    pub answers: Vec<Answer>,
    pub employees: Vec<Employee>,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RatingDistribution {
    #[serde(rename = "1")]
    pub poor: usize,
    #[serde(rename = "2")]
    pub fair: usize,
    #[serde(rename = "3")]
    pub good: usize,
    #[serde(rename = "4")]
    pub excellent: usize,
}

impl RatingDistribution {
    pub fn record(&mut self, rating: Rating) {
        match rating.value() {
            1 => self.poor += 1,
            2 => self.fair += 1,
            3 => self.good += 1,
            _ => self.excellent += 1,
        }
    }

    pub fn get(&self, rating: Rating) -> usize {
        match rating.value() {
            1 => self.poor,
            2 => self.fair,
            3 => self.good,
            _ => self.excellent,
        }
    }

    pub fn total(&self) -> usize {
        self.poor + self.fair + self.good + self.excellent
    }

    pub fn merge(&mut self, other: &RatingDistribution) {
        self.poor += other.poor;
        self.fair += other.fair;
        self.good += other.good;
        self.excellent += other.excellent;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReport {
    pub question_id: Uuid,
    pub question_text: String,
    pub average_rating: f64,
    pub answer_count: usize,
    pub distribution: RatingDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeReport {
    pub employee_id: Uuid,
    pub employee_name: String,
    pub average_rating: f64,
    pub answer_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub month: NaiveDate,
    pub responses: usize,
    pub average_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentReport {
    pub department: String,
    pub average_rating: f64,
    pub answer_count: usize,
    /// Percentage of assigned participants in the department who responded.
    pub response_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyReport {
    pub average_rating: f64,
    pub total_responses: usize,
    pub question_ratings: Vec<QuestionReport>,
    pub employee_ratings: Vec<EmployeeReport>,
    pub progress_over_time: Vec<TrendPoint>,
    pub department_comparison: Vec<DepartmentReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub draft: usize,
    pub active: usize,
    pub closed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.draft + self.active + self.closed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub surveys: StatusCounts,
    pub rating_distribution: RatingDistribution,
    pub report: SurveyReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("ACTIVE".parse::<SurveyStatus>().unwrap(), SurveyStatus::Active);
        assert_eq!("draft".parse::<SurveyStatus>().unwrap(), SurveyStatus::Draft);
        assert!("archived".parse::<SurveyStatus>().is_err());
    }

    #[test]
    fn distribution_serializes_with_scale_keys() {
        let mut distribution = RatingDistribution::default();
        distribution.record(Rating::try_from(4).unwrap());
        distribution.record(Rating::try_from(2).unwrap());

        let json = serde_json::to_value(distribution).unwrap();
        assert_eq!(json, serde_json::json!({ "1": 0, "2": 1, "3": 0, "4": 1 }));
        assert_eq!(distribution.total(), 2);
    }

    #[test]
    fn dashboard_summary_serializes_for_json_output() {
        let summary = DashboardSummary {
            surveys: StatusCounts {
                draft: 1,
                active: 2,
                closed: 0,
            },
            rating_distribution: RatingDistribution::default(),
            report: SurveyReport {
                average_rating: 0.0,
                total_responses: 0,
                question_ratings: vec![],
                employee_ratings: vec![],
                progress_over_time: vec![],
                department_comparison: vec![],
            },
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["surveys"]["active"], 2);
        assert_eq!(json["ratingDistribution"]["4"], 0);
        assert_eq!(json["report"]["departmentComparison"], serde_json::json!([]));
    }
}
