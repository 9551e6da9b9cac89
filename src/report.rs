use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use uuid::Uuid;

use crate::aggregate::{self, GroupStats};
use crate::models::{
    DashboardSummary, DepartmentReport, Employee, EmployeeReport, QuestionReport, RatingDistribution,
    ReportSnapshot, StatusCounts, Survey, SurveyReport, SurveyStatus, TrendPoint,
};
use crate::rating::Rating;

pub fn build_survey_report(snapshot: &ReportSnapshot) -> SurveyReport {
    SurveyReport {
        average_rating: aggregate::overall(&snapshot.answers).average(),
        total_responses: total_responses(snapshot),
        question_ratings: question_ratings(snapshot),
        employee_ratings: employee_ratings(snapshot),
        progress_over_time: monthly_trends(snapshot),
        department_comparison: department_comparison(snapshot),
    }
}

pub fn total_responses(snapshot: &ReportSnapshot) -> usize {
    snapshot
        .responses
        .iter()
        .map(|response| response.id)
        .collect::<HashSet<_>>()
        .len()
}

/// Per-question statistics in template order. Answers pointing at questions
/// outside the snapshot are skipped.
///
/// Questions nobody answered are omitted rather than reported with a zero
/// average, so a survey without responses has no question rows at all. The
/// zero-count guard in `GroupStats::average` is therefore never hit from here.
pub fn question_ratings(snapshot: &ReportSnapshot) -> Vec<QuestionReport> {
    let groups = aggregate::aggregate_by(&snapshot.answers, |answer| answer.question_id);
    let mut seen = HashSet::new();

    snapshot
        .questions
        .iter()
        .filter(|question| seen.insert(question.id))
        .filter_map(|question| {
            groups.get(&question.id).map(|stats| QuestionReport {
                question_id: question.id,
                question_text: question.text.clone(),
                average_rating: stats.average(),
                answer_count: stats.count,
                distribution: stats.distribution,
            })
        })
        .collect()
}

/// Ranks known employees by the average of every answer they submitted.
/// Anonymous responses and respondents missing from the employee list are
/// left out.
pub fn employee_ratings(snapshot: &ReportSnapshot) -> Vec<EmployeeReport> {
    let employees: HashMap<Uuid, &Employee> = snapshot
        .employees
        .iter()
        .map(|employee| (employee.id, employee))
        .collect();
    let respondents: HashMap<Uuid, Uuid> = snapshot
        .responses
        .iter()
        .filter_map(|response| response.respondent_id.map(|id| (response.id, id)))
        .collect();

    let groups = aggregate::aggregate_where(&snapshot.answers, |answer| {
        respondents
            .get(&answer.response_id)
            .copied()
            .filter(|id| employees.contains_key(id))
    });

    let mut ratings: Vec<EmployeeReport> = groups
        .into_iter()
        .filter_map(|(employee_id, stats)| {
            employees.get(&employee_id).map(|employee| EmployeeReport {
                employee_id,
                employee_name: employee.name.clone(),
                average_rating: stats.average(),
                answer_count: stats.count,
            })
        })
        .collect();

    ratings.sort_by(|a, b| {
        b.average_rating
            .total_cmp(&a.average_rating)
            .then_with(|| a.employee_name.cmp(&b.employee_name))
            .then_with(|| a.employee_id.cmp(&b.employee_id))
    });
    ratings
}

/// Compares departments by the ratings their members gave and by the share of
/// assigned members who responded. Respondents without a department are left
/// out; a department with no assignments has a response rate of 0.
pub fn department_comparison(snapshot: &ReportSnapshot) -> Vec<DepartmentReport> {
    let departments: HashMap<Uuid, &str> = snapshot
        .employees
        .iter()
        .filter_map(|e| e.department.as_deref().map(|d| (e.id, d)))
        .collect();
    let respondents: HashMap<Uuid, Uuid> = snapshot
        .responses
        .iter()
        .filter_map(|response| response.respondent_id.map(|id| (response.id, id)))
        .collect();

    let ratings = aggregate::aggregate_where(&snapshot.answers, |answer| {
        respondents
            .get(&answer.response_id)
            .and_then(|id| departments.get(id))
            .copied()
    });

    let responded: HashSet<(Uuid, Uuid)> = snapshot
        .responses
        .iter()
        .filter_map(|response| response.respondent_id.map(|id| (response.survey_id, id)))
        .collect();
    let mut participation: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    let mut seen = HashSet::new();

    for assignment in &snapshot.assignments {
        let key = (assignment.survey_id, assignment.employee_id);
        if !seen.insert(key) {
            continue;
        }
        let Some(department) = departments.get(&assignment.employee_id).copied() else {
            continue;
        };

        let entry = participation.entry(department).or_default();
        entry.0 += 1;
        if responded.contains(&key) {
            entry.1 += 1;
        }
    }

    let names: BTreeSet<&str> = ratings
        .keys()
        .chain(participation.keys())
        .copied()
        .collect();

    names
        .into_iter()
        .map(|department| {
            let stats = ratings.get(&department).copied().unwrap_or_default();
            let (assigned, responded) = participation.get(&department).copied().unwrap_or_default();
            DepartmentReport {
                department: department.to_string(),
                average_rating: stats.average(),
                answer_count: stats.count,
                response_rate: if assigned == 0 {
                    0.0
                } else {
                    responded as f64 / assigned as f64 * 100.0
                },
            }
        })
        .collect()
}

/// Buckets responses by the calendar month (UTC) they were submitted in.
pub fn monthly_trends(snapshot: &ReportSnapshot) -> Vec<TrendPoint> {
    let by_response = aggregate::aggregate_by(&snapshot.answers, |answer| answer.response_id);
    let mut months: BTreeMap<NaiveDate, (usize, GroupStats)> = BTreeMap::new();
    let mut seen = HashSet::new();

    for response in &snapshot.responses {
        if !seen.insert(response.id) {
            continue;
        }

        let entry = months
            .entry(month_start(response.submitted_at))
            .or_insert((0, GroupStats::default()));
        entry.0 += 1;
        if let Some(stats) = by_response.get(&response.id) {
            entry.1.merge(stats);
        }
    }

    months
        .into_iter()
        .map(|(month, (responses, stats))| TrendPoint {
            month,
            responses,
            average_rating: stats.average(),
        })
        .collect()
}

pub fn month_start(at: DateTime<Utc>) -> NaiveDate {
    let date = at.date_naive();
    date.with_day(1).unwrap_or(date)
}

/// Share per rating, ordered 1 through 4. The question chart divides by the
/// response count, the dashboard by the answer count.
pub fn distribution_percentages(distribution: &RatingDistribution, total: usize) -> [f64; 4] {
    if total == 0 {
        return [0.0; 4];
    }

    Rating::all().map(|rating| distribution.get(rating) as f64 / total as f64 * 100.0)
}

pub fn orphaned_answers(snapshot: &ReportSnapshot) -> usize {
    let known: HashSet<Uuid> = snapshot.questions.iter().map(|q| q.id).collect();
    snapshot
        .answers
        .iter()
        .filter(|answer| !known.contains(&answer.question_id))
        .count()
}

pub fn build_dashboard_summary(surveys: &[Survey], snapshot: &ReportSnapshot) -> DashboardSummary {
    let mut counts = StatusCounts::default();
    let mut seen = BTreeSet::new();

    for survey in surveys {
        if !seen.insert(survey.id) {
            continue;
        }
        match survey.status {
            SurveyStatus::Draft => counts.draft += 1,
            SurveyStatus::Active => counts.active += 1,
            SurveyStatus::Closed => counts.closed += 1,
        }
    }

    DashboardSummary {
        surveys: counts,
        rating_distribution: aggregate::overall(&snapshot.answers).distribution,
        report: build_survey_report(snapshot),
    }
}

pub fn render_markdown(title: &str, report: &SurveyReport, snapshot: &ReportSnapshot) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Meeting Feedback Report");
    let _ = writeln!(output, "Generated for {title}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Responses: {}", report.total_responses);
    let _ = writeln!(
        output,
        "- Average rating: {:.1} of {:.1}",
        report.average_rating,
        f64::from(crate::rating::MAX_RATING)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Question Ratings");

    if report.question_ratings.is_empty() {
        let _ = writeln!(output, "No answers recorded yet.");
    } else {
        for question in &report.question_ratings {
            let shares = distribution_percentages(&question.distribution, report.total_responses);
            let _ = writeln!(
                output,
                "- {}: avg {:.2} across {} answers (1: {:.0}%, 2: {:.0}%, 3: {:.0}%, 4: {:.0}%)",
                question.question_text,
                question.average_rating,
                question.answer_count,
                shares[0],
                shares[1],
                shares[2],
                shares[3]
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Employee Ratings");

    if report.employee_ratings.is_empty() {
        let _ = writeln!(output, "No named respondents yet.");
    } else {
        let departments: HashMap<Uuid, &str> = snapshot
            .employees
            .iter()
            .filter_map(|e| e.department.as_deref().map(|d| (e.id, d)))
            .collect();

        for employee in report.employee_ratings.iter().take(10) {
            let name = match departments.get(&employee.employee_id) {
                Some(department) => format!("{} ({department})", employee.employee_name),
                None => employee.employee_name.clone(),
            };
            let _ = writeln!(
                output,
                "- {}: avg {:.2} across {} answers",
                name, employee.average_rating, employee.answer_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Department Comparison");

    if report.department_comparison.is_empty() {
        let _ = writeln!(output, "No department data yet.");
    } else {
        for department in &report.department_comparison {
            let _ = writeln!(
                output,
                "- {}: avg {:.2} across {} answers, {:.0}% of assigned responded",
                department.department,
                department.average_rating,
                department.answer_count,
                department.response_rate
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Trend");

    if report.progress_over_time.is_empty() {
        let _ = writeln!(output, "No responses recorded yet.");
    } else {
        for point in &report.progress_over_time {
            let _ = writeln!(
                output,
                "- {}: {} responses, avg {:.2}",
                point.month.format("%Y-%m"),
                point.responses,
                point.average_rating
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Comments");

    let comments = recent_comments(snapshot, 5);
    if comments.is_empty() {
        let _ = writeln!(output, "No comments left yet.");
    } else {
        for (submitted_at, question, rating, comment) in comments {
            let _ = writeln!(
                output,
                "- {} on \"{}\" (rated {}): {}",
                submitted_at.date_naive(),
                question,
                rating,
                comment
            );
        }
    }

    output
}

pub fn render_dashboard(summary: &DashboardSummary) -> String {
    let mut output = String::new();
    let surveys = &summary.surveys;
    let report = &summary.report;

    let _ = writeln!(
        output,
        "Surveys: {} ({} active, {} draft, {} closed)",
        surveys.total(),
        surveys.active,
        surveys.draft,
        surveys.closed
    );
    let _ = writeln!(output, "Responses: {}", report.total_responses);
    let _ = writeln!(output, "Average rating: {:.1}", report.average_rating);

    let distribution = &summary.rating_distribution;
    let shares = distribution_percentages(distribution, distribution.total());
    let _ = writeln!(output, "Rating distribution:");
    for (rating, share) in Rating::all().into_iter().zip(shares) {
        let count = distribution.get(rating);
        let _ = writeln!(
            output,
            "- {} ({}): {} answers ({:.0}%)",
            rating.label(),
            rating,
            count,
            share
        );
    }

    if !report.question_ratings.is_empty() {
        let _ = writeln!(output, "Question averages:");
        for question in &report.question_ratings {
            let _ = writeln!(
                output,
                "- {}: {:.1}",
                question.question_text, question.average_rating
            );
        }
    }

    output
}

fn recent_comments(
    snapshot: &ReportSnapshot,
    limit: usize,
) -> Vec<(DateTime<Utc>, String, Rating, String)> {
    let submitted: HashMap<Uuid, DateTime<Utc>> = snapshot
        .responses
        .iter()
        .map(|response| (response.id, response.submitted_at))
        .collect();
    let questions: HashMap<Uuid, &str> = snapshot
        .questions
        .iter()
        .map(|question| (question.id, question.text.as_str()))
        .collect();

    let mut comments: Vec<_> = snapshot
        .answers
        .iter()
        .filter_map(|answer| {
            let comment = answer.comment.as_deref()?.trim();
            if comment.is_empty() {
                return None;
            }
            let submitted_at = submitted.get(&answer.response_id).copied()?;
            let question = questions
                .get(&answer.question_id)
                .copied()
                .unwrap_or("removed question");
            Some((
                submitted_at,
                question.to_string(),
                answer.rating,
                comment.to_string(),
            ))
        })
        .collect();

    comments.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.3.cmp(&b.3)));
    comments.truncate(limit);
    comments
}
