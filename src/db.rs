use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::import;
use crate::models::{Answer, Assignment, Employee, Question, ReportSnapshot, Response, Survey};
use crate::rating::Rating;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const TEMPLATE_ID: Uuid = Uuid::from_u128(0x5f0c_1d2e_3a4b_4c5d_8e6f_7a8b9c0d1e2f);

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let employees = [
        (
            Uuid::from_u128(0x3d7f_5d6f_24f7_4e8e_8b4b_3e7e44b4a7b2),
            "Avery Lee",
            "avery.lee@example.com",
            "Engineering",
        ),
        (
            Uuid::from_u128(0x0c22_f1f1_9184_4fd4_9b21_28c68a6a89dc),
            "Jules Moreno",
            "jules.moreno@example.com",
            "Sales",
        ),
        (
            Uuid::from_u128(0xd5a0_a1a2_2a3c_44c2_8f73_60b7897a9dd2),
            "Kiara Patel",
            "kiara.patel@example.com",
            "Engineering",
        ),
        (
            Uuid::from_u128(0x8e41_6b0c_51d2_4f3a_a7c9_0d2e4f6a8b1c),
            "Morgan Blake",
            "morgan.blake@example.com",
            "Sales",
        ),
    ];

    for (id, name, email, department) in employees {
        sqlx::query(
            r#"
            INSERT INTO meeting_feedback.employees (id, name, email, department)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, department = EXCLUDED.department
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(department)
        .execute(pool)
        .await?;
    }

    let questions = [
        (
            Uuid::from_u128(0x1a00_0000_0000_4000_8000_000000000001),
            "How would you rate the clarity of communication during the meeting?",
        ),
        (
            Uuid::from_u128(0x1a00_0000_0000_4000_8000_000000000002),
            "How effective was the meeting at addressing its stated objectives?",
        ),
        (
            Uuid::from_u128(0x1a00_0000_0000_4000_8000_000000000003),
            "How would you rate the efficiency of time usage during the meeting?",
        ),
        (
            Uuid::from_u128(0x1a00_0000_0000_4000_8000_000000000004),
            "How well was the meeting facilitated or moderated?",
        ),
    ];

    sqlx::query(
        r#"
        INSERT INTO meeting_feedback.templates (id, name)
        VALUES ($1, $2)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(TEMPLATE_ID)
    .bind("Meeting Feedback")
    .execute(pool)
    .await?;

    for (position, (id, text)) in questions.iter().enumerate() {
        sqlx::query(
            "INSERT INTO meeting_feedback.questions (id, text) VALUES ($1, $2) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(*id)
        .bind(*text)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO meeting_feedback.template_questions (template_id, question_id, position)
            VALUES ($1, $2, $3)
            ON CONFLICT (template_id, question_id) DO UPDATE SET position = EXCLUDED.position
            "#,
        )
        .bind(TEMPLATE_ID)
        .bind(*id)
        .bind(position as i32)
        .execute(pool)
        .await?;
    }

    let kickoff = Uuid::from_u128(0x2b00_0000_0000_4000_8000_000000000001);
    let surveys = [
        (kickoff, "Project Kickoff Meeting Feedback", "Active", false),
        (
            Uuid::from_u128(0x2b00_0000_0000_4000_8000_000000000002),
            "Weekly Team Sync Evaluation",
            "Draft",
            false,
        ),
        (
            Uuid::from_u128(0x2b00_0000_0000_4000_8000_000000000003),
            "Client Presentation Feedback",
            "Closed",
            true,
        ),
    ];

    for (id, name, status, is_anonymous) in surveys {
        sqlx::query(
            r#"
            INSERT INTO meeting_feedback.surveys (id, name, status, template_id, is_anonymous)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(status)
        .bind(TEMPLATE_ID)
        .bind(is_anonymous)
        .execute(pool)
        .await?;
    }

    for (employee_id, _, _, _) in employees {
        sqlx::query(
            r#"
            INSERT INTO meeting_feedback.survey_participants (survey_id, employee_id)
            VALUES ($1, $2)
            ON CONFLICT (survey_id, employee_id) DO NOTHING
            "#,
        )
        .bind(kickoff)
        .bind(employee_id)
        .execute(pool)
        .await?;
    }

    let submissions = [
        ("seed-001", Some(employees[0].0), seed_time(2025, 4, 24)?, [4, 3, 3, 4], Some("Clear owners for every action item")),
        ("seed-002", Some(employees[1].0), seed_time(2025, 5, 10)?, [3, 2, 2, 3], Some("Ran fifteen minutes over")),
        ("seed-003", Some(employees[2].0), seed_time(2025, 5, 12)?, [4, 4, 3, 4], None),
        ("seed-004", None, seed_time(2025, 5, 13)?, [2, 3, 1, 3], Some("Too many side discussions")),
    ];

    for (source_key, respondent, submitted_at, ratings, comment) in submissions {
        let response_id: Uuid = sqlx::query(
            r#"
            INSERT INTO meeting_feedback.responses (id, survey_id, respondent_id, submitted_at, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO UPDATE SET source_key = EXCLUDED.source_key
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(kickoff)
        .bind(respondent)
        .bind(submitted_at)
        .bind(source_key)
        .fetch_one(pool)
        .await?
        .get("id");

        for (index, ((question_id, _), rating)) in questions.iter().zip(ratings).enumerate() {
            let note = if index == 0 { comment } else { None };
            sqlx::query(
                r#"
                INSERT INTO meeting_feedback.answers (response_id, question_id, rating, comment)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (response_id, question_id) DO NOTHING
                "#,
            )
            .bind(response_id)
            .bind(*question_id)
            .bind(rating as i16)
            .bind(note)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

fn seed_time(year: i32, month: u32, day: u32) -> anyhow::Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0)
        .single()
        .context("invalid seed timestamp")
}

pub async fn fetch_survey(pool: &PgPool, survey_id: Uuid) -> anyhow::Result<Survey> {
    let row = sqlx::query(
        "SELECT id, name, status, is_anonymous, template_id \
         FROM meeting_feedback.surveys WHERE id = $1",
    )
    .bind(survey_id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("survey {survey_id} not found"))?;

    decode_survey(&row)
}

pub async fn fetch_surveys(pool: &PgPool) -> anyhow::Result<Vec<Survey>> {
    let rows = sqlx::query(
        "SELECT id, name, status, is_anonymous, template_id \
         FROM meeting_feedback.surveys ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(decode_survey).collect()
}

/// Loads everything a report needs in one go. `None` scopes the snapshot to
/// every survey, which is what the dashboard uses.
pub async fn fetch_snapshot(
    pool: &PgPool,
    survey_id: Option<Uuid>,
) -> anyhow::Result<ReportSnapshot> {
    let question_rows = match survey_id {
        Some(id) => {
            sqlx::query(
                "SELECT q.id, q.text \
                 FROM meeting_feedback.surveys s \
                 JOIN meeting_feedback.template_questions tq ON tq.template_id = s.template_id \
                 JOIN meeting_feedback.questions q ON q.id = tq.question_id \
                 WHERE s.id = $1 \
                 ORDER BY tq.position, q.id",
            )
            .bind(id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query("SELECT id, text FROM meeting_feedback.questions ORDER BY created_at, id")
                .fetch_all(pool)
                .await?
        }
    };

    let response_rows = sqlx::query(
        "SELECT id, survey_id, respondent_id, submitted_at \
         FROM meeting_feedback.responses \
         WHERE ($1::uuid IS NULL OR survey_id = $1)",
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    let answer_rows = sqlx::query(
        "SELECT a.response_id, a.question_id, a.rating, a.comment \
         FROM meeting_feedback.answers a \
         JOIN meeting_feedback.responses r ON r.id = a.response_id \
         WHERE ($1::uuid IS NULL OR r.survey_id = $1)",
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    let employee_rows = sqlx::query("SELECT id, name, department FROM meeting_feedback.employees")
        .fetch_all(pool)
        .await?;

    let assignment_rows = sqlx::query(
        "SELECT survey_id, employee_id \
         FROM meeting_feedback.survey_participants \
         WHERE ($1::uuid IS NULL OR survey_id = $1)",
    )
    .bind(survey_id)
    .fetch_all(pool)
    .await?;

    let snapshot = ReportSnapshot {
        questions: question_rows
            .iter()
            .map(decode_question)
            .collect::<anyhow::Result<_>>()?,
        responses: response_rows
            .iter()
            .map(decode_response)
            .collect::<anyhow::Result<_>>()?,
        answers: answer_rows
            .iter()
            .map(decode_answer)
            .collect::<anyhow::Result<_>>()?,
        employees: employee_rows
            .iter()
            .map(decode_employee)
            .collect::<anyhow::Result<_>>()?,
        assignments: assignment_rows
            .iter()
            .map(decode_assignment)
            .collect::<anyhow::Result<_>>()?,
    };

    debug!(
        questions = snapshot.questions.len(),
        responses = snapshot.responses.len(),
        answers = snapshot.answers.len(),
        assignments = snapshot.assignments.len(),
        "loaded report snapshot"
    );

    Ok(snapshot)
}

fn decode_survey(row: &PgRow) -> anyhow::Result<Survey> {
    let status: String = row.try_get("status")?;
    Ok(Survey {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        status: status.parse()?,
        is_anonymous: row.try_get("is_anonymous")?,
        template_id: row.try_get("template_id")?,
    })
}

fn decode_question(row: &PgRow) -> anyhow::Result<Question> {
    Ok(Question {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
    })
}

fn decode_response(row: &PgRow) -> anyhow::Result<Response> {
    Ok(Response {
        id: row.try_get("id")?,
        survey_id: row.try_get("survey_id")?,
        respondent_id: row.try_get("respondent_id")?,
        submitted_at: row.try_get("submitted_at")?,
    })
}

fn decode_answer(row: &PgRow) -> anyhow::Result<Answer> {
    let response_id: Uuid = row.try_get("response_id")?;
    let raw: i16 = row.try_get("rating")?;
    let rating = Rating::try_from(i32::from(raw))
        .with_context(|| format!("invalid answer stored for response {response_id}"))?;

    Ok(Answer {
        response_id,
        question_id: row.try_get("question_id")?,
        rating,
        comment: row.try_get("comment")?,
    })
}

fn decode_employee(row: &PgRow) -> anyhow::Result<Employee> {
    Ok(Employee {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        department: row.try_get("department")?,
    })
}

fn decode_assignment(row: &PgRow) -> anyhow::Result<Assignment> {
    Ok(Assignment {
        survey_id: row.try_get("survey_id")?,
        employee_id: row.try_get("employee_id")?,
    })
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let responses = import::parse_responses(file)?;
    info!("Validated {} responses from {}", responses.len(), csv_path.display());

    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for response in responses {
        let respondent_id: Option<Uuid> = match response.respondent_email.as_deref() {
            Some(email) => {
                let id: Uuid = sqlx::query("SELECT id FROM meeting_feedback.employees WHERE email = $1")
                    .bind(email)
                    .fetch_optional(&mut *tx)
                    .await?
                    .with_context(|| format!("unknown respondent email {email}"))?
                    .try_get("id")?;
                Some(id)
            }
            None => None,
        };

        let stored = sqlx::query(
            r#"
            INSERT INTO meeting_feedback.responses (id, survey_id, respondent_id, submitted_at, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO UPDATE SET source_key = EXCLUDED.source_key
            RETURNING id, survey_id, respondent_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(response.survey_id)
        .bind(respondent_id)
        .bind(response.submitted_at)
        .bind(&response.source_key)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to store response {}", response.source_key))?;

        let response_id: Uuid = stored.try_get("id")?;
        import::check_stored_response(
            &response,
            respondent_id,
            stored.try_get("survey_id")?,
            stored.try_get("respondent_id")?,
        )?;

        for answer in &response.answers {
            let result = sqlx::query(
                r#"
                INSERT INTO meeting_feedback.answers (response_id, question_id, rating, comment)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (response_id, question_id) DO NOTHING
                "#,
            )
            .bind(response_id)
            .bind(answer.question_id)
            .bind(i32::from(answer.rating) as i16)
            .bind(&answer.comment)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
    }

    tx.commit().await?;
    Ok(inserted)
}
