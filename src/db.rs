use anyhow::Context;
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Answer, Deployment, DeploymentKind, Question, Questionnaire, Response, ResponseMap,
    ResponseMapKind,
};
use crate::store::SurveyStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn question_from_row(row: &PgRow) -> std::result::Result<Question, sqlx::Error> {
    Ok(Question {
        id: row.try_get("id")?,
        questionnaire_id: row.try_get("questionnaire_id")?,
        txt: row.try_get("txt")?,
        question_type: row.try_get("question_type")?,
    })
}

fn deployment_from_row(row: &PgRow) -> std::result::Result<Deployment, sqlx::Error> {
    let deployment_type: String = row.try_get("deployment_type")?;
    let kind = DeploymentKind::parse(&deployment_type)
        .ok_or_else(|| decode_error(format!("unknown deployment type {deployment_type}")))?;

    Ok(Deployment {
        id: row.try_get("id")?,
        kind,
        parent_id: row.try_get("parent_id")?,
        questionnaire_id: row.try_get("questionnaire_id")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
    })
}

fn response_map_from_row(row: &PgRow) -> std::result::Result<ResponseMap, sqlx::Error> {
    let map_type: String = row.try_get("map_type")?;
    let kind = ResponseMapKind::parse(&map_type)
        .ok_or_else(|| decode_error(format!("unknown response map type {map_type}")))?;

    Ok(ResponseMap {
        id: row.try_get("id")?,
        reviewer_id: row.try_get("reviewer_id")?,
        reviewee_id: row.try_get("reviewee_id")?,
        kind,
    })
}

impl SurveyStore for PgStore {
    async fn find_question(&self, id: i64) -> Result<Option<Question>> {
        let row = sqlx::query(
            "SELECT id, questionnaire_id, txt, question_type \
             FROM survey_stats.questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(question_from_row).transpose()?)
    }

    async fn find_deployment(&self, id: i64) -> Result<Option<Deployment>> {
        let row = sqlx::query(
            "SELECT id, deployment_type, parent_id, questionnaire_id, start_date, end_date \
             FROM survey_stats.survey_deployments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(deployment_from_row).transpose()?)
    }

    async fn find_questionnaire(&self, id: i64) -> Result<Option<Questionnaire>> {
        let row = sqlx::query(
            "SELECT id, name, min_question_score, max_question_score \
             FROM survey_stats.questionnaires WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Questionnaire {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            min_question_score: row.try_get("min_question_score")?,
            max_question_score: row.try_get("max_question_score")?,
        }))
    }

    async fn questions_for_questionnaire(&self, questionnaire_id: i64) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT id, questionnaire_id, txt, question_type \
             FROM survey_stats.questions WHERE questionnaire_id = $1 ORDER BY id",
        )
        .bind(questionnaire_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(question_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn response_maps_for_reviewee(&self, reviewee_id: i64) -> Result<Vec<ResponseMap>> {
        let rows = sqlx::query(
            "SELECT id, reviewer_id, reviewee_id, map_type \
             FROM survey_stats.response_maps WHERE reviewee_id = $1",
        )
        .bind(reviewee_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(reviewee_id, maps = rows.len(), "fetched response maps");
        Ok(rows
            .iter()
            .map(response_map_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn responses_for_maps(&self, map_ids: &[i64]) -> Result<Vec<Response>> {
        let rows = sqlx::query("SELECT id, map_id FROM survey_stats.responses WHERE map_id = ANY($1)")
            .bind(map_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut responses = Vec::with_capacity(rows.len());
        for row in rows {
            responses.push(Response {
                id: row.try_get("id")?,
                map_id: row.try_get("map_id")?,
            });
        }

        Ok(responses)
    }

    async fn answers_for_question(
        &self,
        question_id: i64,
        response_ids: &[i64],
    ) -> Result<Vec<Answer>> {
        let rows = sqlx::query(
            "SELECT id, question_id, response_id, answer \
             FROM survey_stats.answers \
             WHERE question_id = $1 AND response_id = ANY($2)",
        )
        .bind(question_id)
        .bind(response_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut answers = Vec::with_capacity(rows.len());
        for row in rows {
            answers.push(Answer {
                id: row.try_get("id")?,
                question_id: row.try_get("question_id")?,
                response_id: row.try_get("response_id")?,
                answer: row.try_get("answer")?,
            });
        }

        Ok(answers)
    }

    async fn course_name(&self, id: i64) -> Result<Option<String>> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT name FROM survey_stats.courses WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn assignment_name(&self, id: i64) -> Result<Option<String>> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT name FROM survey_stats.assignments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO survey_stats.courses (id, name) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
    )
    .bind(1_i64)
    .bind("CSC 517 Object-Oriented Design")
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO survey_stats.assignments (id, name) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
    )
    .bind(2_i64)
    .bind("OSS Project")
    .execute(pool)
    .await?;

    let questionnaires = vec![(98_i64, "course_survey", 0_i64, 5_i64), (99, "assgt_survey", 0, 10)];
    for (id, name, min_score, max_score) in questionnaires {
        sqlx::query(
            r#"
            INSERT INTO survey_stats.questionnaires (id, name, min_question_score, max_question_score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                min_question_score = EXCLUDED.min_question_score,
                max_question_score = EXCLUDED.max_question_score
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(min_score)
        .bind(max_score)
        .execute(pool)
        .await?;
    }

    let questions = vec![
        (1_i64, 98_i64, "How clear were the lectures?", Some("Criterion")),
        (2, 98, "Did you attend office hours?", Some("Checkbox")),
        (3, 98, "Any other comments?", Some("TextArea")),
        (4, 99, "How useful was the project?", Some("Criterion")),
    ];
    for (id, questionnaire_id, txt, question_type) in questions {
        sqlx::query(
            r#"
            INSERT INTO survey_stats.questions (id, questionnaire_id, txt, question_type)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET txt = EXCLUDED.txt, question_type = EXCLUDED.question_type
            "#,
        )
        .bind(id)
        .bind(questionnaire_id)
        .bind(txt)
        .bind(question_type)
        .execute(pool)
        .await?;
    }

    let now = Utc::now();
    let closed_start = Utc
        .with_ymd_and_hms(2026, 1, 12, 9, 0, 0)
        .single()
        .context("invalid date")?;
    let deployments = vec![
        (
            1_i64,
            DeploymentKind::Course,
            1_i64,
            98_i64,
            now - Duration::days(1),
            now + Duration::days(14),
        ),
        (
            2,
            DeploymentKind::Assignment,
            2,
            99,
            closed_start,
            closed_start + Duration::days(7),
        ),
    ];
    for (id, kind, parent_id, questionnaire_id, start_date, end_date) in deployments {
        sqlx::query(
            r#"
            INSERT INTO survey_stats.survey_deployments
            (id, deployment_type, parent_id, questionnaire_id, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(parent_id)
        .bind(questionnaire_id)
        .bind(start_date)
        .bind(end_date)
        .execute(pool)
        .await?;
    }

    let maps = vec![
        (10_i64, 1001_i64, 1_i64, ResponseMapKind::CourseSurvey),
        (11, 1002, 1, ResponseMapKind::CourseSurvey),
        (20, 1001, 2, ResponseMapKind::AssignmentSurvey),
    ];
    for (id, reviewer_id, reviewee_id, kind) in maps {
        sqlx::query(
            "INSERT INTO survey_stats.response_maps (id, reviewer_id, reviewee_id, map_type) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(reviewer_id)
        .bind(reviewee_id)
        .bind(kind.as_str())
        .execute(pool)
        .await?;
    }

    for (id, map_id) in [(100_i64, Some(10_i64)), (101, Some(11)), (200, Some(20)), (300, None)] {
        sqlx::query(
            "INSERT INTO survey_stats.responses (id, map_id) VALUES ($1, $2) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(map_id)
        .execute(pool)
        .await?;
    }

    let answers = vec![
        ("seed-001", 100_i64, 1_i64, "4"),
        ("seed-002", 101, 1, "3"),
        ("seed-003", 101, 1, "3"),
        ("seed-004", 100, 2, "1"),
        ("seed-005", 101, 2, "0"),
        ("seed-006", 100, 3, "Slides were posted late"),
        ("seed-007", 200, 4, "9"),
        ("seed-008", 300, 1, "5"),
        ("seed-009", 100, 1, ""),
    ];
    for (source_key, response_id, question_id, raw) in answers {
        insert_answer(pool, source_key, response_id, question_id, parse_answer(raw)).await?;
    }

    Ok(())
}

/// Stores integers as JSON numbers and anything else verbatim as a JSON
/// string; a blank cell is an absent answer.
pub fn parse_answer(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.parse::<i64>() {
        Ok(score) => Some(Value::from(score)),
        Err(_) => Some(Value::String(raw.to_string())),
    }
}

async fn insert_answer(
    pool: &PgPool,
    source_key: &str,
    response_id: i64,
    question_id: i64,
    answer: Option<Value>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO survey_stats.answers (question_id, response_id, answer, source_key)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(question_id)
    .bind(response_id)
    .bind(answer)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        response_id: i64,
        question_id: i64,
        answer: String,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_answer(
            pool,
            &source_key,
            row.response_id,
            row.question_id,
            parse_answer(&row.answer),
        )
        .await?
        {
            inserted += 1;
        }
    }

    info!(inserted, path = %csv_path.display(), "imported answers");
    Ok(inserted)
}
