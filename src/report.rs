use std::fmt::Write;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{resolve_score_range, Config};
use crate::deployment::{load_deployment, SurveyScope, WindowState};
use crate::eligibility::is_eligible;
use crate::error::Result;
use crate::histogram::build_histogram;
use crate::models::{Deployment, Question};
use crate::store::SurveyStore;

#[derive(Debug, Clone)]
pub struct QuestionHistogram {
    pub question: Question,
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub deployment: Deployment,
    pub parent_name: Option<String>,
    pub questionnaire_name: Option<String>,
    pub window: WindowState,
    pub response_map_count: usize,
    pub score_range: Option<Vec<i64>>,
    pub histograms: Vec<QuestionHistogram>,
    pub skipped: Vec<Question>,
}

/// Gathers histograms for every eligible question on the deployment's
/// questionnaire. Returns `None` for an unknown deployment.
pub async fn collect_report<S: SurveyStore>(
    store: &S,
    deployment_id: i64,
    explicit_range: Option<Vec<i64>>,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<Option<DeploymentReport>> {
    let Some(scoped) = load_deployment(store, deployment_id).await? else {
        return Ok(None);
    };

    let deployment = scoped.deployment().clone();
    let parent_name = scoped.parent_name(store).await?;
    let response_map_count = scoped.response_maps(store).await?.len();
    let window = scoped.validate_at(now);

    let questionnaire = store.find_questionnaire(deployment.questionnaire_id).await?;
    let score_range = resolve_score_range(
        explicit_range,
        config,
        questionnaire.as_ref().map(|q| q.score_range()),
    );

    let mut histograms = Vec::new();
    let mut skipped = Vec::new();
    for question in store
        .questions_for_questionnaire(deployment.questionnaire_id)
        .await?
    {
        if !is_eligible(&question) {
            skipped.push(question);
            continue;
        }

        let counts =
            build_histogram(store, question.id, deployment.id, score_range.as_deref()).await?;
        histograms.push(QuestionHistogram { question, counts });
    }

    info!(
        deployment_id,
        questions = histograms.len(),
        skipped = skipped.len(),
        "collected deployment report"
    );

    Ok(Some(DeploymentReport {
        deployment,
        parent_name,
        questionnaire_name: questionnaire.map(|q| q.name),
        window,
        response_map_count,
        score_range,
        histograms,
        skipped,
    }))
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "not set".to_string())
}

pub fn render_histogram(score_range: &[i64], counts: &[u64]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "| Score | Count |");
    let _ = writeln!(output, "| ---: | ---: |");
    for (score, count) in score_range.iter().zip(counts) {
        let _ = writeln!(output, "| {} | {} |", score, count);
    }
    output
}

pub fn build_report(report: &DeploymentReport) -> String {
    let mut output = String::new();
    let deployment = &report.deployment;

    let _ = writeln!(output, "# Survey Deployment Report");
    let _ = writeln!(
        output,
        "Deployment {} ({}) for {}",
        deployment.id,
        deployment.kind.as_str(),
        report.parent_name.as_deref().unwrap_or("unknown parent")
    );
    let _ = writeln!(
        output,
        "Questionnaire: {}",
        report.questionnaire_name.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Window");
    let _ = writeln!(output, "- Start: {}", format_time(deployment.start_date));
    let _ = writeln!(output, "- End: {}", format_time(deployment.end_date));
    let _ = writeln!(output, "- State: {}", report.window.label());
    if let WindowState::Invalid(violations) = &report.window {
        for (key, messages) in violations.iter() {
            for message in messages {
                let _ = writeln!(output, "  - {}: {}", key, message);
            }
        }
    }
    let _ = writeln!(output, "- Response maps: {}", report.response_map_count);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Distributions");

    match &report.score_range {
        None => {
            let _ = writeln!(output, "No score range configured.");
        }
        Some(_) if report.histograms.is_empty() => {
            let _ = writeln!(output, "No eligible questions on this questionnaire.");
        }
        Some(score_range) => {
            for histogram in &report.histograms {
                let total: u64 = histogram.counts.iter().sum();
                let _ = writeln!(output);
                let _ = writeln!(
                    output,
                    "### Q{}: {} ({} answers)",
                    histogram.question.id, histogram.question.txt, total
                );
                let _ = writeln!(output);
                output.push_str(&render_histogram(score_range, &histogram.counts));
            }
        }
    }

    if !report.skipped.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Not Aggregated");
        for question in &report.skipped {
            let _ = writeln!(
                output,
                "- Q{}: {} ({})",
                question.id,
                question.txt,
                question.question_type.as_deref().unwrap_or("no type")
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Answer, DeploymentKind, Questionnaire, Response, ResponseMap, ResponseMapKind,
    };
    use crate::store::MemoryStore;
    use chrono::Duration;
    use serde_json::json;

    fn question(id: i64, question_type: Option<&str>) -> Question {
        Question {
            id,
            questionnaire_id: 98,
            txt: format!("Question {id}"),
            question_type: question_type.map(String::from),
        }
    }

    fn sample_store(now: DateTime<Utc>) -> MemoryStore {
        MemoryStore {
            courses: vec![(7, "CSC 517".to_string())],
            questionnaires: vec![Questionnaire {
                id: 98,
                name: "course_survey".to_string(),
                min_question_score: 0,
                max_question_score: 3,
            }],
            questions: vec![
                question(1, Some("Criterion")),
                question(2, Some("TextArea")),
                question(3, Some("Checkbox")),
            ],
            deployments: vec![Deployment {
                id: 5,
                kind: DeploymentKind::Course,
                parent_id: 7,
                questionnaire_id: 98,
                start_date: Some(now - Duration::days(1)),
                end_date: Some(now + Duration::days(1)),
            }],
            response_maps: vec![ResponseMap {
                id: 10,
                reviewer_id: 1,
                reviewee_id: 5,
                kind: ResponseMapKind::CourseSurvey,
            }],
            responses: vec![Response { id: 100, map_id: Some(10) }],
            answers: vec![
                Answer {
                    id: 1,
                    question_id: 1,
                    response_id: 100,
                    answer: Some(json!(2)),
                },
                Answer {
                    id: 2,
                    question_id: 3,
                    response_id: 100,
                    answer: Some(json!(1)),
                },
            ],
            ..MemoryStore::default()
        }
    }

    #[tokio::test]
    async fn report_covers_eligible_questions_only() {
        let now = Utc::now();
        let store = sample_store(now);
        let report = collect_report(&store, 5, None, &Config::default(), now)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.parent_name.as_deref(), Some("CSC 517"));
        assert_eq!(report.window, WindowState::Valid);
        assert_eq!(report.response_map_count, 1);
        assert_eq!(report.score_range, Some(vec![0, 1, 2, 3]));
        assert_eq!(report.histograms.len(), 2);
        assert_eq!(report.histograms[0].counts, vec![0, 0, 1, 0]);
        assert_eq!(report.histograms[1].counts, vec![0, 1, 0, 0]);
        assert_eq!(report.skipped.len(), 1);

        let markdown = build_report(&report);
        assert!(markdown.contains("# Survey Deployment Report"));
        assert!(markdown.contains("for CSC 517"));
        assert!(markdown.contains("- State: valid"));
        assert!(markdown.contains("### Q1: Question 1 (1 answers)"));
        assert!(markdown.contains("| 2 | 1 |"));
        assert!(markdown.contains("- Q2: Question 2 (TextArea)"));
    }

    #[tokio::test]
    async fn unknown_deployment_has_no_report() {
        let now = Utc::now();
        let store = sample_store(now);
        let report = collect_report(&store, 404, None, &Config::default(), now)
            .await
            .unwrap();
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn missing_range_is_reported_as_unconfigured() {
        let now = Utc::now();
        let mut store = sample_store(now);
        store.questionnaires.clear();

        let report = collect_report(&store, 5, None, &Config::default(), now)
            .await
            .unwrap()
            .unwrap();
        assert!(report.score_range.is_none());
        assert!(report.histograms.iter().all(|h| h.counts.is_empty()));
        assert!(build_report(&report).contains("No score range configured."));
    }

    #[tokio::test]
    async fn expired_window_lists_violations() {
        let now = Utc::now();
        let mut store = sample_store(now);
        store.deployments[0].end_date = Some(now - Duration::hours(2));

        let report = collect_report(&store, 5, Some(vec![1, 2]), &Config::default(), now)
            .await
            .unwrap()
            .unwrap();
        let markdown = build_report(&report);
        assert!(markdown.contains("- State: invalid"));
        assert!(markdown.contains("base: The End Date should be in the future."));
        assert_eq!(report.histograms[0].counts, vec![0, 1]);
    }
}
