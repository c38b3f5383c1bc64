use tracing::debug;

use crate::error::{Result, SurveyError};
use crate::store::SurveyStore;

/// Counts answers to `question_id` under `deployment_id`, one bucket per
/// entry of `score_range` and in the same order.
///
/// An absent range yields an empty vector, which is not the same outcome as
/// all zeros. An unknown deployment has no response maps and so yields all
/// zeros; an unknown question is the only error.
pub async fn build_histogram<S: SurveyStore>(
    store: &S,
    question_id: i64,
    deployment_id: i64,
    score_range: Option<&[i64]>,
) -> Result<Vec<u64>> {
    let Some(score_range) = score_range else {
        debug!(question_id, deployment_id, "no score range configured");
        return Ok(Vec::new());
    };

    if store.find_question(question_id).await?.is_none() {
        return Err(SurveyError::QuestionNotFound(question_id));
    }

    let map_ids: Vec<i64> = store
        .response_maps_for_reviewee(deployment_id)
        .await?
        .iter()
        .map(|map| map.id)
        .collect();

    let response_ids: Vec<i64> = if map_ids.is_empty() {
        Vec::new()
    } else {
        store
            .responses_for_maps(&map_ids)
            .await?
            .iter()
            .map(|response| response.id)
            .collect()
    };

    let scores: Vec<i64> = if response_ids.is_empty() {
        Vec::new()
    } else {
        store
            .answers_for_question(question_id, &response_ids)
            .await?
            .iter()
            .filter_map(|answer| answer.integer_score())
            .collect()
    };

    debug!(
        question_id,
        deployment_id,
        maps = map_ids.len(),
        responses = response_ids.len(),
        scored_answers = scores.len(),
        "building histogram"
    );

    Ok(bucket_scores(&scores, score_range))
}

pub fn bucket_scores(scores: &[i64], score_range: &[i64]) -> Vec<u64> {
    score_range
        .iter()
        .map(|bucket| scores.iter().filter(|score| *score == bucket).count() as u64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, Question, Response, ResponseMap, ResponseMapKind};
    use crate::store::MemoryStore;
    use serde_json::{json, Value};

    const QUESTION: i64 = 1;
    const DEPLOYMENT: i64 = 9999;
    const RANGE: [i64; 6] = [0, 1, 2, 3, 4, 5];

    fn question(id: i64) -> Question {
        Question {
            id,
            questionnaire_id: 98,
            txt: "Rate the course pacing".to_string(),
            question_type: Some("Criterion".to_string()),
        }
    }

    fn map(id: i64, reviewee_id: i64) -> ResponseMap {
        ResponseMap {
            id,
            reviewer_id: 2,
            reviewee_id,
            kind: ResponseMapKind::Review,
        }
    }

    fn answer(id: i64, question_id: i64, response_id: i64, value: Option<Value>) -> Answer {
        Answer {
            id,
            question_id,
            response_id,
            answer: value,
        }
    }

    fn store_with_two_threes() -> MemoryStore {
        MemoryStore {
            questions: vec![question(QUESTION), question(2)],
            response_maps: vec![map(10, DEPLOYMENT)],
            responses: vec![Response { id: 100, map_id: Some(10) }],
            answers: vec![
                answer(1, QUESTION, 100, Some(json!(3))),
                answer(2, QUESTION, 100, Some(json!(3))),
            ],
            ..MemoryStore::default()
        }
    }

    #[tokio::test]
    async fn counts_scores_per_bucket() {
        let store = store_with_two_threes();
        let result = build_histogram(&store, QUESTION, DEPLOYMENT, Some(&RANGE[..]))
            .await
            .unwrap();
        assert_eq!(result, vec![0, 0, 0, 2, 0, 0]);
    }

    #[tokio::test]
    async fn absent_range_yields_empty_result() {
        let store = store_with_two_threes();
        let result = build_histogram(&store, QUESTION, DEPLOYMENT, None).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn empty_range_yields_empty_counts() {
        let store = store_with_two_threes();
        let result = build_histogram(&store, QUESTION, DEPLOYMENT, Some(&[][..]))
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn unknown_deployment_yields_zeros() {
        let store = store_with_two_threes();
        for deployment in [12345, -1, 0] {
            let result = build_histogram(&store, QUESTION, deployment, Some(&RANGE[..]))
                .await
                .unwrap();
            assert_eq!(result, vec![0; 6]);
        }
    }

    #[tokio::test]
    async fn unknown_question_is_not_found() {
        let store = store_with_two_threes();
        let err = build_histogram(&store, 404, DEPLOYMENT, Some(&RANGE[..]))
            .await
            .unwrap_err();
        assert!(matches!(err, SurveyError::QuestionNotFound(404)));
    }

    #[tokio::test]
    async fn ignores_out_of_range_and_non_integer_scores() {
        let mut store = store_with_two_threes();
        store.answers.extend([
            answer(3, QUESTION, 100, Some(json!(7))),
            answer(4, QUESTION, 100, Some(json!(-1))),
            answer(5, QUESTION, 100, Some(json!("3"))),
            answer(6, QUESTION, 100, Some(json!(2.5))),
            answer(7, QUESTION, 100, Some(Value::Null)),
            answer(8, QUESTION, 100, None),
            answer(9, QUESTION, 100, Some(json!(5))),
        ]);

        let result = build_histogram(&store, QUESTION, DEPLOYMENT, Some(&RANGE[..]))
            .await
            .unwrap();
        assert_eq!(result, vec![0, 0, 0, 2, 0, 1]);
        assert_eq!(result.iter().sum::<u64>(), 3);
    }

    #[tokio::test]
    async fn aggregates_across_all_maps_of_a_deployment() {
        let mut store = store_with_two_threes();
        store.response_maps.push(map(11, DEPLOYMENT));
        store.responses.push(Response { id: 101, map_id: Some(11) });
        store.answers.push(answer(3, QUESTION, 101, Some(json!(1))));

        let result = build_histogram(&store, QUESTION, DEPLOYMENT, Some(&RANGE[..]))
            .await
            .unwrap();
        assert_eq!(result, vec![0, 1, 0, 2, 0, 0]);
    }

    #[tokio::test]
    async fn excludes_other_deployments_questions_and_orphans() {
        let mut store = store_with_two_threes();
        store.response_maps.push(map(20, 5000));
        store.responses.extend([
            Response { id: 200, map_id: Some(20) },
            Response { id: 300, map_id: None },
        ]);
        store.answers.extend([
            answer(3, QUESTION, 200, Some(json!(4))),
            answer(4, QUESTION, 300, Some(json!(4))),
            answer(5, 2, 100, Some(json!(4))),
        ]);

        let result = build_histogram(&store, QUESTION, DEPLOYMENT, Some(&RANGE[..]))
            .await
            .unwrap();
        assert_eq!(result, vec![0, 0, 0, 2, 0, 0]);
    }

    #[test]
    fn buckets_follow_range_order() {
        let scores = [1, 1, 4];
        assert_eq!(bucket_scores(&scores, &[4, 1, 0]), vec![1, 2, 0]);
    }
}
