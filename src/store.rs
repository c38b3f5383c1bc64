//! Entity lookups the aggregation and deployment code depend on.
//!
//! `PgStore` in `db` is the production implementation; `MemoryStore` backs
//! tests and dry runs.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{Answer, Deployment, Question, Questionnaire, Response, ResponseMap};

#[allow(async_fn_in_trait)]
pub trait SurveyStore {
    async fn find_question(&self, id: i64) -> Result<Option<Question>>;

    async fn find_deployment(&self, id: i64) -> Result<Option<Deployment>>;

    async fn find_questionnaire(&self, id: i64) -> Result<Option<Questionnaire>>;

    async fn questions_for_questionnaire(&self, questionnaire_id: i64) -> Result<Vec<Question>>;

    async fn response_maps_for_reviewee(&self, reviewee_id: i64) -> Result<Vec<ResponseMap>>;

    async fn responses_for_maps(&self, map_ids: &[i64]) -> Result<Vec<Response>>;

    async fn answers_for_question(
        &self,
        question_id: i64,
        response_ids: &[i64],
    ) -> Result<Vec<Answer>>;

    async fn course_name(&self, id: i64) -> Result<Option<String>>;

    async fn assignment_name(&self, id: i64) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub courses: Vec<(i64, String)>,
    pub assignments: Vec<(i64, String)>,
    pub questionnaires: Vec<Questionnaire>,
    pub questions: Vec<Question>,
    pub deployments: Vec<Deployment>,
    pub response_maps: Vec<ResponseMap>,
    pub responses: Vec<Response>,
    pub answers: Vec<Answer>,
}

impl SurveyStore for MemoryStore {
    async fn find_question(&self, id: i64) -> Result<Option<Question>> {
        Ok(self.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn find_deployment(&self, id: i64) -> Result<Option<Deployment>> {
        Ok(self.deployments.iter().find(|d| d.id == id).cloned())
    }

    async fn find_questionnaire(&self, id: i64) -> Result<Option<Questionnaire>> {
        Ok(self.questionnaires.iter().find(|q| q.id == id).cloned())
    }

    async fn questions_for_questionnaire(&self, questionnaire_id: i64) -> Result<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| q.questionnaire_id == questionnaire_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.id);
        Ok(questions)
    }

    async fn response_maps_for_reviewee(&self, reviewee_id: i64) -> Result<Vec<ResponseMap>> {
        Ok(self
            .response_maps
            .iter()
            .filter(|m| m.reviewee_id == reviewee_id)
            .cloned()
            .collect())
    }

    async fn responses_for_maps(&self, map_ids: &[i64]) -> Result<Vec<Response>> {
        let wanted: HashSet<i64> = map_ids.iter().copied().collect();
        Ok(self
            .responses
            .iter()
            .filter(|r| r.map_id.is_some_and(|id| wanted.contains(&id)))
            .cloned()
            .collect())
    }

    async fn answers_for_question(
        &self,
        question_id: i64,
        response_ids: &[i64],
    ) -> Result<Vec<Answer>> {
        let wanted: HashSet<i64> = response_ids.iter().copied().collect();
        Ok(self
            .answers
            .iter()
            .filter(|a| a.question_id == question_id && wanted.contains(&a.response_id))
            .cloned()
            .collect())
    }

    async fn course_name(&self, id: i64) -> Result<Option<String>> {
        Ok(lookup_name(&self.courses, id))
    }

    async fn assignment_name(&self, id: i64) -> Result<Option<String>> {
        Ok(lookup_name(&self.assignments, id))
    }
}

fn lookup_name(entries: &[(i64, String)], id: i64) -> Option<String> {
    entries
        .iter()
        .find(|(entry_id, _)| *entry_id == id)
        .map(|(_, name)| name.clone())
}
