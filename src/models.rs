use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentKind {
    Course,
    Assignment,
}

impl DeploymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentKind::Course => "CourseSurveyDeployment",
            DeploymentKind::Assignment => "AssignmentSurveyDeployment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CourseSurveyDeployment" => Some(DeploymentKind::Course),
            "AssignmentSurveyDeployment" => Some(DeploymentKind::Assignment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Deployment {
    pub id: i64,
    pub kind: DeploymentKind,
    pub parent_id: i64,
    pub questionnaire_id: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMapKind {
    CourseSurvey,
    AssignmentSurvey,
    Review,
}

impl ResponseMapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMapKind::CourseSurvey => "CourseSurveyResponseMap",
            ResponseMapKind::AssignmentSurvey => "AssignmentSurveyResponseMap",
            ResponseMapKind::Review => "ReviewResponseMap",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CourseSurveyResponseMap" => Some(ResponseMapKind::CourseSurvey),
            "AssignmentSurveyResponseMap" => Some(ResponseMapKind::AssignmentSurvey),
            "ReviewResponseMap" => Some(ResponseMapKind::Review),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseMap {
    pub id: i64,
    pub reviewer_id: i64,
    pub reviewee_id: i64,
    pub kind: ResponseMapKind,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub id: i64,
    pub map_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    pub response_id: i64,
    /// Raw stored value: a JSON number, a string, or absent.
    pub answer: Option<Value>,
}

impl Answer {
    /// The score as an integer, only when the stored value is an integral
    /// JSON number. Strings such as `"3"` and floats never qualify.
    pub fn integer_score(&self) -> Option<i64> {
        match self.answer.as_ref()? {
            Value::Number(number) => number.as_i64(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub questionnaire_id: i64,
    pub txt: String,
    pub question_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Questionnaire {
    pub id: i64,
    pub name: String,
    pub min_question_score: i64,
    pub max_question_score: i64,
}

impl Questionnaire {
    pub fn score_range(&self) -> Vec<i64> {
        (self.min_question_score..=self.max_question_score).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answer(value: Option<Value>) -> Answer {
        Answer {
            id: 1,
            question_id: 1,
            response_id: 1,
            answer: value,
        }
    }

    #[test]
    fn integer_score_is_type_exact() {
        assert_eq!(answer(Some(json!(3))).integer_score(), Some(3));
        assert_eq!(answer(Some(json!(-2))).integer_score(), Some(-2));
        assert_eq!(answer(Some(json!("3"))).integer_score(), None);
        assert_eq!(answer(Some(json!(3.0))).integer_score(), None);
        assert_eq!(answer(Some(Value::Null)).integer_score(), None);
        assert_eq!(answer(None).integer_score(), None);
    }

    #[test]
    fn kinds_round_trip_through_type_names() {
        for kind in [DeploymentKind::Course, DeploymentKind::Assignment] {
            assert_eq!(DeploymentKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DeploymentKind::parse("SurveyDeployment"), None);
        assert_eq!(
            ResponseMapKind::parse("ReviewResponseMap"),
            Some(ResponseMapKind::Review)
        );
    }

    #[test]
    fn questionnaire_range_is_inclusive() {
        let questionnaire = Questionnaire {
            id: 1,
            name: "course_survey".to_string(),
            min_question_score: 0,
            max_question_score: 5,
        };
        assert_eq!(questionnaire.score_range(), vec![0, 1, 2, 3, 4, 5]);
    }
}
