use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("question {0} not found")]
    QuestionNotFound(i64),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, SurveyError>;
