use crate::models::Question;

/// Question types whose answers are numeric and can be bucketed.
pub const AGGREGATABLE_TYPES: [&str; 2] = ["Criterion", "Checkbox"];

pub fn is_eligible(question: &Question) -> bool {
    question
        .question_type
        .as_deref()
        .is_some_and(is_eligible_type)
}

pub fn is_eligible_type(question_type: &str) -> bool {
    AGGREGATABLE_TYPES.contains(&question_type)
}
