//! Survey deployment windows and the course/assignment variants.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Deployment, DeploymentKind, ResponseMap, ResponseMapKind};
use crate::store::SurveyStore;

pub const BASE: &str = "base";
pub const START_DATE: &str = "start_date";
pub const END_DATE: &str = "end_date";

pub const MSG_BLANK: &str = "can't be blank";
pub const MSG_WINDOW_MISSING: &str = "The start and end time should be specified.";
pub const MSG_END_BEFORE_START: &str = "The End Date should be after the Start Date.";
pub const MSG_END_IN_PAST: &str = "The End Date should be in the future.";

/// Messages keyed by field name, or by [`BASE`] for whole-deployment problems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations {
    entries: BTreeMap<&'static str, Vec<String>>,
}

impl Violations {
    pub fn add(&mut self, key: &'static str, message: &str) {
        self.entries.entry(key).or_default().push(message.to_string());
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[String])> + '_ {
        self.entries.iter().map(|(key, messages)| (*key, messages.as_slice()))
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, messages) in self.iter() {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                first = false;
                if key == BASE {
                    write!(f, "{message}")?;
                } else {
                    write!(f, "{key} {message}")?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WindowState {
    #[default]
    Unvalidated,
    Valid,
    Invalid(Violations),
}

impl WindowState {
    pub fn is_valid(&self) -> bool {
        matches!(self, WindowState::Valid)
    }

    pub fn label(&self) -> &'static str {
        match self {
            WindowState::Unvalidated => "unvalidated",
            WindowState::Valid => "valid",
            WindowState::Invalid(_) => "invalid",
        }
    }
}

pub fn window_violations(
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Violations {
    let mut violations = Violations::default();

    match (start_date, end_date) {
        (None, None) => violations.add(BASE, MSG_WINDOW_MISSING),
        (Some(_), None) => violations.add(END_DATE, MSG_BLANK),
        (None, Some(_)) => violations.add(START_DATE, MSG_BLANK),
        (Some(start), Some(end)) => {
            if end <= start {
                violations.add(BASE, MSG_END_BEFORE_START);
            }
            if end < now {
                violations.add(BASE, MSG_END_IN_PAST);
            }
        }
    }

    violations
}

impl Deployment {
    pub fn validate_at(&self, now: DateTime<Utc>) -> WindowState {
        let violations = window_violations(self.start_date, self.end_date, now);
        if violations.is_empty() {
            WindowState::Valid
        } else {
            tracing::warn!(deployment_id = self.id, %violations, "deployment window rejected");
            WindowState::Invalid(violations)
        }
    }

    pub fn validate(&self) -> WindowState {
        self.validate_at(Utc::now())
    }
}

/// What a concrete survey deployment knows about the entity it surveys.
#[allow(async_fn_in_trait)]
pub trait SurveyScope {
    fn deployment(&self) -> &Deployment;

    async fn parent_name<S: SurveyStore>(&self, store: &S) -> Result<Option<String>>;

    async fn response_maps<S: SurveyStore>(&self, store: &S) -> Result<Vec<ResponseMap>>;

    fn validate_at(&self, now: DateTime<Utc>) -> WindowState {
        self.deployment().validate_at(now)
    }
}

async fn maps_of_kind<S: SurveyStore>(
    store: &S,
    deployment_id: i64,
    kind: ResponseMapKind,
) -> Result<Vec<ResponseMap>> {
    Ok(store
        .response_maps_for_reviewee(deployment_id)
        .await?
        .into_iter()
        .filter(|map| map.kind == kind)
        .collect())
}

#[derive(Debug, Clone)]
pub struct CourseSurveyDeployment(pub Deployment);

impl SurveyScope for CourseSurveyDeployment {
    fn deployment(&self) -> &Deployment {
        &self.0
    }

    async fn parent_name<S: SurveyStore>(&self, store: &S) -> Result<Option<String>> {
        store.course_name(self.0.parent_id).await
    }

    async fn response_maps<S: SurveyStore>(&self, store: &S) -> Result<Vec<ResponseMap>> {
        maps_of_kind(store, self.0.id, ResponseMapKind::CourseSurvey).await
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentSurveyDeployment(pub Deployment);

impl SurveyScope for AssignmentSurveyDeployment {
    fn deployment(&self) -> &Deployment {
        &self.0
    }

    async fn parent_name<S: SurveyStore>(&self, store: &S) -> Result<Option<String>> {
        store.assignment_name(self.0.parent_id).await
    }

    async fn response_maps<S: SurveyStore>(&self, store: &S) -> Result<Vec<ResponseMap>> {
        maps_of_kind(store, self.0.id, ResponseMapKind::AssignmentSurvey).await
    }
}

/// A loaded deployment wrapped in its concrete variant.
#[derive(Debug, Clone)]
pub enum ScopedDeployment {
    Course(CourseSurveyDeployment),
    Assignment(AssignmentSurveyDeployment),
}

impl From<Deployment> for ScopedDeployment {
    fn from(deployment: Deployment) -> Self {
        match deployment.kind {
            DeploymentKind::Course => ScopedDeployment::Course(CourseSurveyDeployment(deployment)),
            DeploymentKind::Assignment => {
                ScopedDeployment::Assignment(AssignmentSurveyDeployment(deployment))
            }
        }
    }
}

impl SurveyScope for ScopedDeployment {
    fn deployment(&self) -> &Deployment {
        match self {
            ScopedDeployment::Course(inner) => inner.deployment(),
            ScopedDeployment::Assignment(inner) => inner.deployment(),
        }
    }

    async fn parent_name<S: SurveyStore>(&self, store: &S) -> Result<Option<String>> {
        match self {
            ScopedDeployment::Course(inner) => inner.parent_name(store).await,
            ScopedDeployment::Assignment(inner) => inner.parent_name(store).await,
        }
    }

    async fn response_maps<S: SurveyStore>(&self, store: &S) -> Result<Vec<ResponseMap>> {
        match self {
            ScopedDeployment::Course(inner) => inner.response_maps(store).await,
            ScopedDeployment::Assignment(inner) => inner.response_maps(store).await,
        }
    }
}

pub async fn load_deployment<S: SurveyStore>(
    store: &S,
    id: i64,
) -> Result<Option<ScopedDeployment>> {
    Ok(store.find_deployment(id).await?.map(ScopedDeployment::from))
}
