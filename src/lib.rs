//! Score histograms and deployment window checks for peer-review surveys.

pub mod config;
pub mod db;
pub mod deployment;
pub mod eligibility;
pub mod error;
pub mod histogram;
pub mod models;
pub mod report;
pub mod store;

pub use deployment::{SurveyScope, Violations, WindowState};
pub use eligibility::is_eligible;
pub use error::{Result, SurveyError};
pub use histogram::build_histogram;
pub use store::{MemoryStore, SurveyStore};
