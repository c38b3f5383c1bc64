//! Optional `survey-stats.toml` settings. Every field has a default so a
//! missing file behaves like an empty one.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "survey-stats.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scores: ScoresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoresConfig {
    /// Explicit buckets; when unset the questionnaire's min..=max is used.
    #[serde(default)]
    pub range: Option<Vec<i64>>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Loads `path` when given, else the default file when it exists, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn default_toml() -> String {
        r#"# survey-stats configuration

[database]
# Postgres pool size. The connection string comes from DATABASE_URL.
max_connections = 5

[scores]
# Histogram buckets. Leave unset to use each questionnaire's
# min_question_score..=max_question_score.
# range = [0, 1, 2, 3, 4, 5]
"#
        .to_string()
    }
}

/// Picks the score range for a histogram: an explicit override first, then
/// the configured range, then the questionnaire bounds. `None` means no
/// range is configured anywhere.
pub fn resolve_score_range(
    explicit: Option<Vec<i64>>,
    config: &Config,
    questionnaire_range: Option<Vec<i64>>,
) -> Option<Vec<i64>> {
    explicit
        .or_else(|| config.scores.range.clone())
        .or(questionnaire_range)
}
