//! Runtime settings.
//!
//! Defaults, overridden by an optional YAML file, overridden in turn by
//! `OUTREACH_*` environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::executor::MIN_STEPS_FOR_FULL_RUN;

pub const DEFAULT_THREAD_ID: &str = "influencer_outreach_001";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: String,
    pub debug: bool,
    pub default_thread_id: String,
    /// Iteration ceiling for a single run.
    pub max_steps: usize,
    /// Transport retry budget.
    pub max_retries: u32,
    /// Root for checkpoints and escalation records.
    pub state_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            debug: true,
            default_thread_id: DEFAULT_THREAD_ID.to_string(),
            max_steps: 100,
            max_retries: 3,
            state_dir: PathBuf::from(".outreach"),
        }
    }
}

impl Settings {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings
    }

    /// Read a YAML settings file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Read a YAML settings file, then apply overrides from `lookup`.
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = fs::read_to_string(path.as_ref())?;
        let mut settings: Settings = if content.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(&content)?
        };
        settings.apply_overrides(lookup);
        Ok(settings)
    }

    /// Apply `OUTREACH_*` overrides from `lookup`. Malformed numbers are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(environment) = lookup("OUTREACH_ENVIRONMENT") {
            self.environment = environment;
        }

        if let Some(debug) = lookup("OUTREACH_DEBUG") {
            self.debug = matches!(debug.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        if let Some(thread_id) = lookup("OUTREACH_THREAD_ID") {
            self.default_thread_id = thread_id;
        }

        if let Some(steps) = lookup("OUTREACH_MAX_STEPS") {
            if let Ok(value) = steps.trim().parse::<usize>() {
                self.max_steps = value;
            }
        }

        if let Some(retries) = lookup("OUTREACH_MAX_RETRIES") {
            if let Ok(value) = retries.trim().parse::<u32>() {
                self.max_retries = value;
            }
        }

        if let Some(dir) = lookup("OUTREACH_STATE_DIR") {
            self.state_dir = PathBuf::from(dir);
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Problems with these settings. Empty when usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.max_steps == 0 {
            problems.push("max_steps must be greater than zero".to_string());
        } else if self.max_steps < MIN_STEPS_FOR_FULL_RUN {
            problems.push(format!(
                "max_steps {} is below the {} steps a full conversation needs",
                self.max_steps, MIN_STEPS_FOR_FULL_RUN
            ));
        }

        if self.default_thread_id.trim().is_empty() {
            problems.push("default_thread_id must not be empty".to_string());
        }

        problems
    }
}
