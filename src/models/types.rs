//! Shared enumerations for runs, steps, and payloads.

use serde::{Deserialize, Serialize};

/// Status of a pipeline run.
///
/// Lifecycle: running -> success | error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Status of a single step within a run.
///
/// Lifecycle mirrors [`RunStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Success,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Type of processing step in a pipeline.
///
/// Used to categorize steps for filtering and analysis:
/// - filter: reduces candidates based on criteria
/// - rank: orders/scores candidates
/// - llm: LLM API call
/// - retrieval: fetches data from external sources
/// - transform: transforms data format/structure
/// - other: uncategorized steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Filter,
    Rank,
    Llm,
    Retrieval,
    Transform,
    Other,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Rank => "rank",
            Self::Llm => "llm",
            Self::Retrieval => "retrieval",
            Self::Transform => "transform",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "filter" => Some(Self::Filter),
            "rank" => Some(Self::Rank),
            "llm" => Some(Self::Llm),
            "retrieval" => Some(Self::Retrieval),
            "transform" => Some(Self::Transform),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Payload capture detail level.
///
/// Controls how much data is captured for inputs/outputs:
/// - summary: counts and small samples only (default, recommended)
/// - full: complete payload up to size threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    #[default]
    Summary,
    Full,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Full => "full",
        }
    }
}

/// Which side of a run/step an externalized payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Input,
    Output,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            _ => None,
        }
    }
}
