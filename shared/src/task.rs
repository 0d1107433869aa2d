use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Opaque identifier handed out by the backend for an asynchronous prediction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Task state as reported by the backend queue.
///
/// Strings outside the known vocabulary are kept verbatim in `Unknown` and
/// treated as still running.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    Started,
    Retry,
    Success,
    Failure,
    Revoked,
    Unknown(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Started => "STARTED",
            TaskStatus::Retry => "RETRY",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Revoked => "REVOKED",
            TaskStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Revoked
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }
}

impl FromStr for TaskStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => TaskStatus::Pending,
            "STARTED" => TaskStatus::Started,
            "RETRY" => TaskStatus::Retry,
            "SUCCESS" => TaskStatus::Success,
            "FAILURE" => TaskStatus::Failure,
            "REVOKED" => TaskStatus::Revoked,
            _ => TaskStatus::Unknown(s.to_string()),
        };
        Ok(status)
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(alias = "state")]
    pub status: TaskStatus,
}

/// Output of a finished prediction. Images are base64-encoded PNGs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub overlaid_image: String,
    #[serde(default)]
    pub cdf_chart: String,
    #[serde(default)]
    pub is_calibrated: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub conf: Option<f32>,
    #[serde(default)]
    pub iou: Option<f32>,
    #[serde(default)]
    pub volumes: Vec<f64>,
}

/// The result endpoint answers either `{"result": {...}}` or the bare object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PredictionPayload {
    Wrapped { result: PredictionResult },
    Bare(PredictionResult),
}

impl PredictionPayload {
    pub fn into_result(self) -> PredictionResult {
        match self {
            PredictionPayload::Wrapped { result } => result,
            PredictionPayload::Bare(result) => result,
        }
    }
}
