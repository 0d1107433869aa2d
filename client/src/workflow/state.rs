use shared::{PredictionResult, TaskId, TaskStatus};
use std::sync::Arc;

/// Display state of one prediction request.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    Uploading,
    Polling {
        task_id: TaskId,
        last_status: Option<TaskStatus>,
        polls: u32,
    },
    Succeeded {
        task_id: TaskId,
        result: Arc<PredictionResult>,
    },
    Failed {
        message: String,
        login_required: bool,
    },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Succeeded { .. } | WorkflowState::Failed { .. }
        )
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            WorkflowState::Polling { task_id, .. } | WorkflowState::Succeeded { task_id, .. } => {
                Some(task_id)
            }
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        match self {
            WorkflowState::Succeeded { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            WorkflowState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}
