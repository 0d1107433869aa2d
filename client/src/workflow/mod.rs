//! Upload → poll → fetch lifecycle of a single prediction request.
//!
//! The controller is the only owner of its poll task. Every poll is tagged
//! with a generation number; staging a file, submitting again or cancelling
//! bumps the generation and drops the running poll, so nothing an older poll
//! produced can land in the current state.

mod poller;
mod state;

pub use state::WorkflowState;

use log::{debug, info, warn};
use shared::{ParamError, TaskId, TaskStatus, UploadParams};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::{ApiError, ImageSource, PredictionApi};
use poller::{PollEvent, PollEventKind, PollHandle};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Please select a file to upload.")]
    NothingStaged,
    #[error("{0}")]
    InvalidParams(#[from] ParamError),
    #[error("Failed to upload the file: {0}")]
    Upload(ApiError),
    #[error("Failed to check the task status: {0}")]
    Poll(ApiError),
    #[error("Failed to fetch the prediction result: {0}")]
    Fetch(ApiError),
    #[error("Prediction failed (task status {0})")]
    TaskFailed(TaskStatus),
    #[error("Polling stopped unexpectedly")]
    PollerStopped,
}

impl WorkflowError {
    pub fn requires_login(&self) -> bool {
        match self {
            WorkflowError::Upload(e) | WorkflowError::Poll(e) | WorkflowError::Fetch(e) => {
                e.requires_login()
            }
            _ => false,
        }
    }
}

pub struct WorkflowController {
    api: Arc<dyn PredictionApi>,
    poll_interval: Duration,
    staged: Option<ImageSource>,
    params: UploadParams,
    state: WorkflowState,
    generation: u64,
    poll: Option<PollHandle>,
    events_tx: UnboundedSender<PollEvent>,
    events_rx: UnboundedReceiver<PollEvent>,
}

impl WorkflowController {
    pub fn new(api: Arc<dyn PredictionApi>) -> Self {
        Self::with_poll_interval(api, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(api: Arc<dyn PredictionApi>, poll_interval: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            poll_interval,
            staged: None,
            params: UploadParams::default(),
            state: WorkflowState::Idle,
            generation: 0,
            poll: None,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn staged(&self) -> Option<&ImageSource> {
        self.staged.as_ref()
    }

    pub fn params(&self) -> &UploadParams {
        &self.params
    }

    pub fn set_params(&mut self, params: UploadParams) {
        self.params = params;
    }

    /// True while a poll loop is scheduled for the current task.
    pub fn has_active_poll(&self) -> bool {
        self.poll.as_ref().is_some_and(|poll| !poll.is_finished())
    }

    /// Stages a new image. Any running poll is dropped and the previous
    /// result is cleared.
    pub fn stage(&mut self, source: ImageSource) {
        self.invalidate();
        info!("Staged {}", source.name());
        self.staged = Some(source);
        self.state = WorkflowState::Idle;
    }

    /// Stops polling and returns to `Idle`, keeping the staged image.
    pub fn cancel(&mut self) {
        if self.poll.is_some() {
            info!("Cancelling prediction workflow");
        }
        self.invalidate();
        self.state = WorkflowState::Idle;
    }

    /// Uploads the staged image and starts polling the new task.
    pub async fn submit(&mut self) -> Result<TaskId, WorkflowError> {
        self.invalidate();
        match self.start().await {
            Ok(task_id) => Ok(task_id),
            Err(e) => {
                warn!("Prediction request failed: {}", e);
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn start(&mut self) -> Result<TaskId, WorkflowError> {
        let source = self.staged.as_ref().ok_or(WorkflowError::NothingStaged)?;
        self.params.validate()?;

        self.state = WorkflowState::Uploading;
        info!("Submitting {} for prediction", source.name());
        let task_id = self
            .api
            .submit(source, &self.params)
            .await
            .map_err(WorkflowError::Upload)?;

        self.state = WorkflowState::Polling {
            task_id: task_id.clone(),
            last_status: None,
            polls: 0,
        };
        self.poll = Some(PollHandle::spawn(
            self.api.clone(),
            task_id.clone(),
            self.poll_interval,
            self.generation,
            self.events_tx.clone(),
        ));
        Ok(task_id)
    }

    /// Waits for the poll task to report and applies what it found. Returns
    /// `None` when nothing is being polled.
    pub async fn next_update(&mut self) -> Option<&WorkflowState> {
        loop {
            let poll = self.poll.as_mut()?;
            let current = poll.generation();

            let received = tokio::select! {
                biased;
                event = self.events_rx.recv() => event,
                // The loop is gone: only an event it left behind can still
                // settle the current task.
                _ = poll.exited() => loop {
                    match self.events_rx.try_recv() {
                        Ok(event) if event.generation == current => break Some(event),
                        Ok(_) => continue,
                        Err(_) => break None,
                    }
                },
            };
            let Some(event) = received else {
                self.stop_polling();
                self.fail(&WorkflowError::PollerStopped);
                return Some(&self.state);
            };

            if event.generation != current {
                debug!(
                    "Discarding event for task {} from an invalidated poll",
                    event.task_id
                );
                continue;
            }
            self.apply(event);
            return Some(&self.state);
        }
    }

    /// Drives the workflow until it succeeds or fails.
    pub async fn wait_until_settled(&mut self) -> &WorkflowState {
        while !self.state.is_terminal() {
            if self.next_update().await.is_none() {
                break;
            }
        }
        &self.state
    }

    fn apply(&mut self, event: PollEvent) {
        match event.kind {
            PollEventKind::Status(status) => {
                debug!("Task {} is {}", event.task_id, status);
                if let WorkflowState::Polling {
                    last_status, polls, ..
                } = &mut self.state
                {
                    *last_status = Some(status);
                    *polls += 1;
                }
            }
            PollEventKind::Completed(result) => {
                info!("Task {} completed", event.task_id);
                self.stop_polling();
                self.state = WorkflowState::Succeeded {
                    task_id: event.task_id,
                    result: Arc::new(result),
                };
            }
            PollEventKind::TaskFailed(status) => {
                self.stop_polling();
                self.fail(&WorkflowError::TaskFailed(status));
            }
            PollEventKind::StatusError(e) => {
                self.stop_polling();
                self.fail(&WorkflowError::Poll(e));
            }
            PollEventKind::FetchError(e) => {
                self.stop_polling();
                self.fail(&WorkflowError::Fetch(e));
            }
        }
    }

    fn fail(&mut self, error: &WorkflowError) {
        self.state = WorkflowState::Failed {
            message: error.to_string(),
            login_required: error.requires_login(),
        };
    }

    fn stop_polling(&mut self) {
        self.poll = None;
    }

    fn invalidate(&mut self) {
        self.stop_polling();
        self.generation += 1;
    }
}
