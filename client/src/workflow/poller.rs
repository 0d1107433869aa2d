use log::{debug, info};
use shared::{PredictionResult, TaskId, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, PredictionApi};

pub(crate) struct PollEvent {
    pub generation: u64,
    pub task_id: TaskId,
    pub kind: PollEventKind,
}

pub(crate) enum PollEventKind {
    Status(TaskStatus),
    Completed(PredictionResult),
    TaskFailed(TaskStatus),
    StatusError(ApiError),
    FetchError(ApiError),
}

impl PollEventKind {
    fn is_final(&self) -> bool {
        !matches!(self, PollEventKind::Status(_))
    }
}

/// The one scheduled status check of a workflow. Dropping the handle stops
/// the loop, including a request that is already in flight.
pub(crate) struct PollHandle {
    generation: u64,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn spawn(
        api: Arc<dyn PredictionApi>,
        task_id: TaskId,
        period: Duration,
        generation: u64,
        events: UnboundedSender<PollEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(run(
            api,
            task_id,
            period,
            generation,
            events,
            cancel.clone(),
        ));
        Self {
            generation,
            cancel,
            join: Some(join),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Resolves once the loop task has exited.
    pub async fn exited(&mut self) {
        match self.join.as_mut() {
            Some(join) => {
                let _ = join.await;
                self.join = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

async fn run(
    api: Arc<dyn PredictionApi>,
    task_id: TaskId,
    period: Duration,
    generation: u64,
    events: UnboundedSender<PollEvent>,
    cancel: CancellationToken,
) {
    info!(
        "Polling task {} every {}s",
        task_id,
        period.as_secs_f32()
    );
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let kind = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            kind = poll_once(api.as_ref(), &task_id) => kind,
        };

        let is_final = kind.is_final();
        let event = PollEvent {
            generation,
            task_id: task_id.clone(),
            kind,
        };
        if events.send(event).is_err() || is_final {
            break;
        }
    }
    debug!("Stopped polling task {}", task_id);
}

async fn poll_once(api: &dyn PredictionApi, task_id: &TaskId) -> PollEventKind {
    match api.task_status(task_id).await {
        Ok(TaskStatus::Success) => match api.fetch_prediction(task_id).await {
            Ok(result) => PollEventKind::Completed(result),
            Err(e) => PollEventKind::FetchError(e),
        },
        Ok(status) if status.is_terminal() => PollEventKind::TaskFailed(status),
        Ok(status) => PollEventKind::Status(status),
        Err(e) => PollEventKind::StatusError(e),
    }
}
