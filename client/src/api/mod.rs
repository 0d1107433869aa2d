mod http;

pub use http::HttpApi;

use async_trait::async_trait;
use shared::{
    Credentials, CurrentUser, ImageList, ParamError, PredictionResult, TaskId, TaskStatus,
    UploadParams,
};

use crate::auth::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Invalid upload parameters: {0}")]
    Params(#[from] ParamError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Server error: {status} - {detail}")]
    Status { status: u16, detail: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the caller should be sent back to the login step.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized(_)
                | ApiError::Session(SessionError::Expired | SessionError::NotLoggedIn)
        )
    }
}

/// What gets sent for prediction: fresh bytes or an image the backend
/// already holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Upload {
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
    Stored {
        name: String,
    },
}

impl ImageSource {
    pub fn name(&self) -> &str {
        match self {
            ImageSource::Upload { file_name, .. } => file_name,
            ImageSource::Stored { name } => name,
        }
    }
}

/// The backend contract. Every call except login and register is
/// authenticated.
#[async_trait]
pub trait PredictionApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<String, ApiError>;

    async fn register(&self, credentials: &Credentials) -> Result<String, ApiError>;

    async fn current_user(&self) -> Result<CurrentUser, ApiError>;

    async fn upload_predict(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        params: &UploadParams,
    ) -> Result<TaskId, ApiError>;

    async fn re_predict(&self, image_name: &str, params: &UploadParams)
        -> Result<TaskId, ApiError>;

    async fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus, ApiError>;

    async fn fetch_prediction(&self, task_id: &TaskId) -> Result<PredictionResult, ApiError>;

    /// A stored prediction of an earlier task.
    async fn get_prediction(&self, task_id: &TaskId) -> Result<PredictionResult, ApiError>;

    async fn display_images(&self) -> Result<ImageList, ApiError>;

    async fn fetch_image(&self, name: &str) -> Result<Vec<u8>, ApiError>;

    async fn download_results(&self, task_id: &TaskId) -> Result<Vec<u8>, ApiError>;

    /// Dispatches a staged source to the matching endpoint.
    async fn submit(&self, source: &ImageSource, params: &UploadParams) -> Result<TaskId, ApiError> {
        match source {
            ImageSource::Upload {
                file_name,
                mime_type,
                bytes,
            } => {
                self.upload_predict(file_name, mime_type, bytes.clone(), params)
                    .await
            }
            ImageSource::Stored { name } => self.re_predict(name, params).await,
        }
    }
}
