mod auth;
mod images;
mod params;
mod task;

pub use auth::{Credentials, CurrentUser, CurrentUserPayload, RegisterResponse, TokenResponse};
pub use images::{ImageList, StoredImage};
pub use params::{ParamError, Unit, UploadParams};
pub use task::{PredictionPayload, PredictionResult, TaskCreated, TaskId, TaskStatus, TaskStatusResponse};
