pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod render;
pub mod storage;
pub mod workflow;

pub use api::{ApiError, HttpApi, ImageSource, PredictionApi};
pub use auth::{Session, TokenStore};
pub use config::ClientConfig;
pub use error::ClientError;
pub use workflow::{WorkflowController, WorkflowError, WorkflowState};
