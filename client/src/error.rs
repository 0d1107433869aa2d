use crate::api::ApiError;
use crate::auth::SessionError;
use crate::auth::models::CredentialsError;
use crate::config::ConfigError;
use crate::render::RenderError;
use crate::storage::ImageError;
use crate::workflow::WorkflowError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{message}")]
    PredictionFailed {
        message: String,
        login_required: bool,
    },
    #[error("Interrupted")]
    Interrupted,
}

impl ClientError {
    pub fn requires_login(&self) -> bool {
        match self {
            ClientError::Api(e) => e.requires_login(),
            ClientError::Workflow(e) => e.requires_login(),
            ClientError::Session(SessionError::Expired | SessionError::NotLoggedIn) => true,
            ClientError::PredictionFailed { login_required, .. } => *login_required,
            _ => false,
        }
    }
}
