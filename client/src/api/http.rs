use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    Credentials, CurrentUser, CurrentUserPayload, ImageList, PredictionPayload, PredictionResult,
    RegisterResponse, TaskCreated, TaskId, TaskStatus, TaskStatusResponse, TokenResponse,
    UploadParams,
};
use std::time::Duration;
use url::Url;

use super::{ApiError, PredictionApi};
use crate::auth::Session;

/// `PredictionApi` over HTTP. Owns the session it authenticates with: the
/// token is checked for expiry before each protected call and dropped on any
/// 401 answer.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    session: Session,
}

impl HttpApi {
    pub fn new(base_url: Url, session: Session, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Adopts a token issued elsewhere (an OAuth redirect) and confirms it
    /// with the backend. A token the backend does not accept is dropped.
    pub async fn login_with_token(&self, token: String) -> Result<CurrentUser, ApiError> {
        self.session.login(token)?;
        match self.current_user().await {
            Ok(user) => {
                info!("Logged in with a pre-issued token as {}", user.username);
                Ok(user)
            }
            Err(e) => {
                warn!("Pre-issued token was not accepted: {}", e);
                self.session.logout();
                Err(e)
            }
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// `/api/<route>` when no parameter is set, `/api/<route>/params?...`
    /// otherwise.
    fn predict_endpoint(
        &self,
        route: &str,
        params: &UploadParams,
        extra: &[(&str, &str)],
    ) -> Result<Url, ApiError> {
        let pairs = params.query_pairs()?;
        let mut url = if pairs.is_empty() {
            self.endpoint(&["api", route])?
        } else {
            self.endpoint(&["api", route, "params"])?
        };
        if !pairs.is_empty() || !extra.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in extra {
                query.append_pair(key, value);
            }
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send_authorized(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.session.bearer_token()?;
        let response = request.bearer_auth(token).send().await?;
        self.check(response).await
    }

    async fn check(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(status, &body);
        if status == StatusCode::UNAUTHORIZED {
            warn!("Backend rejected credentials ({}), clearing session", detail);
            self.session.logout();
            return Err(ApiError::Unauthorized(detail));
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pulls a readable message out of an error body: FastAPI's `detail`, an
/// `error` field, or the raw text.
fn error_detail(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "error", "message"] {
            match json.get(key) {
                Some(Value::String(message)) => return message.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }
    let text = body.trim();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        text.to_string()
    }
}

#[async_trait]
impl PredictionApi for HttpApi {
    async fn login(&self, credentials: &Credentials) -> Result<String, ApiError> {
        let url = self.endpoint(&["api", "auth", "login"])?;
        info!("Logging in as {}", credentials.username);
        let response = self.client.post(url).json(credentials).send().await?;
        let response = self.check(response).await?;
        let token: TokenResponse = read_json(response).await?;
        self.session.login(token.access_token.clone())?;
        Ok(token.access_token)
    }

    async fn register(&self, credentials: &Credentials) -> Result<String, ApiError> {
        let url = self.endpoint(&["api", "auth", "register"])?;
        info!("Registering user {}", credentials.username);
        let response = self.client.post(url).json(credentials).send().await?;
        let response = self.check(response).await?;
        let registered: RegisterResponse = read_json(response).await?;
        Ok(registered.message)
    }

    async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        let url = self.endpoint(&["api", "auth", "current-user"])?;
        let response = self.send_authorized(self.client.get(url)).await?;
        let payload: CurrentUserPayload = read_json(response).await?;
        let user = payload.into_user();
        self.session.set_user(user.clone());
        Ok(user)
    }

    async fn upload_predict(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        params: &UploadParams,
    ) -> Result<TaskId, ApiError> {
        let url = self.predict_endpoint("upload_predict", params, &[])?;
        info!("Uploading {} ({} bytes) for prediction", file_name, bytes.len());
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let form = Form::new().part("file", part);
        let response = self
            .send_authorized(self.client.post(url).multipart(form))
            .await?;
        let created: TaskCreated = read_json(response).await?;
        info!("Prediction task {} created", created.task_id);
        Ok(created.task_id)
    }

    async fn re_predict(
        &self,
        image_name: &str,
        params: &UploadParams,
    ) -> Result<TaskId, ApiError> {
        let url = self.predict_endpoint("re_predict", params, &[("image_name", image_name)])?;
        info!("Requesting new prediction for stored image {}", image_name);
        let response = self.send_authorized(self.client.get(url)).await?;
        let created: TaskCreated = read_json(response).await?;
        info!("Prediction task {} created", created.task_id);
        Ok(created.task_id)
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus, ApiError> {
        let url = self.endpoint(&["api", "task_status", task_id.as_str()])?;
        let response = self.send_authorized(self.client.get(url)).await?;
        let status: TaskStatusResponse = read_json(response).await?;
        debug!("Task {} status: {}", task_id, status.status);
        Ok(status.status)
    }

    async fn fetch_prediction(&self, task_id: &TaskId) -> Result<PredictionResult, ApiError> {
        let url = self.endpoint(&["api", "fetch_prediction", task_id.as_str()])?;
        let response = self.send_authorized(self.client.get(url)).await?;
        let payload: PredictionPayload = read_json(response).await?;
        info!("Fetched prediction for task {}", task_id);
        Ok(payload.into_result())
    }

    async fn get_prediction(&self, task_id: &TaskId) -> Result<PredictionResult, ApiError> {
        let url = self.endpoint(&["api", "get_prediction", task_id.as_str()])?;
        let response = self.send_authorized(self.client.get(url)).await?;
        let payload: PredictionPayload = read_json(response).await?;
        Ok(payload.into_result())
    }

    async fn display_images(&self) -> Result<ImageList, ApiError> {
        let url = self.endpoint(&["api", "display_images"])?;
        let response = self.send_authorized(self.client.get(url)).await?;
        read_json(response).await
    }

    async fn fetch_image(&self, name: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(&["api", "fetch_image", name])?;
        let response = self.send_authorized(self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn download_results(&self, task_id: &TaskId) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(&["api", "download_results", task_id.as_str()])?;
        let response = self.send_authorized(self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Unit;

    fn api(base: &str) -> HttpApi {
        HttpApi::new(
            Url::parse(base).unwrap(),
            Session::in_memory(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn endpoints_append_to_base_path() {
        let root = api("http://localhost:8000/");
        assert_eq!(
            root.endpoint(&["api", "task_status", "abc123"]).unwrap().as_str(),
            "http://localhost:8000/api/task_status/abc123"
        );

        let prefixed = api("https://example.org/segment");
        assert_eq!(
            prefixed.endpoint(&["api", "display_images"]).unwrap().as_str(),
            "https://example.org/segment/api/display_images"
        );
    }

    #[test]
    fn image_names_are_escaped_as_one_segment() {
        let root = api("http://localhost:8000/");
        assert_eq!(
            root.endpoint(&["api", "fetch_image", "pit 3/rock#1.jpg"])
                .unwrap()
                .as_str(),
            "http://localhost:8000/api/fetch_image/pit%203%2Frock%231.jpg"
        );
    }

    #[test]
    fn params_switch_to_params_route() {
        let root = api("http://localhost:8000/");
        let bare = root
            .predict_endpoint("upload_predict", &UploadParams::default(), &[])
            .unwrap();
        assert_eq!(bare.as_str(), "http://localhost:8000/api/upload_predict");

        let params = UploadParams {
            radius: Some("10".into()),
            unit: Unit::Mm,
            conf: Some(0.25),
            iou: None,
        };
        let with_params = root
            .predict_endpoint("re_predict", &params, &[("image_name", "rock1.jpg")])
            .unwrap();
        assert_eq!(
            with_params.as_str(),
            "http://localhost:8000/api/re_predict/params?image_name=rock1.jpg&real_radius=10&unit=mm&conf=0.25"
        );

        let stored_only = root
            .predict_endpoint("re_predict", &UploadParams::default(), &[("image_name", "a.png")])
            .unwrap();
        assert_eq!(
            stored_only.as_str(),
            "http://localhost:8000/api/re_predict?image_name=a.png"
        );
    }

    #[test]
    fn invalid_params_never_build_a_url() {
        let root = api("http://localhost:8000/");
        let params = UploadParams {
            iou: Some(2.0),
            ..UploadParams::default()
        };
        assert!(matches!(
            root.predict_endpoint("upload_predict", &params, &[]),
            Err(ApiError::Params(_))
        ));
    }

    #[test]
    fn error_detail_prefers_fastapi_detail() {
        assert_eq!(
            error_detail(StatusCode::BAD_REQUEST, r#"{"detail":"Username already registered"}"#),
            "Username already registered"
        );
        assert_eq!(
            error_detail(StatusCode::UNAUTHORIZED, r#"{"error":"Token verification failed"}"#),
            "Token verification failed"
        );
        assert_eq!(
            error_detail(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            "boom"
        );
        assert_eq!(
            error_detail(StatusCode::NOT_FOUND, ""),
            "Not Found"
        );
    }
}
