use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// `current-user` answers either `{"message": "Token is valid", "user": {...}}`
/// or the bare user object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CurrentUserPayload {
    Wrapped {
        user: CurrentUser,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(CurrentUser),
}

impl CurrentUserPayload {
    pub fn into_user(self) -> CurrentUser {
        match self {
            CurrentUserPayload::Wrapped { user, .. } => user,
            CurrentUserPayload::Bare(user) => user,
        }
    }
}
