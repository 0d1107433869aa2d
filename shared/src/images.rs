use serde::{Deserialize, Serialize};

/// An image previously uploaded by the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredImage {
    #[serde(default)]
    pub id: Option<i64>,
    pub filename: String,
    pub size: u64,
    pub upload_time: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageList {
    #[serde(default)]
    pub images: Vec<StoredImage>,
}
