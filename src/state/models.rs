// Data models for disease observations
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A diagnosed tree disease together with the photo it was taken from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disease {
    pub id: Uuid,
    pub tree_disease_name: String,
    pub date_taken: DateTime<Utc>,
    /// Absolute path of the app-private copy of the photo
    pub image_path: String,
    pub image_sha256: String,
    pub image_bytes: i64,
}

/// Result of copying a photo into private storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub path: String,
    pub sha256: String,
    pub bytes: i64,
}

impl Disease {
    pub fn new(tree_disease_name: String, image: StoredImage) -> Self {
        Disease {
            id: Uuid::new_v4(),
            tree_disease_name,
            date_taken: Utc::now(),
            image_path: image.path,
            image_sha256: image.sha256,
            image_bytes: image.bytes,
        }
    }
}
