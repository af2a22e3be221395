// Store configuration
// Where the database and the private image copies live on disk
use std::path::{Path, PathBuf};

use crate::state::storage::{get_app_data_dir, StorageResult};

pub const DEFAULT_DATABASE_FILE: &str = "drbanana.db";
pub const DEFAULT_IMAGES_DIR: &str = "images";
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root of the app-private data directory
    pub data_dir: PathBuf,
    pub database_file: String,
    pub images_dir: String,
    /// Extension given to every copied image, without the dot
    pub image_extension: String,
}

impl StoreConfig {
    /// Configuration rooted at an explicit directory
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            images_dir: DEFAULT_IMAGES_DIR.to_string(),
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
        }
    }

    /// Configuration rooted at the platform app data directory
    pub fn default_location() -> StorageResult<Self> {
        Ok(Self::in_dir(get_app_data_dir()?))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn images_path(&self) -> PathBuf {
        self.data_dir.join(&self.images_dir)
    }
}
