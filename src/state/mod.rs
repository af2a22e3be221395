// State management module
// Handles SQLite persistence and file system operations

pub mod db;
pub mod models;
pub mod queries;
pub mod storage;

pub use db::{open_db, open_in_memory, DbConnection, DbError, DbResult};
pub use models::{Disease, StoredImage};
pub use queries::{
    delete_all_diseases, delete_disease, get_disease, insert_disease, list_diseases,
};
pub use storage::{
    save_image_locally, ContentResolver, FileResolver, StorageError, StorageResult,
};
