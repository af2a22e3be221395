// Disease record store
// Runs database and file work on blocking workers and publishes the
// resulting collection to an observable for the presentation layer
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::observable::Observable;
use crate::state::db::{open_db, DbConnection, DbError};
use crate::state::models::Disease;
use crate::state::queries;
use crate::state::storage::{
    remove_image, save_image_locally, ContentResolver, FileResolver, StorageError,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Background task failed: {0}")]
    Worker(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

async fn run_blocking<T, F>(f: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
}

/// Owns CRUD access to the persisted diseases.
///
/// Every mutation is followed by a full reload, and the reloaded collection
/// is published to the observable from the calling task. A failed operation
/// leaves the published collection untouched.
///
/// Concurrent operations reload independently, so the published value is
/// whichever reload finished last, not necessarily the newest database state.
pub struct DiseaseStore {
    db: DbConnection,
    config: StoreConfig,
    resolver: Arc<dyn ContentResolver>,
    diseases: Observable<Vec<Disease>>,
}

impl DiseaseStore {
    /// Open the store described by `config` and publish its current contents
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        Self::open_with_resolver(config, Arc::new(FileResolver)).await
    }

    pub async fn open_with_resolver(
        config: StoreConfig,
        resolver: Arc<dyn ContentResolver>,
    ) -> StoreResult<Self> {
        let db_path = config.database_path();
        let db = run_blocking(move || Ok(open_db(&db_path)?)).await?;

        let store = Self::with_connection(db, config, resolver);
        store.load_all().await?;

        log::info!(
            "Disease store opened at {} with {} records",
            store.config.data_dir.display(),
            store.diseases.get().len()
        );
        Ok(store)
    }

    /// Wrap an already opened database handle; nothing is published until
    /// the first [`DiseaseStore::load_all`]
    pub fn with_connection(
        db: DbConnection,
        config: StoreConfig,
        resolver: Arc<dyn ContentResolver>,
    ) -> Self {
        Self {
            db,
            config,
            resolver,
            diseases: Observable::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Watch the published collection
    pub fn subscribe(&self) -> watch::Receiver<Vec<Disease>> {
        self.diseases.subscribe()
    }

    /// Snapshot of the last published collection
    pub fn current(&self) -> Vec<Disease> {
        self.diseases.get()
    }

    /// Fetch every record and publish the result
    pub async fn load_all(&self) -> StoreResult<()> {
        let db = self.db.clone();
        let diseases = run_blocking(move || Ok(queries::list_diseases(&db)?)).await?;

        log::debug!("Loaded {} diseases", diseases.len());
        self.diseases.set(diseases);
        Ok(())
    }

    /// Copy the image behind `image_reference` into private storage and
    /// record it under `name`. Returns the new record's id.
    pub async fn add(
        &self,
        name: impl Into<String>,
        image_reference: impl Into<String>,
    ) -> StoreResult<Uuid> {
        let name = name.into();
        let reference = image_reference.into();
        let db = self.db.clone();
        let resolver = Arc::clone(&self.resolver);
        let images_dir = self.config.images_path();
        let extension = self.config.image_extension.clone();

        let id = run_blocking(move || {
            let image =
                save_image_locally(resolver.as_ref(), &reference, &images_dir, &extension)?;
            let disease = Disease::new(name, image);

            if let Err(e) = queries::insert_disease(&db, &disease) {
                remove_image(std::path::Path::new(&disease.image_path));
                return Err(e.into());
            }
            Ok(disease.id)
        })
        .await?;

        log::info!("Added disease {}", id);
        self.refresh().await;
        Ok(id)
    }

    /// Point lookup; blocks the caller until the database answers
    pub fn get_by_id(&self, id: &Uuid) -> StoreResult<Option<Disease>> {
        Ok(queries::get_disease(&self.db, id)?)
    }

    /// Remove one record. Returns `false` when no record had that id.
    pub async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        let db = self.db.clone();
        let removed = run_blocking(move || Ok(queries::delete_disease(&db, &id)?)).await?;

        if removed {
            log::info!("Deleted disease {}", id);
        } else {
            log::debug!("No disease {} to delete", id);
        }
        self.refresh().await;
        Ok(removed)
    }

    /// Remove every record. Returns how many were removed.
    pub async fn delete_all(&self) -> StoreResult<usize> {
        let db = self.db.clone();
        let removed = run_blocking(move || Ok(queries::delete_all_diseases(&db)?)).await?;

        log::info!("Deleted all {} diseases", removed);
        self.refresh().await;
        Ok(removed)
    }

    /// Close the database handle
    pub fn close(self) -> StoreResult<()> {
        self.db.close()?;
        log::debug!("Disease store closed");
        Ok(())
    }

    // The mutation already committed; a failed reload only leaves the
    // published collection stale
    async fn refresh(&self) {
        if let Err(e) = self.load_all().await {
            log::error!("Failed to reload diseases: {}", e);
        }
    }
}
