use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex as StdMutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::SystemTime,
};

use tokio::sync::{Mutex, MutexGuard};

use super::model::{Model, ModelRecord};
use crate::error::{EngineError, Result};

/// The single persisted parameter file plus the model resident in memory.
pub struct ModelStore {
    path: PathBuf,
    file_name: String,
    resident: RwLock<Option<Arc<Model>>>,
    /// Bumped under the `resident` write lock by every save and delete.
    generation: AtomicU64,
    /// Modification time of a record that failed to load.
    rejected: StdMutex<Option<SystemTime>>,
    lifecycle: Mutex<()>,
}

impl ModelStore {
    pub fn new(dir: impl AsRef<Path>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            path: dir.as_ref().join(&file_name),
            file_name,
            resident: RwLock::new(None),
            generation: AtomicU64::new(0),
            rejected: StdMutex::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Held by anything that replaces or removes the model (train, delete).
    pub async fn lifecycle(&self) -> MutexGuard<'_, ()> {
        self.lifecycle.lock().await
    }

    pub fn resident(&self) -> Option<Arc<Model>> {
        self.resident
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes the persisted model resident unless one already is.
    ///
    /// A record that cannot be read is logged once and leaves nothing
    /// resident; it is read again only after the file changes.
    pub async fn load(&self) -> Option<Arc<Model>> {
        if let Some(model) = self.resident() {
            return Some(model);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let meta = tokio::fs::metadata(&self.path)
            .await
            .ok()
            .filter(|m| m.is_file())?;
        let modified = meta.modified().ok();
        if modified.is_some() && self.rejected_record() == modified {
            return None;
        }

        let model = match read_record(&self.path).await {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to load model");
                *self.rejected.lock().unwrap_or_else(PoisonError::into_inner) = modified;
                return None;
            }
        };

        let mut slot = self.resident.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = slot.as_ref() {
            return Some(current.clone());
        }
        // saved over or deleted while we were reading
        if self.generation.load(Ordering::Acquire) != generation {
            return None;
        }

        tracing::info!(
            path = %self.path.display(),
            input_size = model.input_size(),
            "model loaded"
        );
        let model = Arc::new(model);
        *slot = Some(model.clone());
        Some(model)
    }

    /// Persists `model` over the previous record and makes it resident.
    /// The record is written beside the target and renamed into place, so a
    /// failed write leaves the previous record untouched.
    pub fn save(&self, model: Model) -> Result<Arc<Model>> {
        let json = serde_json::to_vec(&model.to_record())?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self
            .path
            .with_file_name(format!(".{}.{}.tmp", self.file_name, uuid::Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, &json).and_then(|_| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        let model = Arc::new(model);
        self.replace_resident(Some(model.clone()));
        tracing::info!(
            path = %self.path.display(),
            input_size = model.input_size(),
            "model saved"
        );
        Ok(model)
    }

    pub fn delete(&self) -> Result<()> {
        if !self.exists() {
            return Err(EngineError::NotFound);
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(EngineError::NotFound),
            Err(e) => return Err(e.into()),
        }
        self.replace_resident(None);
        tracing::info!(path = %self.path.display(), "model deleted");
        Ok(())
    }

    fn replace_resident(&self, model: Option<Arc<Model>>) {
        let mut slot = self.resident.write().unwrap_or_else(PoisonError::into_inner);
        *slot = model;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn rejected_record(&self) -> Option<SystemTime> {
        *self.rejected.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn read_record(path: &Path) -> Result<Model> {
    let bytes = tokio::fs::read(path).await?;
    let record: ModelRecord = serde_json::from_slice(&bytes)?;
    Model::from_record(record)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!("ai-backend-store-{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&path).expect("create temp dir");
            Self(path)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn model(input_size: usize) -> Model {
        Model::with_rng(input_size, &mut StdRng::seed_from_u64(11))
    }

    #[tokio::test]
    async fn empty_store_has_nothing_to_load() {
        let dir = TempDir::new();
        let store = ModelStore::new(&dir.0, "model.json");
        assert!(!store.exists());
        assert!(store.load().await.is_none());
        assert!(matches!(store.delete(), Err(EngineError::NotFound)));
    }

    #[tokio::test]
    async fn save_then_load_in_a_fresh_store_infers_input_size() {
        let dir = TempDir::new();
        let saved = model(7);
        ModelStore::new(&dir.0, "model.json")
            .save(saved.clone())
            .unwrap();

        let reopened = ModelStore::new(&dir.0, "model.json");
        assert!(reopened.resident().is_none());
        let loaded = reopened.load().await.expect("loaded");
        assert_eq!(loaded.input_size(), 7);
        assert_eq!(*loaded, saved);
        assert!(reopened.resident().is_some());
    }

    #[tokio::test]
    async fn corrupt_record_is_logged_not_fatal() {
        let dir = TempDir::new();
        fs::write(dir.0.join("model.json"), b"{\"fc1\": 3}").unwrap();
        let store = ModelStore::new(&dir.0, "model.json");
        assert!(store.exists());
        assert!(store.load().await.is_none());
        assert!(store.resident().is_none());
        assert!(store.rejected_record().is_some());

        // a fresh save supersedes the rejected record
        store.save(model(4)).unwrap();
        assert_eq!(store.load().await.unwrap().input_size(), 4);
    }

    #[tokio::test]
    async fn rejected_record_is_not_reread_until_it_changes() {
        let dir = TempDir::new();
        let path = dir.0.join("model.json");
        fs::write(&path, b"not json").unwrap();
        let store = ModelStore::new(&dir.0, "model.json");
        assert!(store.load().await.is_none());

        // same mtime: the stale rejection short-circuits even a valid body
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        let valid = serde_json::to_vec(&model(5).to_record()).unwrap();
        fs::write(&path, &valid).unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(mtime).unwrap();
        drop(file);
        assert!(store.load().await.is_none());

        // any other mtime is read again
        *store.rejected.lock().unwrap() = Some(SystemTime::UNIX_EPOCH);
        assert_eq!(store.load().await.unwrap().input_size(), 5);
    }

    #[tokio::test]
    async fn load_does_not_resurrect_a_deleted_model() {
        let dir = TempDir::new();
        let store = ModelStore::new(&dir.0, "model.json");
        store.save(model(3)).unwrap();
        store.delete().unwrap();
        assert!(store.load().await.is_none());
        assert_eq!(store.generation.load(Ordering::Acquire), 2);
    }

    #[tokio::test]
    async fn delete_clears_file_and_resident() {
        let dir = TempDir::new();
        let store = ModelStore::new(&dir.0, "model.json");
        store.save(model(3)).unwrap();
        assert!(store.exists());

        store.delete().unwrap();
        assert!(!store.exists());
        assert!(store.resident().is_none());
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous_record() {
        let dir = TempDir::new();
        let store = ModelStore::new(&dir.0, "model.json");
        store.save(model(3)).unwrap();
        store.save(model(9)).unwrap();

        let leftovers = fs::read_dir(&dir.0).unwrap().count();
        assert_eq!(leftovers, 1);
        assert_eq!(ModelStore::new(&dir.0, "model.json").load().await.unwrap().input_size(), 9);
    }
}
