use std::path::{Path, PathBuf};

use messages_core::{CoreError, TemplateStore};
use tokio::fs;
use tracing::{debug, info};

use crate::error::ServerResult;
use crate::state::AppState;

const STORE_FILE_NAME: &str = "templates.json";
const STORE_TMP_FILE_NAME: &str = "templates.json.tmp";

pub fn store_file_path(dir: &Path) -> PathBuf {
    dir.join(STORE_FILE_NAME)
}

/// Loads the store from `dir`, or returns an empty one when no file exists yet.
pub async fn load_store(dir: &Path) -> ServerResult<TemplateStore> {
    let file_path = store_file_path(dir);
    let raw = match fs::read(&file_path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = ?file_path, "No store file found, starting empty");
            return Ok(TemplateStore::new());
        }
        Err(e) => return Err(CoreError::io(&file_path, e).into()),
    };
    let store: TemplateStore = serde_json::from_slice(&raw).map_err(|e| {
        CoreError::Deserialization(format!("Failed to parse {}: {}", file_path.display(), e))
    })?;
    info!(path = ?file_path, templates = store.template_count(), "Store loaded");
    Ok(store)
}

/// Writes the store to `dir` through a temporary file and an atomic rename.
pub async fn save_store(store: &TemplateStore, dir: &Path) -> ServerResult<()> {
    fs::create_dir_all(dir).await.map_err(|e| CoreError::io(dir, e))?;

    let bytes = serde_json::to_vec_pretty(store)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize store: {}", e)))?;
    let tmp_path = dir.join(STORE_TMP_FILE_NAME);
    let file_path = store_file_path(dir);
    fs::write(&tmp_path, &bytes).await.map_err(|e| CoreError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, &file_path).await.map_err(|e| CoreError::io(&file_path, e))?;

    debug!(path = ?file_path, bytes = bytes.len(), "Store saved");
    Ok(())
}

/// Saves the current state's store. Used at shutdown.
pub async fn save_state(app_state: &AppState) -> ServerResult<()> {
    let store = app_state.store.read().await;
    save_store(&store, &app_state.data_path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_gives_empty_store() {
        let dir = tempdir().unwrap();
        let store = load_store(dir.path()).await.unwrap();
        assert_eq!(store.template_count(), 0);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("nested").join("data");

        let mut store = TemplateStore::new();
        let template = store.create_template("Welcome", "Hi {name}", None);
        store.create_version(template.id, "Welcome", "Hello {name}", Some("friendlier")).unwrap();
        save_store(&store, &data_path).await.unwrap();

        assert!(store_file_path(&data_path).exists());
        assert!(!data_path.join(STORE_TMP_FILE_NAME).exists());

        let loaded = load_store(&data_path).await.unwrap();
        assert_eq!(loaded.template_count(), 1);
        let versions = loaded.versions(template.id).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions.iter().filter(|v| v.content == "Hello {name}").count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(store_file_path(dir.path()), b"{not json").unwrap();
        let err = load_store(dir.path()).await.unwrap_err();
        assert!(matches!(err, crate::error::ServerError::CoreError(CoreError::Deserialization(_))));
    }
}
