use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::instrument;

use super::{KeyValueStore, StoreErr, StoreResult};

/// Stores each key as a file of the same name inside `dir`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let is_plain_name = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\'])
            && key != "..";

        if !is_plain_name {
            return Err(StoreErr::InvalidKey(key.to_string()));
        }

        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a hidden sibling file first and renames it over the target, so readers never
    /// observe a half-written value
    #[instrument(skip(self, value), fields(len = value.len()))]
    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let staging = self.dir.join(format!(".{key}.tmp"));

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&staging, value).await?;
        tokio::fs::rename(&staging, &path).await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert_eq!(store.get("last_check.txt").await.unwrap(), None);

        store.put("last_check.txt", "1701432000").await.unwrap();
        assert_eq!(
            store.get("last_check.txt").await.unwrap().as_deref(),
            Some("1701432000")
        );

        store.put("last_check.txt", "5").await.unwrap();
        assert_eq!(store.get("last_check.txt").await.unwrap().as_deref(), Some("5"));

        // staging file is renamed away
        assert!(!dir.path().join(".last_check.txt.tmp").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("last_check.txt")).unwrap(),
            "5"
        );
    }

    #[tokio::test]
    async fn test_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("state"));

        store.put("leaderboard_cache.json", "{}").await.unwrap();
        assert_eq!(
            store.get("leaderboard_cache.json").await.unwrap().as_deref(),
            Some("{}")
        );
    }

    #[tokio::test]
    async fn test_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        for key in ["", "..", "../escape", "a/b", ".hidden", "a\\b"] {
            assert!(matches!(
                store.put(key, "x").await,
                Err(StoreErr::InvalidKey(_))
            ));
        }
    }
}
