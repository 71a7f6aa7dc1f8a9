use crate::domain::ports::CookieStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CookieStore for MemoryCookieStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// Cookies kept as a flat JSON object on disk. A missing file is an empty jar.
#[derive(Debug)]
pub struct FileCookieStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) if data.is_empty() => Ok(HashMap::new()),
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_vec_pretty(values)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}

#[async_trait]
impl CookieStore for FileCookieStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.save(&values).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCookieStore::new();
        assert_eq!(store.get("refreshToken").await.unwrap(), None);

        store.set("refreshToken", "abc").await.unwrap();
        assert_eq!(store.get("refreshToken").await.unwrap().as_deref(), Some("abc"));

        store.remove("refreshToken").await.unwrap();
        assert_eq!(store.get("refreshToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cookies.json");

        FileCookieStore::new(&path)
            .set("refreshToken", "r-1")
            .await
            .unwrap();

        let reopened = FileCookieStore::new(&path);
        assert_eq!(reopened.get("refreshToken").await.unwrap().as_deref(), Some("r-1"));

        reopened.remove("refreshToken").await.unwrap();
        assert_eq!(FileCookieStore::new(&path).get("refreshToken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileCookieStore::new(dir.path().join("absent.json"));

        assert_eq!(store.get("anything").await.unwrap(), None);
        store.remove("anything").await.unwrap();
        assert!(!dir.path().join("absent.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, b"not json").unwrap();

        assert!(FileCookieStore::new(&path).get("refreshToken").await.is_err());
    }
}
