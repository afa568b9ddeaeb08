use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, warn};

use crate::error::PersistenceError;

/// Resultado de quitar una entrada de una playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    NoPlaylist,
    NoEntry,
    Removed,
}

/// Manager de playlists con nombre: consultas en memoria reflejadas en un JSON.
///
/// Cada mutación reescribe el archivo entero a través de un temporal en el
/// mismo directorio que se renombra sobre el original. Los fallos de
/// escritura se registran y el estado en memoria se conserva.
pub struct PlaylistStore {
    path: PathBuf,
    playlists: Mutex<HashMap<String, Vec<String>>>,
}

impl PlaylistStore {
    /// Lee `path`. Un archivo ausente o mal formado da un store vacío.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let playlists = match read_playlists(&path).await {
            Ok(playlists) => {
                info!("📂 {} playlists cargadas desde {}", playlists.len(), path.display());
                playlists
            }
            Err(e) => {
                warn!("⚠️ No se pudo leer {} ({}), sin playlists", path.display(), e);
                HashMap::new()
            }
        };

        Self {
            path,
            playlists: Mutex::new(playlists),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Devuelve `false` si el nombre ya existe.
    pub async fn create(&self, name: &str) -> bool {
        let mut playlists = self.playlists.lock().await;
        if playlists.contains_key(name) {
            return false;
        }
        playlists.insert(name.to_string(), Vec::new());
        self.persist(&playlists).await;
        true
    }

    /// Devuelve `false` si no existe la playlist.
    pub async fn add(&self, name: &str, query: &str) -> bool {
        let mut playlists = self.playlists.lock().await;
        let Some(entries) = playlists.get_mut(name) else {
            return false;
        };
        entries.push(query.to_string());
        self.persist(&playlists).await;
        true
    }

    /// Quita la primera entrada igual a `query`.
    pub async fn remove(&self, name: &str, query: &str) -> RemoveOutcome {
        let mut playlists = self.playlists.lock().await;
        let Some(entries) = playlists.get_mut(name) else {
            return RemoveOutcome::NoPlaylist;
        };
        let Some(index) = entries.iter().position(|entry| entry == query) else {
            return RemoveOutcome::NoEntry;
        };
        entries.remove(index);
        self.persist(&playlists).await;
        RemoveOutcome::Removed
    }

    pub async fn delete(&self, name: &str) -> bool {
        let mut playlists = self.playlists.lock().await;
        if playlists.remove(name).is_none() {
            return false;
        }
        self.persist(&playlists).await;
        true
    }

    pub async fn get(&self, name: &str) -> Option<Vec<String>> {
        self.playlists.lock().await.get(name).cloned()
    }

    /// Nombres de playlists con su número de entradas, ordenados.
    pub async fn list(&self) -> Vec<(String, usize)> {
        let playlists = self.playlists.lock().await;
        let mut list: Vec<_> = playlists
            .iter()
            .map(|(name, entries)| (name.clone(), entries.len()))
            .collect();
        list.sort();
        list
    }

    async fn persist(&self, playlists: &HashMap<String, Vec<String>>) {
        match self.write(playlists).await {
            Ok(()) => debug!("💾 {} playlists guardadas en {}", playlists.len(), self.path.display()),
            Err(e) => warn!("⚠️ No se pudieron guardar las playlists en {}: {}", self.path.display(), e),
        }
    }

    async fn write(&self, playlists: &HashMap<String, Vec<String>>) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(playlists)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, content.as_bytes()))
            .await
            .map_err(|e| PersistenceError::Io(std::io::Error::other(e)))?
    }
}

async fn read_playlists(path: &Path) -> Result<HashMap<String, Vec<String>>, PersistenceError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlists.json");

        let store = PlaylistStore::load(&path).await;
        assert!(store.create("chill").await);
        assert!(store.create("party").await);
        assert!(store.add("chill", "lofi beats").await);
        assert!(store.add("chill", "https://youtu.be/abc").await);
        assert!(store.add("chill", "lofi beats").await);
        assert!(store.add("party", "daft punk").await);

        let reloaded = PlaylistStore::load(&path).await;
        assert_eq!(
            reloaded.get("chill").await,
            Some(vec![
                "lofi beats".to_string(),
                "https://youtu.be/abc".to_string(),
                "lofi beats".to_string(),
            ])
        );
        assert_eq!(
            reloaded.list().await,
            vec![("chill".to_string(), 3), ("party".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_missing_and_malformed_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();

        let missing = PlaylistStore::load(dir.path().join("nope.json")).await;
        assert!(missing.list().await.is_empty());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "[1, 2, 3]").unwrap();
        let store = PlaylistStore::load(&broken).await;
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_takes_first_match_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::load(dir.path().join("p.json")).await;

        assert_eq!(store.remove("x", "a").await, RemoveOutcome::NoPlaylist);
        store.create("x").await;
        store.add("x", "a").await;
        store.add("x", "b").await;
        store.add("x", "a").await;

        assert_eq!(store.remove("x", "c").await, RemoveOutcome::NoEntry);
        assert_eq!(store.remove("x", "a").await, RemoveOutcome::Removed);
        assert_eq!(store.get("x").await, Some(vec!["b".to_string(), "a".to_string()]));
    }

    #[tokio::test]
    async fn test_create_add_delete_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        let store = PlaylistStore::load(&path).await;

        assert!(store.create("x").await);
        assert!(!store.create("x").await);
        assert!(!store.add("missing", "song").await);
        assert!(store.delete("x").await);
        assert!(!store.delete("x").await);

        let reloaded = PlaylistStore::load(&path).await;
        assert!(reloaded.get("x").await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::load(dir.path().join("gone").join("p.json")).await;

        assert!(store.create("x").await);
        assert!(store.add("x", "song").await);
        assert_eq!(store.get("x").await, Some(vec!["song".to_string()]));
    }
}
