use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Current on-disk format version
const STORE_VERSION: &str = "1.0";

/// Durable key/value storage for the engine's collections.
///
/// The store owns durability, not semantics: values are opaque bytes, one
/// document per key, and each call is treated as atomic.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Versioned envelope wrapped around every stored collection, so fields can
/// be added later without breaking existing data.
#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct Envelope<T> {
    version: String,
    data: T,
}

/// Load a collection, unwrapping the version envelope.
///
/// Returns `Ok(None)` when the key is absent or carries an unknown version
/// (logged); any storage or decoding failure propagates.
pub fn load_versioned<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };

    let envelope: Envelope<T> = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse stored value for key '{key}'"))?;

    if envelope.version != STORE_VERSION {
        warn!(
            "Stored value for '{}' has version {} (expected {}), treating as absent",
            key, envelope.version, STORE_VERSION
        );
        return Ok(None);
    }

    Ok(Some(envelope.data))
}

/// Save a collection inside the version envelope
pub fn save_versioned<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let envelope = Envelope {
        version: STORE_VERSION.to_string(),
        data: value,
    };
    let bytes = serde_json::to_vec_pretty(&envelope)
        .with_context(|| format!("failed to serialize value for key '{key}'"))?;
    store.set(key, &bytes)
}

/// File-backed store: one JSON document per key under a data directory
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the store at the platform's default data directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(default_data_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(bytes))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        atomic_write(&self.key_path(key), value)
    }
}

/// In-process store for tests and embedding
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let values = self.values.lock().expect("store lock poisoned");
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut values = self.values.lock().expect("store lock poisoned");
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Resolve the platform data directory for warden state
pub fn default_data_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        // System location when available, per-user otherwise
        let system_path = PathBuf::from("/var/lib/app-warden");
        if system_path.exists() {
            return Ok(system_path);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "app-warden") {
            return Ok(dirs.data_local_dir().to_path_buf());
        }

        anyhow::bail!("could not determine data directory");
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from("/Library/Application Support/app-warden"))
    }

    #[cfg(target_os = "windows")]
    {
        let mut path = PathBuf::from(
            std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".to_string()),
        );
        path.push("app-warden");
        Ok(path)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}

/// Write content to a temporary file in the target directory, sync, then
/// rename over the target. Atomic on Unix and NTFS filesystems.
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&temp_path)
            .with_context(|| format!("failed to create {}", temp_path.display()))?;
        file.write_all(content)
            .context("failed to write temporary file")?;
        file.sync_all().context("failed to sync file to disk")?;
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
