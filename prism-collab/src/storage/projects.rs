//! RocksDB-backed project store.

use rocksdb::{DBCompressionType, DBWithThreadMode, Options, SingleThreaded, WriteOptions};
use std::path::{Path, PathBuf};

use prism_core::Project;

/// Key the project list is stored under.
pub const STORAGE_KEY: &str = "prism_projects";

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Enable fsync on every write
    pub sync_writes: bool,
    pub storage_key: String,
    /// Max open files for RocksDB
    pub max_open_files: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("prism_data"),
            sync_writes: true,
            storage_key: STORAGE_KEY.to_string(),
            max_open_files: 64,
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create config for testing.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
            storage_key: STORAGE_KEY.to_string(),
            max_open_files: 16,
        }
    }
}

/// Storage errors.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// RocksDB internal error
    DatabaseError(String),
    SerializationError(String),
    DeserializationError(String),
    CompressionError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DatabaseError(e) => write!(f, "Database error: {e}"),
            StoreError::SerializationError(e) => write!(f, "Serialization error: {e}"),
            StoreError::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            StoreError::CompressionError(e) => write!(f, "Compression error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

/// Durable home of the project list.
pub struct ProjectStore {
    db: DBWithThreadMode<SingleThreaded>,
    config: StoreConfig,
}

impl ProjectStore {
    /// Open the store, creating the database if it does not exist.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_keep_log_file_num(2);
        // Values are already LZ4 frames.
        opts.set_compression_type(DBCompressionType::None);

        let db = DBWithThreadMode::<SingleThreaded>::open(&opts, &config.path)?;
        log::debug!("Opened project store at {}", config.path.display());
        Ok(Self { db, config })
    }

    /// Load the saved projects. Absence or corruption yields an empty list.
    pub fn load(&self) -> Vec<Project> {
        match self.try_load() {
            Ok(Some(projects)) => {
                log::info!("Loaded {} projects", projects.len());
                projects
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                log::error!("Discarding unreadable saved projects: {e}");
                Vec::new()
            }
        }
    }

    /// Load the saved projects, reporting why they could not be read.
    /// `Ok(None)` means nothing has been saved yet.
    pub fn try_load(&self) -> Result<Option<Vec<Project>>, StoreError> {
        let Some(compressed) = self.db.get(self.config.storage_key.as_bytes())? else {
            return Ok(None);
        };
        let json = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| StoreError::CompressionError(e.to_string()))?;
        let projects = serde_json::from_slice(&json)
            .map_err(|e| StoreError::DeserializationError(e.to_string()))?;
        Ok(Some(projects))
    }

    /// Replace the saved list with `projects`.
    pub fn save(&self, projects: &[Project]) -> Result<(), StoreError> {
        let json = serde_json::to_vec(projects)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        let compressed = lz4_flex::compress_prepend_size(&json);

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db
            .put_opt(self.config.storage_key.as_bytes(), &compressed, &write_opts)?;

        log::debug!(
            "Saved {} projects ({} -> {} bytes)",
            projects.len(),
            json.len(),
            compressed.len()
        );
        Ok(())
    }

    /// Forget everything saved.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.db.delete(self.config.storage_key.as_bytes())?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }
}
