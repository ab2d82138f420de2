use std::path::PathBuf;

/// Where the single SQLite file backing a `Storage` lives.
#[derive(Debug, Clone)]
pub enum StoragePath {
    /// An on-disk database file — the embedded, single-file deployment the
    /// spec's persistence section assumes.
    File(PathBuf),
    /// A private, non-shared in-memory database. Each `Storage::open` call
    /// gets its own database, which is exactly what test suites want.
    Memory,
}

/// Knobs for opening a `Storage`. Threaded straight to `PRAGMA`s at open
/// time; there is no broader configuration surface here because the core is
/// an in-process library, not a server with its own config file.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: StoragePath,
    /// `PRAGMA busy_timeout`, in milliseconds. Spec §5 default: 10s.
    pub busy_timeout_ms: u32,
    /// `PRAGMA cache_size`. Negative values are KiB (SQLite convention).
    pub cache_size: i64,
}

impl StorageConfig {
    pub fn memory() -> Self {
        StorageConfig {
            path: StoragePath::Memory,
            ..Self::default()
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        StorageConfig {
            path: StoragePath::File(path.into()),
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            path: StoragePath::Memory,
            busy_timeout_ms: 10_000,
            cache_size: -2_000,
        }
    }
}
