use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use rusqlite::{params, OptionalExtension};

/// Durable storage of named text blobs.
pub trait BlobStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// Blob store backed by a SQLite file.
#[derive(Clone)]
pub struct Database {
    pub pool: r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>,
}

impl Database {
    pub fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = r2d2_sqlite::SqliteConnectionManager::file(path);
        let pool = r2d2::Pool::new(manager)?;
        let me = Self { pool };
        me.migrate()?;
        Ok(me)
    }

    /// Migrate the database to the latest version.
    fn migrate(&self) -> Result<()> {
        let migrations = [include_str!("migrations/01-blobs.sql")];
        // Find the current migration version. If it fails, we need to run all the migrations.
        let conn = self.pool.get()?;
        let current_version: String = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                params![],
                |row| row.get(0),
            )
            .unwrap_or("0".to_string());
        let current_version = current_version.parse::<usize>().unwrap_or(0);
        tracing::debug!("Current schema version: {}", current_version);
        for migration in migrations.iter().skip(current_version) {
            tracing::info!("Applying migration: {}", migration);
            conn.execute_batch(migration)?;
        }
        Ok(())
    }
}

impl BlobStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row(
                "SELECT value FROM Blob WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO Blob (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Blob store that forgets everything on exit.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl BlobStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let blobs = self.blobs.lock().map_err(|_| anyhow!("Memory store poisoned"))?;
        Ok(blobs.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.blobs
            .lock()
            .map_err(|_| anyhow!("Memory store poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<B: BlobStore + ?Sized> BlobStore for Box<B> {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        (**self).save(key, value)
    }
}
