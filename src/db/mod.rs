pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Directory holding the cache, local state and logs.
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("storefront"))
}

/// Persistent key/value store for client-side state.
///
/// Values are plain JSON under fixed keys with no versioning.
pub struct LocalStore {
  conn: Mutex<Connection>,
}

impl LocalStore {
  /// Open or create the store at the default location
  pub fn open() -> Result<Self> {
    Self::open_at(&data_dir()?.join("state.db"))
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  #[allow(dead_code)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Read and decode the value under `key`.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let raw: Option<String> = conn
      .query_row(
        "SELECT value FROM local_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read '{}': {}", key, e))?;

    raw
      .map(|raw| {
        serde_json::from_str(&raw).map_err(|e| eyre!("Failed to decode stored '{}': {}", key, e))
      })
      .transpose()
  }

  pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
    let raw =
      serde_json::to_string(value).map_err(|e| eyre!("Failed to encode '{}': {}", key, e))?;
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO local_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, raw],
      )
      .map_err(|e| eyre!("Failed to write '{}': {}", key, e))?;

    Ok(())
  }

  pub fn remove(&self, key: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    conn
      .execute("DELETE FROM local_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove '{}': {}", key, e))?;
    Ok(())
  }
}
