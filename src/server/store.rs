//! In-memory user store, optionally backed by a JSON file.
//!
//! Users are held behind a [`RwLock`]. Removals are serialized by a separate
//! writer lock so concurrent deletes of the same id cannot both succeed, and
//! the data file is written before the in-memory list changes. Readers are
//! never blocked on disk I/O.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Bundled seed data, used when no data file is configured.
const SEED_USERS: &str = include_str!("../../data/users.json");

/// A directory entry, as stored.
///
/// Per-version wire shapes are produced by the handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default)]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid user data in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct UserStore {
    users: RwLock<Vec<User>>,
    path: Option<PathBuf>,
    writer: Mutex<()>,
}

impl UserStore {
    /// A store that lives only in memory.
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
            path: None,
            writer: Mutex::new(()),
        }
    }

    /// The bundled seed users, in memory.
    pub fn seeded() -> Result<Self, StoreError> {
        let users = serde_json::from_str(SEED_USERS).map_err(|source| StoreError::Parse {
            path: PathBuf::from("data/users.json"),
            source,
        })?;
        Ok(Self::new(users))
    }

    /// Load users from `path`. Removals are written back to the same file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let users = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            users: RwLock::new(users),
            path: Some(path.to_path_buf()),
            writer: Mutex::new(()),
        })
    }

    pub fn list(&self) -> Vec<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: u64) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|u| u.id == id)
            .cloned()
    }

    /// Remove the user with `id` if present. Returns whether a user was removed.
    ///
    /// With a data file, the remaining users are written first; if that
    /// fails the store is left unchanged.
    pub async fn remove(&self, id: u64) -> Result<bool, StoreError> {
        let _writer = self.writer.lock().await;

        let remaining = {
            let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
            let Some(position) = users.iter().position(|u| u.id == id) else {
                return Ok(false);
            };
            let mut remaining = users.clone();
            remaining.remove(position);
            remaining
        };

        if let Some(path) = &self.path {
            persist(path, &remaining).await?;
        }
        *self.users.write().unwrap_or_else(PoisonError::into_inner) = remaining;
        Ok(true)
    }
}

async fn persist(path: &Path, users: &[User]) -> Result<(), StoreError> {
    let write_error = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let content = serde_json::to_string_pretty(users)
        .map_err(|e| write_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    tokio::fs::write(path, content + "\n")
        .await
        .map_err(write_error)
}
