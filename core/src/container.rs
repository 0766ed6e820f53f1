use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Main,
    Archive,
}

impl StoreKind {
    pub const ALL: [StoreKind; 2] = [StoreKind::Main, StoreKind::Archive];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Main => "main",
            StoreKind::Archive => "archive",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "main" => Ok(StoreKind::Main),
            "archive" => Ok(StoreKind::Archive),
            other => Err(Error::InvalidInput(format!(
                "Unknown store '{other}' (expected main or archive)"
            ))),
        }
    }
}

/// Where a physical store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    /// Named shared-cache in-memory database.
    Memory(String),
}

impl StoreLocation {
    fn open(&self) -> Result<Database> {
        match self {
            StoreLocation::File(path) => Database::open(path),
            StoreLocation::Memory(name) => Database::open_shared_memory(name),
        }
    }
}

/// The pair of physical stores, resolved by kind.
///
/// Each container owns its own connections, so the interactive and background
/// contexts are separate containers over the same locations.
pub struct Container {
    main: Option<Database>,
    archive: Option<Database>,
    main_location: StoreLocation,
    archive_location: StoreLocation,
}

impl Container {
    /// Mount both stores. A store that fails to load stays unmounted and
    /// resolves to `StoreUnavailable`.
    #[must_use]
    pub fn open(main_location: StoreLocation, archive_location: StoreLocation) -> Self {
        let main = Self::mount(StoreKind::Main, &main_location);
        let archive = Self::mount(StoreKind::Archive, &archive_location);
        Self {
            main,
            archive,
            main_location,
            archive_location,
        }
    }

    #[must_use]
    pub fn open_in_memory() -> Self {
        let id = Uuid::new_v4();
        Self::open(
            StoreLocation::Memory(format!("dcalt-main-{id}")),
            StoreLocation::Memory(format!("dcalt-archive-{id}")),
        )
    }

    fn mount(kind: StoreKind, location: &StoreLocation) -> Option<Database> {
        match location.open() {
            Ok(db) => Some(db),
            Err(e) => {
                tracing::warn!(store = %kind, error = %e, "Failed to load store");
                None
            }
        }
    }

    pub fn resolve_store(&self, kind: StoreKind) -> Result<&Database> {
        let store = match kind {
            StoreKind::Main => self.main.as_ref(),
            StoreKind::Archive => self.archive.as_ref(),
        };
        store.ok_or(Error::StoreUnavailable(kind))
    }

    #[must_use]
    pub fn is_mounted(&self, kind: StoreKind) -> bool {
        self.resolve_store(kind).is_ok()
    }

    /// Mounted stores, main first.
    pub fn mounted(&self) -> impl Iterator<Item = (StoreKind, &Database)> {
        StoreKind::ALL
            .into_iter()
            .filter_map(|kind| self.resolve_store(kind).ok().map(|db| (kind, db)))
    }

    /// A fresh container with its own connections to the same stores.
    #[must_use]
    pub fn background(&self) -> Container {
        Container::open(self.main_location.clone(), self.archive_location.clone())
    }

    /// Run `task` against a background container on the blocking pool.
    ///
    /// Writes become visible to this container once the task's transactions
    /// commit; the caller's connections are never touched by the task.
    pub async fn perform_background_task<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&Container) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let background = self.background();
        tokio::task::spawn_blocking(move || task(&background))
            .await
            .map_err(|e| Error::Background(e.to_string()))?
    }
}
