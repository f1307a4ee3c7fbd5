//! Durable storage for the feeding history.
//!
//! The store is written one slot at a time (plus the cursor) after each
//! admitted feed and read back whole at startup. Failures never block a
//! feed; the controller logs them and keeps the in-memory history.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::history::FeedEvent;

type BoxError = Box<dyn Error + Send + Sync>;

/// Persisted image of a `FeedingStore`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedFeedings {
    pub cursor: usize,
    #[serde(default)]
    pub slots: Vec<FeedEvent>,
}

impl PersistedFeedings {
    pub fn empty(capacity: usize) -> Self {
        Self {
            cursor: 0,
            slots: vec![FeedEvent::default(); capacity],
        }
    }

    fn put(&mut self, index: usize, event: &FeedEvent, cursor: usize) {
        if self.slots.len() <= index {
            self.slots.resize(index + 1, FeedEvent::default());
        }
        self.slots[index] = *event;
        self.cursor = cursor;
    }
}

/// Backend for the feeding history.
pub trait FeedingPersistence {
    /// Read the whole image. A backend with nothing stored yet returns an
    /// empty image of `capacity` slots.
    fn load(&mut self, capacity: usize) -> Result<PersistedFeedings, BoxError>;

    /// Write one slot and the new cursor.
    fn store(&mut self, index: usize, event: &FeedEvent, cursor: usize) -> Result<(), BoxError>;
}

impl<T: FeedingPersistence + ?Sized> FeedingPersistence for Box<T> {
    fn load(&mut self, capacity: usize) -> Result<PersistedFeedings, BoxError> {
        (**self).load(capacity)
    }
    fn store(&mut self, index: usize, event: &FeedEvent, cursor: usize) -> Result<(), BoxError> {
        (**self).store(index, event, cursor)
    }
}

/// In-memory backend. Clones share the same image, so a test can keep a
/// handle while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    image: Arc<Mutex<PersistedFeedings>>,
    failing: Arc<Mutex<bool>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(image: PersistedFeedings) -> Self {
        Self {
            image: Arc::new(Mutex::new(image)),
            failing: Arc::default(),
        }
    }

    /// Copy of the stored image.
    pub fn image(&self) -> PersistedFeedings {
        self.image.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Make every subsequent `load`/`store` fail.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut f) = self.failing.lock() {
            *f = failing;
        }
    }

    fn check(&self) -> Result<(), BoxError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err("memory persistence unavailable".into());
        }
        Ok(())
    }
}

impl FeedingPersistence for MemoryPersistence {
    fn load(&mut self, capacity: usize) -> Result<PersistedFeedings, BoxError> {
        self.check()?;
        let image = self.image.lock().map_err(|e| e.to_string())?;
        if image.slots.is_empty() {
            return Ok(PersistedFeedings::empty(capacity));
        }
        Ok(image.clone())
    }

    fn store(&mut self, index: usize, event: &FeedEvent, cursor: usize) -> Result<(), BoxError> {
        self.check()?;
        let mut image = self.image.lock().map_err(|e| e.to_string())?;
        image.put(index, event, cursor);
        Ok(())
    }
}

/// TOML file backend. The whole image is rewritten atomically on each store.
///
/// A file that exists but cannot be read back is never overwritten: after a
/// failed `load` every `store` is refused until a later `load` succeeds.
#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
    image: PersistedFeedings,
    unreadable: bool,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image: PersistedFeedings::default(),
            unreadable: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a history file written by `FilePersistence`.
pub fn read_history_file(path: &Path) -> Result<PersistedFeedings, BoxError> {
    let text = std::fs::read_to_string(path)?;
    let image = toml::from_str::<PersistedFeedings>(&text)
        .map_err(|e| format!("parse history {}: {e}", path.display()))?;
    Ok(image)
}

impl FeedingPersistence for FilePersistence {
    fn load(&mut self, capacity: usize) -> Result<PersistedFeedings, BoxError> {
        self.image = if self.path.exists() {
            match read_history_file(&self.path) {
                Ok(image) => image,
                Err(e) => {
                    self.unreadable = true;
                    return Err(e);
                }
            }
        } else {
            tracing::debug!(path = %self.path.display(), "no history file yet");
            PersistedFeedings::empty(capacity)
        };
        self.unreadable = false;
        Ok(self.image.clone())
    }

    fn store(&mut self, index: usize, event: &FeedEvent, cursor: usize) -> Result<(), BoxError> {
        if self.unreadable {
            return Err(format!(
                "history file {} could not be read; leaving it untouched",
                self.path.display()
            )
            .into());
        }
        self.image.put(index, event, cursor);
        let text = toml::to_string(&self.image)?;
        crate::atomic::write_atomic(&self.path, text.as_bytes())?;
        Ok(())
    }
}
