use anyhow::{anyhow, Result};
use std::sync::Mutex;
use tracing::warn;

use crate::models::JokeStore;

/// Session-scoped joke cache. The backing store holds either nothing or one
/// fully populated mapping from a completed fetch; there are no partial
/// writes. Behind a trait so tests can substitute their own backing.
pub trait JokeCache {
    /// The cached mapping, or `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<JokeStore>>;

    /// Overwrites the cache with `jokes` in a single write. Empty mappings
    /// are skipped so a fetch that produced nothing cannot clobber state.
    fn save(&self, jokes: &JokeStore) -> Result<()>;

    /// Read-modify-rewrite of a single entry's like count.
    fn set_likes(&self, id: u32, likes: u32) -> Result<()>;

    fn clear(&self);
}

/// In-memory cache living for the lifetime of the process, the equivalent
/// of one sessionStorage key holding the serialized mapping.
pub struct SessionCache {
    slot: Mutex<Option<String>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl JokeCache for SessionCache {
    fn load(&self) -> Result<Option<JokeStore>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("session cache poisoned"))?;
        match slot.as_deref() {
            Some(serialized) => Ok(Some(serde_json::from_str(serialized)?)),
            None => Ok(None),
        }
    }

    fn save(&self, jokes: &JokeStore) -> Result<()> {
        if jokes.is_empty() {
            warn!("refusing to cache an empty joke mapping");
            return Ok(());
        }

        let serialized = serde_json::to_string(jokes)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("session cache poisoned"))?;
        *slot = Some(serialized);
        Ok(())
    }

    fn set_likes(&self, id: u32, likes: u32) -> Result<()> {
        let mut jokes = self
            .load()?
            .ok_or_else(|| anyhow!("no cached jokes to update"))?;
        let joke = jokes
            .get_mut(&id)
            .ok_or_else(|| anyhow!("joke {} is not in the cache", id))?;
        joke.likes = likes;
        self.save(&jokes)
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
