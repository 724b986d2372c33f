//! In-memory caches for list endpoints
//!
//! Lists of rooms, equipment and reservations are requested on nearly every page load of the
//! frontend, so their last query result is kept for a short time. Handlers which change the
//! underlying data invalidate the corresponding cache. Double booking checks never read from these
//! caches.

use crate::data_store::models::{Equipment, FullReservation, Room};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const INVENTORY_TTL: Duration = Duration::from_secs(5 * 60);
pub const RESERVATIONS_TTL: Duration = Duration::from_secs(30);

/// A single cached value with the time it has been loaded.
///
/// Every [TtlCache::invalidate] bumps a generation counter. A load which started before an
/// invalidation does not store its result, so data read before a write is never cached after it.
pub struct TtlCache<T> {
    state: Mutex<CacheState<T>>,
}

struct CacheState<T> {
    generation: u64,
    entry: Option<(Instant, T)>,
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(CacheState {
                generation: 0,
                entry: None,
            }),
        }
    }
}

impl<T: Clone> TtlCache<T> {
    /// Get the cached value, if it is younger than `ttl`. Otherwise, call `loader` and cache its
    /// result. Errors of the loader are passed through and not cached.
    pub fn get_or_refresh<E, F>(&self, ttl: Duration, loader: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some((loaded_at, value)) = self.lock().entry.as_ref() {
            if loaded_at.elapsed() < ttl {
                return Ok(value.clone());
            }
        }
        self.force_refresh(loader)
    }

    /// Call `loader` unconditionally and replace the cached value with its result, unless the
    /// cache has been invalidated while `loader` was running.
    pub fn force_refresh<E, F>(&self, loader: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let generation = self.lock().generation;
        let value = loader()?;
        let mut state = self.lock();
        if state.generation == generation {
            state.entry = Some((Instant::now(), value.clone()));
        }
        Ok(value)
    }

    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.entry = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState<T>> {
        // A panic while holding the lock can't leave a half-written entry behind
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Default)]
pub struct Caches {
    pub rooms: TtlCache<Vec<Room>>,
    pub equipment: TtlCache<Vec<Equipment>>,
    pub reservations: TtlCache<Vec<FullReservation>>,
}
