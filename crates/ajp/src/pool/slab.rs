//! A bounded slab of reusable values.
//!
//! Slots are addressed by index. A semaphore with one permit per slot bounds
//! how many values are lent out at once, and a bitset records which slots are
//! lent, so a value is never handed to two borrowers. Values are created lazily
//! the first time their slot is used and recycled when they come back.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::trace;

use super::bitset::BitSet;
use crate::protocol::PoolError;

/// Clears every field a borrower may have set before a value is lent again
pub trait Recycle {
    fn recycle(&mut self);
}

struct Slots<T> {
    values: Vec<Option<T>>,
    in_use: BitSet,
}

struct SlabInner<T> {
    name: &'static str,
    capacity: usize,
    acquire_timeout: Duration,
    permits: Arc<Semaphore>,
    slots: Mutex<Slots<T>>,
}

impl<T> SlabInner<T> {
    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        // a panic while holding the lock leaves the slots consistent, every update is a single step
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Slab<T> {
    inner: Arc<SlabInner<T>>,
}

impl<T> Clone for Slab<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> fmt::Debug for Slab<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slab")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("in_use", &self.in_use())
            .finish()
    }
}

impl<T: Recycle + Default> Slab<T> {
    /// A slab lending at most `capacity` values.
    ///
    /// `acquire` waits up to `acquire_timeout` for a free slot, a zero timeout
    /// makes it fail immediately when the slab is exhausted.
    pub fn new(name: &'static str, capacity: usize, acquire_timeout: Duration) -> Self {
        let slots = Slots { values: (0..capacity).map(|_| None).collect(), in_use: BitSet::with_len(capacity) };
        let inner = SlabInner {
            name,
            capacity,
            acquire_timeout,
            permits: Arc::new(Semaphore::new(capacity)),
            slots: Mutex::new(slots),
        };
        Self { inner: Arc::new(inner) }
    }

    pub async fn acquire(&self) -> Result<Pooled<T>, PoolError> {
        if self.inner.acquire_timeout.is_zero() {
            return self.try_acquire();
        }

        let permit = tokio::time::timeout(self.inner.acquire_timeout, Arc::clone(&self.inner.permits).acquire_owned())
            .await
            .map_err(|_elapsed| PoolError::exhausted(self.inner.capacity))?
            .map_err(|_closed| PoolError::Closed)?;

        Ok(self.lend(permit))
    }

    /// Lends a value without waiting, `PoolError::Exhausted` when every slot is taken
    pub fn try_acquire(&self) -> Result<Pooled<T>, PoolError> {
        let permit = Arc::clone(&self.inner.permits).try_acquire_owned().map_err(|e| match e {
            TryAcquireError::NoPermits => PoolError::exhausted(self.inner.capacity),
            TryAcquireError::Closed => PoolError::Closed,
        })?;

        Ok(self.lend(permit))
    }

    /// Returns a value to the slab, same as dropping it
    pub fn release(&self, pooled: Pooled<T>) {
        drop(pooled);
    }

    fn lend(&self, permit: OwnedSemaphorePermit) -> Pooled<T> {
        let mut slots = self.inner.lock();
        // holding a permit guarantees at least one clear bit
        let slot = slots.in_use.first_clear().unwrap_or(0);
        debug_assert!(!slots.in_use.contains(slot));
        slots.in_use.insert(slot);
        let value = slots.values[slot].take().unwrap_or_default();
        drop(slots);

        trace!(slab = self.inner.name, slot, "lend pooled value");
        Pooled { slot, value, slab: Arc::clone(&self.inner), _permit: permit }
    }

    /// Closes the slab, pending and future acquires fail with `PoolError::Closed`
    pub fn close(&self) {
        self.inner.permits.close();
    }
}

impl<T> Slab<T> {
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn in_use(&self) -> usize {
        self.inner.lock().in_use.count()
    }

    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }
}

/// A value borrowed from a [`Slab`].
///
/// Dropping it recycles the value and puts it back in its slot.
pub struct Pooled<T: Recycle + Default> {
    slot: usize,
    value: T,
    slab: Arc<SlabInner<T>>,
    // released after the slot is cleared in `drop`
    _permit: OwnedSemaphorePermit,
}

impl<T: Recycle + Default> Pooled<T> {
    /// The slot index, unique among the values currently lent by the slab
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl<T: Recycle + Default> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: Recycle + Default> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.value
    }
}

impl<T: Recycle + Default + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled").field("slot", &self.slot).field("value", &self.value).finish()
    }
}

impl<T: Recycle + Default> Drop for Pooled<T> {
    fn drop(&mut self) {
        let mut value = std::mem::take(&mut self.value);
        value.recycle();

        let mut slots = self.slab.lock();
        slots.values[self.slot] = Some(value);
        slots.in_use.remove(self.slot);
        trace!(slab = self.slab.name, slot = self.slot, "return pooled value");
    }
}
