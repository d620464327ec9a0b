//! # Epoch LRU with a future slot
//!
//! Bounded recency index of epoch items. Every request for epoch `e` also
//! prepares an item for `e + 1` (the "future" item) once, so the next epoch
//! can be generated in the background before it is needed. The future item
//! lives outside capacity accounting until it is requested.

use super::EpochItem;
use crate::algorithm::MAX_EPOCH;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::trace;

struct LruState<T> {
    cache: LruCache<u64, Arc<T>>,
    future: u64,
    future_item: Option<Arc<T>>,
}

/// Bounded epoch-keyed registry of caches or datasets
pub struct EpochLru<T: EpochItem> {
    state: Mutex<LruState<T>>,
}

impl<T: EpochItem> EpochLru<T> {
    /// Create a registry holding at most `max_items` items (at least one).
    pub fn new(max_items: usize) -> Self {
        let cap = NonZeroUsize::new(max_items.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(LruState {
                cache: LruCache::new(cap),
                future: 0,
                future_item: None,
            }),
        }
    }

    /// Item for `epoch`, plus a newly created future item for `epoch + 1`
    /// when one was not prepared before.
    ///
    /// Neither item is generated here; evicted items are released before
    /// this returns.
    pub fn get(&self, epoch: u64, special_fork_epoch: u64) -> (Arc<T>, Option<Arc<T>>) {
        let mut evicted = None;

        let (item, future) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let cached = state.cache.get(&epoch).cloned();
            let item = match cached {
                Some(item) => item,
                None => {
                    let item = match &state.future_item {
                        Some(future) if state.future == epoch => {
                            trace!(kind = T::KIND, epoch, "Using pre-generated future item");
                            future.clone()
                        }
                        _ => {
                            trace!(kind = T::KIND, epoch, "Requiring new item");
                            Arc::new(T::new(epoch, special_fork_epoch))
                        }
                    };
                    if let Some((old_epoch, old)) = state.cache.push(epoch, item.clone()) {
                        let is_future = state
                            .future_item
                            .as_ref()
                            .is_some_and(|future| Arc::ptr_eq(future, &old));
                        if old_epoch != epoch && !is_future {
                            evicted = Some(old);
                        }
                    }
                    item
                }
            };

            let mut future = None;
            if epoch < MAX_EPOCH - 1 && state.future < epoch + 1 {
                trace!(kind = T::KIND, epoch = epoch + 1, "Requiring new future item");
                let next = Arc::new(T::new(epoch + 1, special_fork_epoch));
                state.future = epoch + 1;
                state.future_item = Some(next.clone());
                future = Some(next);
            }
            (item, future)
        };

        if let Some(old) = evicted {
            trace!(kind = T::KIND, epoch = old.epoch(), "Evicted item");
            old.release();
        }
        (item, future)
    }

    /// Number of items currently held (the future slot excluded)
    pub fn len(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Whether no item is held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `epoch` is currently held
    pub fn contains(&self, epoch: u64) -> bool {
        self.state.lock().cache.contains(&epoch)
    }

    /// Epoch of the recorded future item, if any
    pub fn future_epoch(&self) -> Option<u64> {
        let state = self.state.lock();
        state.future_item.as_ref().map(|_| state.future)
    }
}
