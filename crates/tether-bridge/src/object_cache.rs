// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host object to native proxy cache
//!
//! The native side keeps one script proxy per host object. The cache maps a
//! host object's identity to the id of that proxy without keeping the host
//! object alive.

use crate::object::{HostObject, ObjectRef, object_identity};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Opaque id of a native-side proxy object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeObjectId(u64);

impl NativeObjectId {
    /// Wrap a raw native id
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw native id
    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

struct Entry {
    key: Weak<dyn HostObject>,
    id: NativeObjectId,
}

/// Weakly keyed map from host objects to native proxies.
#[derive(Default)]
pub struct ObjectCache {
    entries: Mutex<HashMap<usize, Entry>>,
}

impl ObjectCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the proxy for `object`, replacing any previous one
    pub fn insert(&self, object: &ObjectRef, id: NativeObjectId) {
        let mut entries = self.entries.lock();
        Self::prune(&mut entries);
        entries.insert(
            object_identity(object),
            Entry {
                key: Arc::downgrade(object),
                id,
            },
        );
    }

    /// The proxy recorded for `object`
    pub fn get(&self, object: &ObjectRef) -> Option<NativeObjectId> {
        let mut entries = self.entries.lock();
        let key = object_identity(object);
        let (alive, id) = entries
            .get(&key)
            .map(|e| (e.key.strong_count() > 0, e.id))?;
        if !alive {
            entries.remove(&key);
            return None;
        }
        Some(id)
    }

    /// Every live proxy, in ascending id order
    pub fn all(&self) -> Vec<NativeObjectId> {
        let mut entries = self.entries.lock();
        Self::prune(&mut entries);
        let mut ids: Vec<NativeObjectId> = entries.values().map(|e| e.id).collect();
        ids.sort_unstable();
        ids
    }

    /// Forget the proxy for `object`. Returns false if there was none.
    pub fn remove(&self, object: &ObjectRef) -> bool {
        self.entries
            .lock()
            .remove(&object_identity(object))
            .is_some_and(|e| e.key.strong_count() > 0)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        Self::prune(&mut entries);
        entries.len()
    }

    /// Whether the cache has no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(entries: &mut HashMap<usize, Entry>) {
        let before = entries.len();
        entries.retain(|_, e| e.key.strong_count() > 0);
        let pruned = before - entries.len();
        if pruned > 0 {
            tracing::trace!(pruned, "pruned dead object cache entries");
        }
    }
}

impl fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl HostObject for ObjectCache {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::PropertyBag;

    fn object() -> ObjectRef {
        Arc::new(PropertyBag::new())
    }

    #[test]
    fn test_insert_get() {
        let cache = ObjectCache::new();
        let a = object();
        let b = object();
        cache.insert(&a, NativeObjectId::from_raw(10));

        assert_eq!(cache.get(&a), Some(NativeObjectId::from_raw(10)));
        assert_eq!(cache.get(&b), None);
    }

    #[test]
    fn test_replace() {
        let cache = ObjectCache::new();
        let a = object();
        cache.insert(&a, NativeObjectId::from_raw(1));
        cache.insert(&a, NativeObjectId::from_raw(2));
        assert_eq!(cache.all(), vec![NativeObjectId::from_raw(2)]);
    }

    #[test]
    fn test_remove() {
        let cache = ObjectCache::new();
        let a = object();
        cache.insert(&a, NativeObjectId::from_raw(1));
        assert!(cache.remove(&a));
        assert!(!cache.remove(&a));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_does_not_keep_objects_alive() {
        let cache = ObjectCache::new();
        let a = object();
        let b = object();
        cache.insert(&a, NativeObjectId::from_raw(1));
        cache.insert(&b, NativeObjectId::from_raw(2));

        let weak = Arc::downgrade(&a);
        drop(a);
        assert!(weak.upgrade().is_none());
        assert_eq!(cache.all(), vec![NativeObjectId::from_raw(2)]);
        assert_eq!(cache.len(), 1);
    }
}
