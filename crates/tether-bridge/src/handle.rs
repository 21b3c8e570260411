// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Reference-counted handles to host objects.
//!
//! Native code cannot take part in host reachability, so any host object it
//! holds is pinned by an entry in the [`HandleTable`] until the native side
//! releases it.
//!
//! ```text
//!   by_identity                    slots
//! ┌──────────────┬────────┐      ┌────────┬──────────────────────┐
//! │ object addr  │ handle │ ───▶ │ handle │ object (Arc) │ refs  │
//! └──────────────┴────────┘      └────────┴──────────────────────┘
//! ```
//!
//! Both maps are sharded, so threads servicing different engines do not
//! contend on one lock. Locks are always taken identity first, then slot.

use crate::error::{BridgeError, Result};
use crate::object::{ObjectRef, object_identity};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::mem::ManuallyDrop;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque token the native side holds in place of a host object.
///
/// Handle values are minted from a monotonically increasing counter and are
/// never reissued, so a stale handle can only ever fail to resolve.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct HostHandle(NonZeroU64);

impl HostHandle {
    /// Rebuild a handle from its raw integer form. Zero is never a handle.
    #[inline]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// The raw integer form passed to native code.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostHandle({:#x})", self.0.get())
    }
}

struct Slot {
    object: ObjectRef,
    refs: usize,
}

/// Table of outstanding host handles.
pub struct HandleTable {
    next_id: AtomicU64,
    slots: DashMap<HostHandle, Slot>,
    by_identity: DashMap<usize, HostHandle>,
}

impl HandleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slots: DashMap::new(),
            by_identity: DashMap::new(),
        }
    }

    /// Hand out a reference to `object`.
    ///
    /// If a handle for the same object is already outstanding its count is
    /// incremented and the same handle is returned.
    pub fn acquire(&self, object: ObjectRef) -> HostHandle {
        let identity = object_identity(&object);

        match self.by_identity.entry(identity) {
            Entry::Occupied(mut entry) => {
                let handle = *entry.get();
                if let Some(mut slot) = self.slots.get_mut(&handle) {
                    slot.refs += 1;
                    tracing::trace!(?handle, refs = slot.refs, "host handle acquired");
                    return handle;
                }
                let handle = self.insert_slot(object);
                entry.insert(handle);
                handle
            }
            Entry::Vacant(entry) => {
                let handle = self.insert_slot(object);
                entry.insert(handle);
                handle
            }
        }
    }

    fn insert_slot(&self, object: ObjectRef) -> HostHandle {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle =
            HostHandle::from_raw(raw).unwrap_or_else(|| unreachable!("handle ids start at 1"));
        tracing::trace!(?handle, object = object.type_name(), "host handle created");
        self.slots.insert(handle, Slot { object, refs: 1 });
        handle
    }

    /// Add a reference to an outstanding handle.
    pub fn retain(&self, handle: HostHandle) -> Result<HostHandle> {
        let mut slot = self
            .slots
            .get_mut(&handle)
            .ok_or(BridgeError::InvalidHandle(handle.to_raw()))?;
        slot.refs += 1;
        Ok(handle)
    }

    /// Drop one reference. The handle becomes invalid once its count
    /// reaches zero.
    pub fn release(&self, handle: HostHandle) -> Result<()> {
        let invalid = || BridgeError::InvalidHandle(handle.to_raw());

        let identity = match self.slots.get(&handle) {
            Some(slot) => object_identity(&slot.object),
            None => return Err(invalid()),
        };

        let retired = match self.by_identity.entry(identity) {
            Entry::Occupied(entry) if *entry.get() == handle => {
                let remaining = {
                    let mut slot = self.slots.get_mut(&handle).ok_or_else(invalid)?;
                    slot.refs -= 1;
                    slot.refs
                };
                if remaining == 0 {
                    let slot = self.slots.remove(&handle);
                    entry.remove();
                    tracing::trace!(?handle, "host handle released");
                    slot
                } else {
                    None
                }
            }
            // The slot was retired by a concurrent release between the two
            // lookups.
            _ => return Err(invalid()),
        };

        // Dropped outside the map locks: the object's destructor may
        // release handles of its own.
        drop(retired);
        Ok(())
    }

    /// Recover the object behind an outstanding handle.
    pub fn resolve(&self, handle: HostHandle) -> Result<ObjectRef> {
        self.slots
            .get(&handle)
            .map(|slot| Arc::clone(&slot.object))
            .ok_or(BridgeError::InvalidHandle(handle.to_raw()))
    }

    /// Whether `handle` is outstanding.
    pub fn contains(&self, handle: HostHandle) -> bool {
        self.slots.contains_key(&handle)
    }

    /// Reference count of `handle`, zero if it is not outstanding.
    pub fn ref_count(&self, handle: HostHandle) -> usize {
        self.slots.get(&handle).map_or(0, |slot| slot.refs)
    }

    /// Number of outstanding handles.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no handles are outstanding.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Acquire a handle that is released when the guard goes out of scope.
    pub fn scoped(&self, object: ObjectRef) -> ScopedHandle<'_> {
        ScopedHandle {
            table: self,
            handle: self.acquire(object),
        }
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("outstanding", &self.slots.len())
            .finish()
    }
}

/// A handle that lives for one native call.
///
/// The reference is released on every exit path, including unwinding.
pub struct ScopedHandle<'a> {
    table: &'a HandleTable,
    handle: HostHandle,
}

impl ScopedHandle<'_> {
    /// The handle to pass to native code.
    pub fn handle(&self) -> HostHandle {
        self.handle
    }

    /// Transfer ownership of the reference to the native side.
    pub fn into_handle(self) -> HostHandle {
        ManuallyDrop::new(self).handle
    }
}

impl Drop for ScopedHandle<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.table.release(self.handle) {
            tracing::error!(handle = ?self.handle, error = %e, "scoped host handle release failed");
        }
    }
}
