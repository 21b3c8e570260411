// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bounded cache of loaded document contents

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use url::Url;

/// Thread-safe document cache, evicting the oldest entry when full
pub struct DocumentCache {
    /// Cache mapping document URIs to their contents
    entries: DashMap<Url, Arc<str>>,
    /// Insertion order, oldest first
    order: Mutex<VecDeque<Url>>,
    max_entries: usize,
}

impl DocumentCache {
    /// Create a cache holding at most `max_entries` documents
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_entries,
        }
    }

    /// Get cached contents by URI
    pub fn get(&self, uri: &Url) -> Option<Arc<str>> {
        self.entries.get(uri).map(|entry| Arc::clone(entry.value()))
    }

    /// Add a document to the cache
    pub fn insert(&self, uri: Url, contents: Arc<str>) {
        if self.max_entries == 0 {
            return;
        }

        let mut order = self.order.lock();
        if self.entries.insert(uri.clone(), contents).is_none() {
            order.push_back(uri);
        }
        while order.len() > self.max_entries {
            if let Some(oldest) = order.pop_front() {
                tracing::trace!(uri = %oldest, "evicting cached document");
                self.entries.remove(&oldest);
            }
        }
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        let mut order = self.order.lock();
        order.clear();
        self.entries.clear();
    }

    /// Get the number of cached documents
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(crate::config::ModuleConfig::default().max_cache_size)
    }
}
