// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! String-keyed property bag

use super::{DynamicObject, Invocability, PropertyLookup};
use crate::engine::HostEngine;
use crate::error::HostFault;
use crate::object::HostObject;
use crate::value::HostValue;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A host object backed by a map of named values.
///
/// Names enumerate in sorted order. A frozen bag rejects writes and marks
/// every lookup as cacheable.
#[derive(Default)]
pub struct PropertyBag {
    entries: RwLock<BTreeMap<String, HostValue>>,
    frozen: bool,
    engine: Option<Arc<dyn HostEngine>>,
}

impl PropertyBag {
    /// Create an empty, writable bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a read-only bag
    pub fn frozen(entries: impl IntoIterator<Item = (String, HostValue)>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
            frozen: true,
            engine: None,
        }
    }

    /// Attach the engine that owns this object
    pub fn with_engine(mut self, engine: Arc<dyn HostEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Host-side insert, bypassing the frozen check
    pub fn insert(&self, name: impl Into<String>, value: impl Into<HostValue>) {
        self.entries.write().insert(name.into(), value.into());
    }

    /// Host-side read
    pub fn get(&self, name: &str) -> Option<HostValue> {
        self.entries.read().get(name).cloned()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn ensure_writable(&self, name: &str) -> Result<(), HostFault> {
        if self.frozen {
            return Err(HostFault::invalid_operation(format!(
                "Cannot modify property '{}' of a read-only object",
                name
            )));
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<HostValue>> FromIterator<(K, V)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let bag = PropertyBag::new();
        for (k, v) in iter {
            bag.insert(k, v);
        }
        bag
    }
}

impl HostObject for PropertyBag {
    fn as_dynamic(&self) -> Option<&dyn DynamicObject> {
        Some(self)
    }

    fn engine(&self) -> Option<Arc<dyn HostEngine>> {
        self.engine.clone()
    }
}

impl DynamicObject for PropertyBag {
    fn get_property(&self, name: &str) -> Result<HostValue, HostFault> {
        self.get(name).ok_or_else(|| HostFault::member_not_found(name))
    }

    fn get_property_cacheable(&self, name: &str) -> Result<PropertyLookup, HostFault> {
        Ok(PropertyLookup {
            value: self.get_property(name)?,
            cacheable: self.frozen,
        })
    }

    fn set_property(&self, name: &str, value: HostValue) -> Result<(), HostFault> {
        self.ensure_writable(name)?;
        self.entries.write().insert(name.to_string(), value);
        Ok(())
    }

    fn delete_property(&self, name: &str) -> Result<bool, HostFault> {
        self.ensure_writable(name)?;
        Ok(self.entries.write().remove(name).is_some())
    }

    fn property_names(&self) -> Result<Vec<String>, HostFault> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn invocability(&self) -> Invocability {
        let has_callable = self.entries.read().values().any(HostValue::is_invocable);
        if has_callable {
            Invocability::Method
        } else {
            Invocability::None
        }
    }
}
