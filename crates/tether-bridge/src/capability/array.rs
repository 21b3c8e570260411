// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Indexed host objects and their enumerator

use super::{DynamicObject, ENUMERATOR_PROPERTY, Invocability};
use crate::error::HostFault;
use crate::object::HostObject;
use crate::value::HostValue;
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;

/// A growable list addressable by index.
#[derive(Default)]
pub struct HostArray {
    items: RwLock<Vec<HostValue>>,
}

impl HostArray {
    /// Create an empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the array is empty
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Copy of the current elements
    pub fn to_vec(&self) -> Vec<HostValue> {
        self.items.read().clone()
    }
}

impl From<Vec<HostValue>> for HostArray {
    fn from(items: Vec<HostValue>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }
}

fn check_index(index: i32) -> Result<usize, HostFault> {
    usize::try_from(index)
        .map_err(|_| HostFault::range_error(format!("Invalid array index {}", index)))
}

impl HostObject for HostArray {
    fn as_dynamic(&self) -> Option<&dyn DynamicObject> {
        Some(self)
    }
}

impl DynamicObject for HostArray {
    fn get_property(&self, name: &str) -> Result<HostValue, HostFault> {
        match name {
            "length" => Ok(HostValue::Number(self.len() as f64)),
            ENUMERATOR_PROPERTY => Ok(HostValue::object(HostEnumerator::new(self.to_vec()))),
            _ => match super::parse_index(name) {
                Some(index) => self.get_index(index),
                None => Err(HostFault::member_not_found(name)),
            },
        }
    }

    fn set_property(&self, name: &str, value: HostValue) -> Result<(), HostFault> {
        match super::parse_index(name) {
            Some(index) => self.set_index(index, value),
            None => Err(HostFault::invalid_operation(format!(
                "Cannot set property '{}' on a host array",
                name
            ))),
        }
    }

    fn delete_property(&self, name: &str) -> Result<bool, HostFault> {
        match super::parse_index(name) {
            Some(index) => self.delete_index(index),
            None => Ok(false),
        }
    }

    fn property_names(&self) -> Result<Vec<String>, HostFault> {
        Ok(vec!["length".to_string()])
    }

    fn get_index(&self, index: i32) -> Result<HostValue, HostFault> {
        let index = check_index(index)?;
        Ok(self.items.read().get(index).cloned().unwrap_or_default())
    }

    fn set_index(&self, index: i32, value: HostValue) -> Result<(), HostFault> {
        let index = check_index(index)?;
        let mut items = self.items.write();
        match index.cmp(&items.len()) {
            Ordering::Less => items[index] = value,
            Ordering::Equal => items.push(value),
            // A write extends the array by at most one element.
            Ordering::Greater => {
                return Err(HostFault::range_error(format!(
                    "Array index {} is past the end (length {})",
                    index,
                    items.len()
                )));
            }
        }
        Ok(())
    }

    fn delete_index(&self, index: i32) -> Result<bool, HostFault> {
        let index = check_index(index)?;
        match self.items.write().get_mut(index) {
            Some(slot) => {
                *slot = HostValue::Undefined;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn property_indices(&self) -> Result<Vec<i32>, HostFault> {
        let len = i32::try_from(self.len())
            .map_err(|_| HostFault::range_error("Array too large to enumerate"))?;
        Ok((0..len).collect())
    }

    fn invoke_method(&self, name: &str, args: &[HostValue]) -> Result<HostValue, HostFault> {
        match name {
            "push" => {
                let mut items = self.items.write();
                items.extend(args.iter().cloned());
                Ok(HostValue::Number(items.len() as f64))
            }
            _ => Err(HostFault::member_not_found(name)),
        }
    }

    fn invocability(&self) -> Invocability {
        Invocability::Method
    }
}

/// Enumerator over a snapshot of values.
///
/// Script drives it with `moveNext()` and reads `current`.
pub struct HostEnumerator {
    items: Vec<HostValue>,
    position: Mutex<Option<usize>>,
}

impl HostEnumerator {
    /// Enumerate `items`
    pub fn new(items: Vec<HostValue>) -> Self {
        Self {
            items,
            position: Mutex::new(None),
        }
    }

    fn current(&self) -> HostValue {
        (*self.position.lock())
            .and_then(|i| self.items.get(i).cloned())
            .unwrap_or_default()
    }

    fn move_next(&self) -> bool {
        let mut position = self.position.lock();
        let next = position.map_or(0, |i| i.saturating_add(1).min(self.items.len()));
        *position = Some(next);
        next < self.items.len()
    }
}

impl HostObject for HostEnumerator {
    fn as_dynamic(&self) -> Option<&dyn DynamicObject> {
        Some(self)
    }
}

impl DynamicObject for HostEnumerator {
    fn get_property(&self, name: &str) -> Result<HostValue, HostFault> {
        match name {
            "current" => Ok(self.current()),
            _ => Err(HostFault::member_not_found(name)),
        }
    }

    fn set_property(&self, name: &str, _value: HostValue) -> Result<(), HostFault> {
        Err(HostFault::invalid_operation(format!(
            "Cannot set property '{}' on an enumerator",
            name
        )))
    }

    fn delete_property(&self, _name: &str) -> Result<bool, HostFault> {
        Ok(false)
    }

    fn property_names(&self) -> Result<Vec<String>, HostFault> {
        Ok(vec!["current".to_string()])
    }

    fn invoke_method(&self, name: &str, _args: &[HostValue]) -> Result<HostValue, HostFault> {
        match name {
            "moveNext" => Ok(HostValue::Boolean(self.move_next())),
            _ => Err(HostFault::member_not_found(name)),
        }
    }

    fn invocability(&self) -> Invocability {
        Invocability::Method
    }
}
