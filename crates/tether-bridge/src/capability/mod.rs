// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The dynamic capability interface
//!
//! A host object becomes script-addressable by implementing
//! [`DynamicObject`] and returning itself from
//! [`HostObject::as_dynamic`](crate::object::HostObject::as_dynamic).
//!
//! Adapters shipped with the crate:
//! - [`PropertyBag`] - a string-keyed mapping
//! - [`HostFunction`] - a callable wrapping a Rust closure
//! - [`HostArray`] - an indexed list with an enumerator
//! - [`HostEnumerator`] - the enumerator handed out by `HostArray`

mod array;
mod bag;
mod function;

pub use array::{HostArray, HostEnumerator};
pub use bag::PropertyBag;
pub use function::HostFunction;

use crate::error::HostFault;
use crate::value::HostValue;

/// Reserved property name that yields an enumerator for the object.
pub const ENUMERATOR_PROPERTY: &str = "@@enumerator";

/// Reserved property name that yields an async enumerator for the object.
pub const ASYNC_ENUMERATOR_PROPERTY: &str = "@@asyncEnumerator";

/// How the native side may call an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Invocability {
    /// Not callable
    #[default]
    None = 0,
    /// Callable as a plain function
    Delegate = 1,
    /// Exposes callable members
    Method = 2,
    /// Callable as a function or with `new`
    Constructor = 3,
    /// Decides at call time
    Dynamic = 4,
}

impl Invocability {
    /// Whether the native side should expose the object as callable.
    pub fn is_invocable(self) -> bool {
        self != Invocability::None
    }
}

/// Result of a property lookup with a cacheability hint.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyLookup {
    /// The property value
    pub value: HostValue,
    /// Whether the native side may memoize this lookup
    pub cacheable: bool,
}

/// Operations a script-addressable host object supports.
///
/// Every operation may fail with a [`HostFault`]; the dispatch layer turns
/// faults into script errors. Indexed operations default to the named ones
/// using the decimal form of the index.
pub trait DynamicObject: Send + Sync {
    /// Read a named property.
    fn get_property(&self, name: &str) -> Result<HostValue, HostFault>;

    /// Read a named property, reporting whether the result may be cached.
    fn get_property_cacheable(&self, name: &str) -> Result<PropertyLookup, HostFault> {
        Ok(PropertyLookup {
            value: self.get_property(name)?,
            cacheable: false,
        })
    }

    /// Write a named property.
    fn set_property(&self, name: &str, value: HostValue) -> Result<(), HostFault>;

    /// Remove a named property. Returns false if it was absent.
    fn delete_property(&self, name: &str) -> Result<bool, HostFault>;

    /// Enumerable property names, in enumeration order.
    fn property_names(&self) -> Result<Vec<String>, HostFault>;

    /// Read an indexed property.
    fn get_index(&self, index: i32) -> Result<HostValue, HostFault> {
        self.get_property(&index.to_string())
    }

    /// Write an indexed property.
    fn set_index(&self, index: i32, value: HostValue) -> Result<(), HostFault> {
        self.set_property(&index.to_string(), value)
    }

    /// Remove an indexed property.
    fn delete_index(&self, index: i32) -> Result<bool, HostFault> {
        self.delete_property(&index.to_string())
    }

    /// Enumerable indices.
    fn property_indices(&self) -> Result<Vec<i32>, HostFault> {
        Ok(self
            .property_names()?
            .iter()
            .filter_map(|name| parse_index(name))
            .collect())
    }

    /// Call the object itself.
    fn invoke(&self, as_constructor: bool, args: &[HostValue]) -> Result<HostValue, HostFault> {
        let _ = (as_constructor, args);
        Err(HostFault::not_invocable("object"))
    }

    /// Call a named member.
    fn invoke_method(&self, name: &str, args: &[HostValue]) -> Result<HostValue, HostFault> {
        match self.get_property(name)? {
            HostValue::Object(member) => match member.as_dynamic() {
                Some(callable) => callable.invoke(false, args),
                None => Err(HostFault::not_invocable(name)),
            },
            _ => Err(HostFault::not_invocable(name)),
        }
    }

    /// How the object may be called.
    fn invocability(&self) -> Invocability {
        Invocability::None
    }
}

/// Parse a canonical non-negative array index.
pub(crate) fn parse_index(name: &str) -> Option<i32> {
    let index = name.parse::<i32>().ok()?;
    (index >= 0 && index.to_string() == name).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("17"), Some(17));
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("01"), None);
        assert_eq!(parse_index("x"), None);
    }

    #[test]
    fn test_invocability() {
        assert!(!Invocability::None.is_invocable());
        assert!(Invocability::Delegate.is_invocable());
        assert_eq!(Invocability::Constructor as i32, 3);
        assert_eq!(Invocability::default(), Invocability::None);
    }
}
