// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host objects as seen by the bridge.
//!
//! Every value that crosses to the native side by handle is an
//! [`ObjectRef`]. The bridge never depends on concrete object types: it asks
//! an object whether it implements the capability interface
//! ([`HostObject::as_dynamic`]) and which engine owns it
//! ([`HostObject::engine`]). Bridge-internal objects (document identities,
//! script wrappers, object caches) are recovered by downcasting.

use crate::capability::DynamicObject;
use crate::engine::HostEngine;
use std::any::Any;
use std::sync::Arc;

/// Shared reference to a host object.
pub type ObjectRef = Arc<dyn HostObject>;

/// Upcast to [`Any`] for concrete downcasts through `dyn HostObject`.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An object defined by the embedding application.
pub trait HostObject: AsAny + Send + Sync {
    /// Diagnostic type name.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The capability interface, if this object is script-addressable.
    fn as_dynamic(&self) -> Option<&dyn DynamicObject> {
        None
    }

    /// The script engine that owns this object, if any.
    fn engine(&self) -> Option<Arc<dyn HostEngine>> {
        None
    }
}

impl dyn HostObject {
    /// Downcast to a concrete host object type.
    pub fn downcast_ref<T: HostObject>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    /// Whether this object is of the concrete type `T`.
    pub fn is<T: HostObject>(&self) -> bool {
        AsAny::as_any(self).is::<T>()
    }
}

/// Identity of a host object: the address of its shared allocation.
///
/// Stable for as long as any strong or weak reference to the allocation is
/// alive.
pub fn object_identity(object: &ObjectRef) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

/// Whether two references point at the same host object.
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
