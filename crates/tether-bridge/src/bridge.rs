// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Entry points called from native callback frames
//!
//! Each entry point resolves its handle, converts its string arguments
//! once, forwards to exactly one capability method and returns the result.
//! Nothing unwinds out of an entry point: faults, contract violations and
//! panics all come back as script error values.

use crate::boundary::{self, BoundaryResult, NativeStr};
use crate::capability::{
    ASYNC_ENUMERATOR_PROPERTY, DynamicObject, ENUMERATOR_PROPERTY, Invocability, PropertyLookup,
};
use crate::error::{BridgeError, HostFault};
use crate::exception;
use crate::handle::{HandleTable, HostHandle};
use crate::module::{LoadedModule, ModuleContext, ModuleResolver};
use crate::object::ObjectRef;
use crate::object_cache::{NativeObjectId, ObjectCache};
use crate::value::{HostValue, ScriptValue};
use std::sync::Arc;

/// The host side of the native bridge.
#[derive(Debug, Clone)]
pub struct HostBridge {
    handles: Arc<HandleTable>,
    modules: ModuleResolver,
}

impl HostBridge {
    /// Create a bridge over `handles`
    pub fn new(handles: Arc<HandleTable>) -> Self {
        Self {
            modules: ModuleResolver::new(Arc::clone(&handles)),
            handles,
        }
    }

    /// The handle table
    pub fn handles(&self) -> &Arc<HandleTable> {
        &self.handles
    }

    /// The module resolver
    pub fn modules(&self) -> &ModuleResolver {
        &self.modules
    }

    fn resolve(&self, entry: &'static str, handle: HostHandle) -> BoundaryResult<ObjectRef> {
        self.handles
            .resolve(handle)
            .map_err(|e| boundary::bridge_failure(entry, e))
    }

    /// Resolve `handle` and run `op` against its capability interface.
    fn dispatch<T>(
        &self,
        entry: &'static str,
        handle: HostHandle,
        op: impl FnOnce(&dyn DynamicObject) -> Result<T, HostFault>,
    ) -> BoundaryResult<T> {
        boundary::guard(entry, || {
            let object = self.resolve(entry, handle)?;
            let Some(dynamic) = object.as_dynamic() else {
                let fault = HostFault::invalid_operation(format!(
                    "{} does not support dynamic access",
                    object.type_name()
                ));
                return Err(exception::marshal_exception_to_script(Some(&object), fault));
            };
            op(dynamic)
                .map_err(|fault| exception::marshal_exception_to_script(Some(&object), fault))
        })
    }

    fn object_cache<T>(
        &self,
        entry: &'static str,
        handle: HostHandle,
        op: impl FnOnce(&ObjectCache) -> BoundaryResult<T>,
    ) -> BoundaryResult<T> {
        boundary::guard(entry, || {
            let object = self.resolve(entry, handle)?;
            let cache = object.downcast_ref::<ObjectCache>().ok_or_else(|| {
                boundary::bridge_failure(
                    entry,
                    BridgeError::WrongHandleKind {
                        handle: handle.to_raw(),
                        expected: "object cache",
                    },
                )
            })?;
            op(cache)
        })
    }

    // Handles

    /// Issue a handle for `object`. Owned by the caller.
    pub fn acquire_handle(&self, object: ObjectRef) -> HostHandle {
        self.handles.acquire(object)
    }

    /// Give back a handle issued by this bridge.
    pub fn release_handle(&self, handle: HostHandle) -> BoundaryResult<()> {
        boundary::guard("release_handle", || {
            self.handles
                .release(handle)
                .map_err(|e| boundary::bridge_failure("release_handle", e))
        })
    }

    // Named properties

    /// Read a named property
    pub fn get_property(
        &self,
        handle: HostHandle,
        name: NativeStr<'_>,
    ) -> BoundaryResult<HostValue> {
        let name = name.to_host_string();
        self.dispatch("get_property", handle, |obj| obj.get_property(&name))
    }

    /// Read a named property with its cacheability
    pub fn get_property_cacheable(
        &self,
        handle: HostHandle,
        name: NativeStr<'_>,
    ) -> BoundaryResult<PropertyLookup> {
        let name = name.to_host_string();
        self.dispatch("get_property_cacheable", handle, |obj| {
            obj.get_property_cacheable(&name)
        })
    }

    /// Write a named property
    pub fn set_property(
        &self,
        handle: HostHandle,
        name: NativeStr<'_>,
        value: HostValue,
    ) -> BoundaryResult<()> {
        let name = name.to_host_string();
        self.dispatch("set_property", handle, |obj| obj.set_property(&name, value))
    }

    /// Remove a named property
    pub fn delete_property(&self, handle: HostHandle, name: NativeStr<'_>) -> BoundaryResult<bool> {
        let name = name.to_host_string();
        self.dispatch("delete_property", handle, |obj| obj.delete_property(&name))
    }

    /// Enumerable property names
    pub fn get_property_names(&self, handle: HostHandle) -> BoundaryResult<Vec<String>> {
        self.dispatch("get_property_names", handle, |obj| obj.property_names())
    }

    // Indexed properties

    /// Read an indexed property
    pub fn get_indexed(&self, handle: HostHandle, index: i32) -> BoundaryResult<HostValue> {
        self.dispatch("get_indexed", handle, |obj| obj.get_index(index))
    }

    /// Write an indexed property
    pub fn set_indexed(
        &self,
        handle: HostHandle,
        index: i32,
        value: HostValue,
    ) -> BoundaryResult<()> {
        self.dispatch("set_indexed", handle, |obj| obj.set_index(index, value))
    }

    /// Remove an indexed property
    pub fn delete_indexed(&self, handle: HostHandle, index: i32) -> BoundaryResult<bool> {
        self.dispatch("delete_indexed", handle, |obj| obj.delete_index(index))
    }

    /// Enumerable indices
    pub fn get_indices(&self, handle: HostHandle) -> BoundaryResult<Vec<i32>> {
        self.dispatch("get_indices", handle, |obj| obj.property_indices())
    }

    // Invocation

    /// Call the object itself
    pub fn invoke(
        &self,
        handle: HostHandle,
        as_constructor: bool,
        args: &[HostValue],
    ) -> BoundaryResult<HostValue> {
        self.dispatch("invoke", handle, |obj| obj.invoke(as_constructor, args))
    }

    /// Call a named member
    pub fn invoke_method(
        &self,
        handle: HostHandle,
        name: NativeStr<'_>,
        args: &[HostValue],
    ) -> BoundaryResult<HostValue> {
        let name = name.to_host_string();
        self.dispatch("invoke_method", handle, |obj| obj.invoke_method(&name, args))
    }

    /// How the object may be called. `None` for objects without the
    /// capability interface.
    pub fn get_invocability(&self, handle: HostHandle) -> BoundaryResult<Invocability> {
        boundary::guard("get_invocability", || {
            let object = self.resolve("get_invocability", handle)?;
            Ok(object
                .as_dynamic()
                .map_or(Invocability::None, |obj| obj.invocability()))
        })
    }

    // Enumeration

    /// The object's enumerator
    pub fn get_enumerator(&self, handle: HostHandle) -> BoundaryResult<HostValue> {
        self.dispatch("get_enumerator", handle, |obj| obj.get_property(ENUMERATOR_PROPERTY))
    }

    /// The object's async enumerator
    pub fn get_async_enumerator(&self, handle: HostHandle) -> BoundaryResult<HostValue> {
        self.dispatch("get_async_enumerator", handle, |obj| {
            obj.get_property(ASYNC_ENUMERATOR_PROPERTY)
        })
    }

    // Exceptions

    /// Marshal `fault`, raised by the object behind `source`, to script.
    pub fn marshal_exception_to_script(
        &self,
        source: Option<HostHandle>,
        fault: HostFault,
    ) -> ScriptValue {
        let fallback = fault.clone();
        boundary::guard("marshal_exception_to_script", || {
            let source = match source.map(|h| self.handles.resolve(h)).transpose() {
                Ok(source) => source,
                Err(e) => {
                    tracing::error!(error = %e, "exception source handle is invalid");
                    None
                }
            };
            Ok(exception::marshal_exception_to_script(source.as_ref(), fault))
        })
        .unwrap_or_else(|_| exception::marshal_exception_to_script(None, fallback))
    }

    /// The host fault for the script item behind `item`, if any.
    pub fn marshal_exception_to_host(&self, item: Option<HostHandle>) -> Option<HostFault> {
        boundary::guard("marshal_exception_to_host", || {
            let item = match item.map(|h| self.handles.resolve(h)).transpose() {
                Ok(item) => item,
                Err(e) => {
                    tracing::error!(error = %e, "exception item handle is invalid");
                    None
                }
            };
            Ok(exception::marshal_exception_to_host(item.as_ref()))
        })
        .unwrap_or_else(|value| value.as_error().map(|error| error.to_fault()))
    }

    // Modules

    /// Load `specifier` relative to the document behind `referrer`
    pub fn load_module(
        &self,
        referrer: HostHandle,
        specifier: NativeStr<'_>,
    ) -> BoundaryResult<LoadedModule> {
        let specifier = specifier.to_host_string();
        boundary::guard("load_module", || {
            self.modules
                .load_module(referrer, &specifier)
                .map_err(|e| boundary::bridge_failure("load_module", e))
        })
    }

    /// Build the context mapping for the document behind `document`
    pub fn create_module_context(
        &self,
        document: HostHandle,
    ) -> BoundaryResult<Option<ModuleContext>> {
        boundary::guard("create_module_context", || {
            self.modules
                .create_module_context(document)
                .map_err(|e| boundary::bridge_failure("create_module_context", e))
        })
    }

    // Native object caches

    /// Create an object cache. The returned handle is owned by the caller.
    pub fn create_object_cache(&self) -> HostHandle {
        self.handles.acquire(Arc::new(ObjectCache::new()))
    }

    /// Record the native proxy for the object behind `object`
    pub fn cache_object(
        &self,
        cache: HostHandle,
        object: HostHandle,
        id: NativeObjectId,
    ) -> BoundaryResult<()> {
        self.object_cache("cache_object", cache, |cache| {
            let object = self.resolve("cache_object", object)?;
            cache.insert(&object, id);
            Ok(())
        })
    }

    /// The native proxy recorded for the object behind `object`
    pub fn get_cached_object(
        &self,
        cache: HostHandle,
        object: HostHandle,
    ) -> BoundaryResult<Option<NativeObjectId>> {
        self.object_cache("get_cached_object", cache, |cache| {
            let object = self.resolve("get_cached_object", object)?;
            Ok(cache.get(&object))
        })
    }

    /// Every live native proxy in the cache
    pub fn get_all_cached_objects(&self, cache: HostHandle) -> BoundaryResult<Vec<NativeObjectId>> {
        self.object_cache("get_all_cached_objects", cache, |cache| Ok(cache.all()))
    }

    /// Forget the native proxy for the object behind `object`
    pub fn remove_cached_object(
        &self,
        cache: HostHandle,
        object: HostHandle,
    ) -> BoundaryResult<bool> {
        self.object_cache("remove_cached_object", cache, |cache| {
            let object = self.resolve("remove_cached_object", object)?;
            Ok(cache.remove(&object))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::NativeString;
    use crate::capability::{HostArray, HostFunction, PropertyBag};
    use crate::error::FaultKind;

    fn bridge() -> HostBridge {
        HostBridge::new(Arc::new(HandleTable::new()))
    }

    fn name(s: &str) -> NativeString {
        NativeString::from(s)
    }

    struct Opaque;
    impl crate::object::HostObject for Opaque {}

    #[test]
    fn test_property_round_trip() {
        let bridge = bridge();
        let h = bridge.acquire_handle(Arc::new(PropertyBag::new()));
        let x = name("x");

        bridge.set_property(h, x.as_native(), HostValue::from(1)).unwrap();
        assert_eq!(bridge.get_property(h, x.as_native()).unwrap(), HostValue::Number(1.0));
        assert_eq!(bridge.get_property_names(h).unwrap(), vec!["x".to_string()]);
        assert!(bridge.delete_property(h, x.as_native()).unwrap());
        assert!(!bridge.delete_property(h, x.as_native()).unwrap());
    }

    #[test]
    fn test_capability_fault_becomes_script_error() {
        let bridge = bridge();
        let h = bridge.acquire_handle(Arc::new(PropertyBag::new()));
        let err = bridge.get_property(h, name("nope").as_native()).unwrap_err();
        assert_eq!(err.as_error().unwrap().kind, FaultKind::MemberNotFound);
    }

    #[test]
    fn test_released_handle_is_reported() {
        let bridge = bridge();
        let h = bridge.acquire_handle(Arc::new(PropertyBag::new()));
        bridge.release_handle(h).unwrap();

        let err = bridge.get_property_names(h).unwrap_err();
        assert!(err.as_error().unwrap().message.contains("Invalid host handle"));
        assert!(bridge.release_handle(h).is_err());
    }

    #[test]
    fn test_indexed() {
        let bridge = bridge();
        let h = bridge.acquire_handle(Arc::new(HostArray::from(vec![HostValue::from(1)])));
        bridge.set_indexed(h, 1, HostValue::from(2)).unwrap();
        assert_eq!(bridge.get_indexed(h, 1).unwrap(), HostValue::Number(2.0));
        assert_eq!(bridge.get_indices(h).unwrap(), vec![0, 1]);
        assert!(bridge.delete_indexed(h, 0).unwrap());
        let err = bridge.get_indexed(h, -1).unwrap_err();
        assert_eq!(err.as_error().unwrap().name, "RangeError");
    }

    #[test]
    fn test_indexed_write_far_past_end() {
        let bridge = bridge();
        let h = bridge.acquire_handle(Arc::new(HostArray::new()));

        let err = bridge.set_indexed(h, i32::MAX - 1, HostValue::from(1)).unwrap_err();
        assert_eq!(err.as_error().unwrap().name, "RangeError");
        let err = bridge
            .set_property(h, name("2147483646").as_native(), HostValue::from(1))
            .unwrap_err();
        assert_eq!(err.as_error().unwrap().name, "RangeError");
        assert_eq!(bridge.get_indices(h).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn test_property_cacheable() {
        let bridge = bridge();
        let frozen = bridge.acquire_handle(Arc::new(PropertyBag::frozen([(
            "pi".to_string(),
            HostValue::from(3.5),
        )])));
        let lookup = bridge.get_property_cacheable(frozen, name("pi").as_native()).unwrap();
        assert_eq!(lookup.value, HostValue::Number(3.5));
        assert!(lookup.cacheable);

        let open = bridge.acquire_handle(Arc::new(PropertyBag::new()));
        bridge.set_property(open, name("pi").as_native(), HostValue::from(3.5)).unwrap();
        let lookup = bridge.get_property_cacheable(open, name("pi").as_native()).unwrap();
        assert!(!lookup.cacheable);

        let err = bridge.get_property_cacheable(frozen, name("tau").as_native()).unwrap_err();
        assert_eq!(err.as_error().unwrap().kind, FaultKind::MemberNotFound);
    }

    #[test]
    fn test_invocation() {
        let bridge = bridge();
        let f = bridge.acquire_handle(Arc::new(HostFunction::new("id", |args| {
            Ok(args.first().cloned().unwrap_or_default())
        })));
        assert_eq!(
            bridge.invoke(f, false, &[HostValue::from("a")]).unwrap(),
            HostValue::from("a")
        );
        assert_eq!(bridge.get_invocability(f).unwrap(), Invocability::Delegate);

        let arr = bridge.acquire_handle(Arc::new(HostArray::new()));
        assert_eq!(
            bridge
                .invoke_method(arr, name("push").as_native(), &[HostValue::Null])
                .unwrap(),
            HostValue::Number(1.0)
        );
    }

    #[test]
    fn test_non_capability_object() {
        let bridge = bridge();
        let h = bridge.acquire_handle(Arc::new(Opaque));
        assert_eq!(bridge.get_invocability(h).unwrap(), Invocability::None);
        let err = bridge.get_property(h, name("x").as_native()).unwrap_err();
        assert_eq!(err.as_error().unwrap().kind, FaultKind::InvalidOperation);
    }

    #[test]
    fn test_panic_is_contained() {
        let bridge = bridge();
        let h = bridge.acquire_handle(Arc::new(HostFunction::new("bad", |_| panic!("host bug"))));
        let err = bridge.invoke(h, false, &[]).unwrap_err();
        assert_eq!(err.as_error().unwrap().kind, FaultKind::Internal);
        // bridge still usable afterwards
        assert_eq!(bridge.get_invocability(h).unwrap(), Invocability::Delegate);
    }

    #[test]
    fn test_enumerators() {
        let bridge = bridge();
        let h = bridge.acquire_handle(Arc::new(HostArray::from(vec![HostValue::from(1)])));
        assert!(bridge.get_enumerator(h).unwrap().as_object().is_some());
        let err = bridge.get_async_enumerator(h).unwrap_err();
        assert_eq!(err.as_error().unwrap().kind, FaultKind::MemberNotFound);
    }

    #[test]
    fn test_object_cache() {
        let bridge = bridge();
        let cache = bridge.create_object_cache();
        let a = bridge.acquire_handle(Arc::new(PropertyBag::new()));
        let id = NativeObjectId::from_raw(42);

        bridge.cache_object(cache, a, id).unwrap();
        assert_eq!(bridge.get_cached_object(cache, a).unwrap(), Some(id));
        assert_eq!(bridge.get_all_cached_objects(cache).unwrap(), vec![id]);
        assert!(bridge.remove_cached_object(cache, a).unwrap());
        assert_eq!(bridge.get_cached_object(cache, a).unwrap(), None);

        let err = bridge.get_all_cached_objects(a).unwrap_err();
        assert!(err.as_error().unwrap().message.contains("object cache"));
    }

    #[test]
    fn test_invalid_exception_handles() {
        let bridge = bridge();
        let h = bridge.acquire_handle(Arc::new(PropertyBag::new()));
        bridge.release_handle(h).unwrap();

        let value = bridge.marshal_exception_to_script(Some(h), HostFault::type_error("t"));
        assert_eq!(value.as_error().unwrap().name, "TypeError");
        assert_eq!(bridge.marshal_exception_to_host(Some(h)), None);
        assert_eq!(bridge.marshal_exception_to_host(None), None);
    }
}
