// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tether-bridge
//!
//! The host side of a native script engine embedding.
//!
//! Native code cannot hold host objects directly, call them through their
//! Rust types, or let a Rust panic unwind through its frames. This crate
//! sits between the two:
//!
//! - **Handles** ([`HandleTable`]): reference-counted opaque integers that
//!   keep host objects alive while native code holds them
//! - **Capabilities** ([`DynamicObject`]): the uniform property, index and
//!   invocation interface a host object implements to be scriptable
//! - **Dispatch** ([`HostBridge`]): the entry points native callbacks call,
//!   each of which converts faults and panics into script error values
//! - **Exceptions** ([`exception`]): fault marshaling in both directions
//! - **Modules** ([`ModuleResolver`]): document loading for the native
//!   module pipeline, using the engine bound to the calling thread
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_bridge::{HandleTable, HostBridge, NativeString, PropertyBag};
//!
//! let bridge = HostBridge::new(Arc::new(HandleTable::new()));
//! let handle = bridge.acquire_handle(Arc::new(PropertyBag::new()));
//!
//! let name = NativeString::from("answer");
//! bridge.set_property(handle, name.as_native(), 42.into())?;
//! assert_eq!(bridge.get_property(handle, name.as_native())?, 42.into());
//!
//! bridge.release_handle(handle)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod bridge;
pub mod capability;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod exception;
pub mod handle;
pub mod module;
pub mod object;
pub mod object_cache;
pub mod value;

// Re-exports
pub use boundary::{BoundaryResult, NativeStr, NativeString};
pub use bridge::HostBridge;
pub use capability::{
    DynamicObject, HostArray, HostEnumerator, HostFunction, Invocability, PropertyBag,
    PropertyLookup,
};
pub use config::BridgeConfig;
pub use document::{
    Document, DocumentCategory, DocumentInfo, DocumentLoader, DocumentSettings,
    FileDocumentLoader, MemoryDocumentLoader, UniqueDocumentInfo,
};
pub use engine::{EngineScope, HostEngine, ScriptEngine, current_engine, with_engine};
pub use error::{BridgeError, FaultKind, HostFault, Result};
pub use exception::ScriptItem;
pub use handle::{HandleTable, HostHandle, ScopedHandle};
pub use module::{LoadedModule, ModuleContext, ModuleResolver};
pub use object::{HostObject, ObjectRef};
pub use object_cache::{NativeObjectId, ObjectCache};
pub use value::{HostValue, ScriptError, ScriptValue};

/// Version of the bridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
