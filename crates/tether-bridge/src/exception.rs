// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Exception marshaling in both directions
//!
//! Outward, a [`HostFault`] becomes a script error value through the engine
//! that owns the faulting object. Inward, a value thrown by script arrives
//! wrapped in a [`ScriptItem`] and becomes a [`HostFault`] again.

use crate::engine::{self, HostEngine};
use crate::error::{FaultKind, HostFault};
use crate::object::{HostObject, ObjectRef};
use crate::value::{HostValue, ScriptError, ScriptValue};
use std::fmt;
use std::sync::Arc;

/// A script value held by the host, tagged with its owning engine.
///
/// The item owns any handles inside its value and releases them on drop.
pub struct ScriptItem {
    engine: Arc<dyn HostEngine>,
    value: ScriptValue,
}

impl ScriptItem {
    /// Wrap `value`, owned by `engine`
    pub fn new(engine: Arc<dyn HostEngine>, value: ScriptValue) -> Self {
        Self { engine, value }
    }

    /// The wrapped value
    pub fn value(&self) -> &ScriptValue {
        &self.value
    }

    /// Host representation of the wrapped value as a thrown fault.
    ///
    /// Error values come back as the fault they were created from; anything
    /// else thrown by script becomes a [`FaultKind::ScriptException`].
    pub fn to_host_fault(&self) -> HostFault {
        match self.engine.marshal_to_host(&self.value) {
            HostValue::Error(fault) => fault,
            other => HostFault::new(
                FaultKind::ScriptException,
                format!("Uncaught {}", other),
            ),
        }
    }
}

impl Drop for ScriptItem {
    fn drop(&mut self) {
        let value = std::mem::take(&mut self.value);
        if !value.handles().is_empty() {
            self.engine.discard(value);
        }
    }
}

impl fmt::Debug for ScriptItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptItem")
            .field("engine", &self.engine.id())
            .field("value", &self.value)
            .finish()
    }
}

impl HostObject for ScriptItem {
    fn engine(&self) -> Option<Arc<dyn HostEngine>> {
        Some(Arc::clone(&self.engine))
    }
}

/// Marshal a host fault into a script error value.
///
/// Uses the engine owning `source`, then the ambient engine, then a plain
/// conversion.
pub fn marshal_exception_to_script(source: Option<&ObjectRef>, fault: HostFault) -> ScriptValue {
    let engine = source
        .and_then(|object| object.engine())
        .or_else(|| engine::current_engine().ok());

    match engine {
        Some(engine) => engine
            .marshal_to_script(HostValue::Error(fault.clone()))
            .unwrap_or_else(|marshal_fault| {
                tracing::warn!(
                    engine = %engine.id(),
                    error = %marshal_fault,
                    "engine failed to marshal exception"
                );
                ScriptValue::Error(ScriptError::from_fault(&fault))
            }),
        None => ScriptValue::Error(ScriptError::from_fault(&fault)),
    }
}

/// Recover the host fault for a value thrown by script.
///
/// Returns `None` when there is no item or it is not a [`ScriptItem`].
pub fn marshal_exception_to_host(item: Option<&ObjectRef>) -> Option<HostFault> {
    item?.downcast_ref::<ScriptItem>().map(ScriptItem::to_host_fault)
}
