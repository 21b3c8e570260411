// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Values on both sides of the boundary.
//!
//! [`HostValue`] is what capability objects consume and produce.
//! [`ScriptValue`] is the boundary-safe representation handed to the native
//! engine: host objects appear only as handles and faults appear only as
//! script error values.

use crate::error::{FaultKind, HostFault};
use crate::handle::HostHandle;
use crate::object::{HostObject, ObjectRef, same_object};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A value on the host side of the bridge.
#[derive(Clone, Default)]
pub enum HostValue {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Ordered list of values
    Array(Vec<HostValue>),
    /// String-keyed record
    Map(BTreeMap<String, HostValue>),
    /// Host object reference
    Object(ObjectRef),
    /// Host fault travelling as a value
    Error(HostFault),
}

impl HostValue {
    /// Wrap a host object.
    pub fn object(object: impl HostObject) -> Self {
        HostValue::Object(Arc::new(object))
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric payload, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the host object, if any.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            HostValue::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Whether this value is a host object that can be called.
    pub fn is_invocable(&self) -> bool {
        self.as_object()
            .and_then(|object| object.as_dynamic())
            .is_some_and(|dynamic| dynamic.invocability().is_invocable())
    }

    /// Convert a JSON document into a host value.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Boolean(*b),
            serde_json::Value::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => HostValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                HostValue::Array(items.iter().map(HostValue::from_json).collect())
            }
            serde_json::Value::Object(map) => HostValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), HostValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Boolean(a), HostValue::Boolean(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => a == b,
            (HostValue::Map(a), HostValue::Map(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => same_object(a, b),
            (HostValue::Error(a), HostValue::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "Undefined"),
            HostValue::Null => write!(f, "Null"),
            HostValue::Boolean(b) => write!(f, "Boolean({})", b),
            HostValue::Number(n) => write!(f, "Number({})", n),
            HostValue::String(s) => write!(f, "String({:?})", s),
            HostValue::Array(items) => f.debug_tuple("Array").field(items).finish(),
            HostValue::Map(map) => f.debug_tuple("Map").field(map).finish(),
            HostValue::Object(object) => write!(f, "Object({})", object.type_name()),
            HostValue::Error(fault) => f.debug_tuple("Error").field(fault).finish(),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Null => write!(f, "null"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Number(n) => write!(f, "{}", n),
            HostValue::String(s) => write!(f, "{}", s),
            HostValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            HostValue::Map(_) => write!(f, "[object Object]"),
            HostValue::Object(object) => write!(f, "[host {}]", object.type_name()),
            HostValue::Error(fault) => write!(f, "{}", fault),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        HostValue::Number(n as f64)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<ObjectRef> for HostValue {
    fn from(object: ObjectRef) -> Self {
        HostValue::Object(object)
    }
}

impl From<HostFault> for HostValue {
    fn from(fault: HostFault) -> Self {
        HostValue::Error(fault)
    }
}

/// A script-visible error value.
///
/// Keeps the originating fault kind so a fault that travels out to script
/// and is thrown back comes home unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    /// Error constructor name (`TypeError`, `RangeError`, `Error`)
    pub name: String,
    /// Error message
    pub message: String,
    /// Kind of the host fault this error was created from
    pub kind: FaultKind,
}

impl ScriptError {
    /// Build the script representation of a host fault.
    pub fn from_fault(fault: &HostFault) -> Self {
        Self {
            name: fault.kind.script_name().to_string(),
            message: fault.message.clone(),
            kind: fault.kind,
        }
    }

    /// Recover the host fault this error represents.
    pub fn to_fault(&self) -> HostFault {
        HostFault::new(self.kind, self.message.clone())
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// A value in boundary-safe form, as handed to the native engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScriptValue {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Array of values
    Array(Vec<ScriptValue>),
    /// Plain script object
    Object(BTreeMap<String, ScriptValue>),
    /// Host object, owned by the native side through this handle
    HostObject(HostHandle),
    /// Error value
    Error(ScriptError),
}

impl ScriptValue {
    /// Returns true if this value is an error value.
    pub fn is_error(&self) -> bool {
        matches!(self, ScriptValue::Error(_))
    }

    /// Returns the error payload, if any.
    pub fn as_error(&self) -> Option<&ScriptError> {
        match self {
            ScriptValue::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Every host handle contained in this value, depth first.
    pub fn handles(&self) -> Vec<HostHandle> {
        let mut out = Vec::new();
        self.collect_handles(&mut out);
        out
    }

    fn collect_handles(&self, out: &mut Vec<HostHandle>) {
        match self {
            ScriptValue::HostObject(handle) => out.push(*handle),
            ScriptValue::Array(items) => items.iter().for_each(|v| v.collect_handles(out)),
            ScriptValue::Object(map) => map.values().for_each(|v| v.collect_handles(out)),
            _ => {}
        }
    }

    /// JSON rendering for diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        match self {
            ScriptValue::Undefined | ScriptValue::Null => serde_json::Value::Null,
            ScriptValue::Boolean(b) => json!(b),
            ScriptValue::Number(n) => json!(n),
            ScriptValue::String(s) => json!(s),
            ScriptValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(ScriptValue::to_json).collect())
            }
            ScriptValue::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            ScriptValue::HostObject(handle) => json!({ "hostHandle": handle.to_raw() }),
            ScriptValue::Error(error) => json!({
                "name": error.name,
                "message": error.message,
            }),
        }
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Undefined => write!(f, "undefined"),
            ScriptValue::Null => write!(f, "null"),
            ScriptValue::Boolean(b) => write!(f, "{}", b),
            ScriptValue::Number(n) => write!(f, "{}", n),
            ScriptValue::String(s) => write!(f, "{}", s),
            ScriptValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            ScriptValue::Object(_) => write!(f, "[object Object]"),
            ScriptValue::HostObject(handle) => write!(f, "[host object {:#x}]", handle.to_raw()),
            ScriptValue::Error(error) => write!(f, "{}", error),
        }
    }
}
