// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script engines as seen from the bridge
//!
//! The bridge needs three things from an engine: value marshaling in both
//! directions, its document-loading policy, and a way to give back values
//! the native side never took ownership of. [`HostEngine`] is that
//! contract; [`ScriptEngine`] is the implementation used by embedders that
//! have no engine-specific marshaling needs.

pub mod context;

pub use context::{EngineScope, active_depth, current_engine, with_engine};

use crate::config::BridgeConfig;
use crate::document::DocumentSettings;
use crate::error::{HostFault, Result};
use crate::handle::HandleTable;
use crate::value::{HostValue, ScriptError, ScriptValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default limit on nesting while marshaling values to script
pub const DEFAULT_MAX_MARSHAL_DEPTH: usize = 64;

/// Process-unique engine identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(u64);

impl EngineId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric form
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Engine-side collaborator of the bridge.
pub trait HostEngine: Send + Sync {
    /// Engine id
    fn id(&self) -> EngineId;

    /// Human-readable engine name
    fn name(&self) -> &str;

    /// Convert a host value into its script representation.
    ///
    /// Host objects become handles owned by the caller.
    fn marshal_to_script(&self, value: HostValue) -> std::result::Result<ScriptValue, HostFault>;

    /// Convert a script value into its host representation.
    fn marshal_to_host(&self, value: &ScriptValue) -> HostValue;

    /// Release whatever `marshal_to_script` acquired for a value that was
    /// never handed to native code.
    fn discard(&self, value: ScriptValue);

    /// Document-loading policy
    fn document_settings(&self) -> &DocumentSettings;
}

/// Reference engine: marshals host objects to handles in a shared table.
pub struct ScriptEngine {
    id: EngineId,
    name: String,
    handles: Arc<HandleTable>,
    settings: DocumentSettings,
    max_marshal_depth: usize,
}

impl ScriptEngine {
    /// Create an engine with default document settings
    pub fn new(name: impl Into<String>, handles: Arc<HandleTable>) -> Self {
        Self {
            id: EngineId::next(),
            name: name.into(),
            handles,
            settings: DocumentSettings::default(),
            max_marshal_depth: DEFAULT_MAX_MARSHAL_DEPTH,
        }
    }

    /// Create an engine from configuration
    pub fn from_config(
        name: impl Into<String>,
        handles: Arc<HandleTable>,
        config: &BridgeConfig,
    ) -> Result<Self> {
        Ok(Self::new(name, handles)
            .with_settings(DocumentSettings::from_config(&config.modules)?)
            .with_max_marshal_depth(config.marshal.max_depth))
    }

    /// Replace the document settings
    pub fn with_settings(mut self, settings: DocumentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Limit value nesting during marshaling
    pub fn with_max_marshal_depth(mut self, depth: usize) -> Self {
        self.max_marshal_depth = depth;
        self
    }

    /// The handle table host objects are marshaled into
    pub fn handles(&self) -> &Arc<HandleTable> {
        &self.handles
    }

    fn to_script(
        &self,
        value: HostValue,
        depth: usize,
    ) -> std::result::Result<ScriptValue, HostFault> {
        if depth > self.max_marshal_depth {
            return Err(HostFault::range_error(format!(
                "Maximum marshaling depth ({}) exceeded",
                self.max_marshal_depth
            )));
        }

        Ok(match value {
            HostValue::Undefined => ScriptValue::Undefined,
            HostValue::Null => ScriptValue::Null,
            HostValue::Boolean(b) => ScriptValue::Boolean(b),
            HostValue::Number(n) => ScriptValue::Number(n),
            HostValue::String(s) => ScriptValue::String(s),
            HostValue::Error(fault) => ScriptValue::Error(ScriptError::from_fault(&fault)),
            HostValue::Object(object) => ScriptValue::HostObject(self.handles.acquire(object)),
            HostValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match self.to_script(item, depth + 1) {
                        Ok(v) => out.push(v),
                        Err(fault) => {
                            self.discard(ScriptValue::Array(out));
                            return Err(fault);
                        }
                    }
                }
                ScriptValue::Array(out)
            }
            HostValue::Map(map) => {
                let mut out = BTreeMap::new();
                for (key, item) in map {
                    match self.to_script(item, depth + 1) {
                        Ok(v) => {
                            out.insert(key, v);
                        }
                        Err(fault) => {
                            self.discard(ScriptValue::Object(out));
                            return Err(fault);
                        }
                    }
                }
                ScriptValue::Object(out)
            }
        })
    }
}

impl fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("max_marshal_depth", &self.max_marshal_depth)
            .finish()
    }
}

impl HostEngine for ScriptEngine {
    fn id(&self) -> EngineId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn marshal_to_script(&self, value: HostValue) -> std::result::Result<ScriptValue, HostFault> {
        self.to_script(value, 0)
    }

    fn marshal_to_host(&self, value: &ScriptValue) -> HostValue {
        match value {
            ScriptValue::Undefined => HostValue::Undefined,
            ScriptValue::Null => HostValue::Null,
            ScriptValue::Boolean(b) => HostValue::Boolean(*b),
            ScriptValue::Number(n) => HostValue::Number(*n),
            ScriptValue::String(s) => HostValue::String(s.clone()),
            ScriptValue::Error(error) => HostValue::Error(error.to_fault()),
            ScriptValue::Array(items) => {
                HostValue::Array(items.iter().map(|v| self.marshal_to_host(v)).collect())
            }
            ScriptValue::Object(map) => HostValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.marshal_to_host(v)))
                    .collect(),
            ),
            ScriptValue::HostObject(handle) => match self.handles.resolve(*handle) {
                Ok(object) => HostValue::Object(object),
                Err(e) => {
                    tracing::error!(
                        engine = %self.id,
                        error = %e,
                        "script value refers to a released host object"
                    );
                    HostValue::Undefined
                }
            },
        }
    }

    fn discard(&self, value: ScriptValue) {
        for handle in value.handles() {
            if let Err(e) = self.handles.release(handle) {
                tracing::error!(engine = %self.id, error = %e, "failed to discard marshaled value");
            }
        }
    }

    fn document_settings(&self) -> &DocumentSettings {
        &self.settings
    }
}
