// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module resolution for the native module pipeline
//!
//! The pipeline calls back into the host with a handle to the referencing
//! document and a specifier. The resolver finds the engine servicing the
//! current thread, loads the document through that engine's settings and
//! hands back the source together with a handle to a fresh document
//! identity.

use crate::document::{ContextSnapshot, DocumentCategory, DocumentInfo, UniqueDocumentInfo};
use crate::engine::{self, HostEngine};
use crate::error::{BridgeError, Result};
use crate::handle::{HandleTable, HostHandle};
use crate::value::ScriptValue;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Identifiers exposed to a module, in script form. Owned by the caller.
pub type ModuleContext = BTreeMap<String, ScriptValue>;

/// A successfully loaded module
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModule {
    /// Handle to the new document identity, owned by the caller
    pub document: HostHandle,
    /// Source text
    pub source: String,
    /// How the source is interpreted
    pub category: DocumentCategory,
}

/// Resolves module requests against the ambient engine.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    handles: Arc<HandleTable>,
}

impl ModuleResolver {
    /// Create a resolver issuing document handles from `handles`
    pub fn new(handles: Arc<HandleTable>) -> Self {
        Self { handles }
    }

    /// Issue a handle for a root document, e.g. the entry script.
    pub fn register_document(&self, info: DocumentInfo) -> HostHandle {
        self.handles.acquire(Arc::new(UniqueDocumentInfo::new(info)))
    }

    /// The logical document behind a document handle
    pub fn document_info(&self, handle: HostHandle) -> Result<DocumentInfo> {
        let object = self.handles.resolve(handle)?;
        object
            .downcast_ref::<UniqueDocumentInfo>()
            .map(|doc| doc.info().clone())
            .ok_or(BridgeError::WrongHandleKind {
                handle: handle.to_raw(),
                expected: "document",
            })
    }

    /// Load the module `specifier` refers to from `referrer`.
    pub fn load_module(&self, referrer: HostHandle, specifier: &str) -> Result<LoadedModule> {
        let engine = engine::current_engine()?;
        let referrer = self.document_info(referrer)?;
        let settings = engine.document_settings();

        let document = settings
            .loader
            .load(settings, Some(&referrer), specifier, referrer.category)?;

        let category = document.info.category;
        let name = document.info.name.clone();
        let identity = Arc::new(UniqueDocumentInfo::new(document.info));
        let unique_id = identity.unique_id();
        let handle = self.handles.acquire(identity);

        tracing::debug!(
            engine = %engine.id(),
            specifier,
            referrer = %referrer.name,
            document = %name,
            unique_id,
            "module loaded"
        );

        Ok(LoadedModule {
            document: handle,
            source: document.contents,
            category,
        })
    }

    /// Build the context mapping for a loaded document.
    ///
    /// Returns `Ok(None)` when there is no callback, or when the callback
    /// fails or yields no snapshot. A value that cannot be marshaled fails
    /// the whole context.
    pub fn create_module_context(&self, document: HostHandle) -> Result<Option<ModuleContext>> {
        let engine = engine::current_engine()?;
        let info = self.document_info(document)?;

        let Some(callback) = info
            .context_callback
            .clone()
            .or_else(|| engine.document_settings().context_callback.clone())
        else {
            return Ok(None);
        };

        let snapshot = match panic::catch_unwind(AssertUnwindSafe(|| callback(&info))) {
            Ok(Ok(Some(snapshot))) => snapshot,
            Ok(Ok(None)) => return Ok(None),
            Ok(Err(fault)) => {
                tracing::warn!(
                    document = %info.name,
                    error = %fault,
                    "module context callback failed"
                );
                return Ok(None);
            }
            Err(_) => {
                tracing::warn!(document = %info.name, "module context callback panicked");
                return Ok(None);
            }
        };

        marshal_context(engine.as_ref(), snapshot).map(Some)
    }
}

fn marshal_context(engine: &dyn HostEngine, snapshot: ContextSnapshot) -> Result<ModuleContext> {
    let mut context = ModuleContext::new();
    for (name, value) in snapshot {
        match engine.marshal_to_script(value) {
            Ok(value) => {
                context.insert(name, value);
            }
            Err(fault) => {
                for (_, value) in std::mem::take(&mut context) {
                    engine.discard(value);
                }
                return Err(BridgeError::Host(fault));
            }
        }
    }
    Ok(context)
}
