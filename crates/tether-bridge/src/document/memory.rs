// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! In-memory document registry

use super::{Document, DocumentCategory, DocumentInfo, DocumentLoader, DocumentSettings};
use crate::error::{BridgeError, Result};
use dashmap::DashMap;
use url::Url;

/// Serves documents registered ahead of time by URI.
#[derive(Default)]
pub struct MemoryDocumentLoader {
    documents: DashMap<Url, String>,
}

impl MemoryDocumentLoader {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `contents` under `uri`, replacing any previous registration
    pub fn register(&self, uri: &str, contents: impl Into<String>) -> Result<Url> {
        let uri = Url::parse(uri)?;
        self.documents.insert(uri.clone(), contents.into());
        Ok(uri)
    }

    /// Number of registered documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents are registered
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentLoader for MemoryDocumentLoader {
    fn load(
        &self,
        settings: &DocumentSettings,
        referrer: Option<&DocumentInfo>,
        specifier: &str,
        category: DocumentCategory,
    ) -> Result<Document> {
        for uri in settings.candidate_uris(referrer, specifier)? {
            if let Some(contents) = self.documents.get(&uri) {
                let category = DocumentCategory::infer(&uri, category);
                return Ok(Document {
                    contents: contents.value().clone(),
                    info: DocumentInfo::from_uri(uri, category),
                });
            }
        }
        Err(BridgeError::module_resolution(specifier, "document not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_load_registered() {
        let loader = Arc::new(MemoryDocumentLoader::new());
        loader.register("file:///app/a.js", "export default 1;").unwrap();
        loader.register("file:///app/data.json", "{}").unwrap();
        let settings = DocumentSettings::new(loader.clone());
        let referrer = DocumentInfo::from_uri(
            Url::parse("file:///app/main.js").unwrap(),
            DocumentCategory::Script,
        );

        let doc = loader
            .load(&settings, Some(&referrer), "./a", DocumentCategory::Script)
            .unwrap();
        assert_eq!(doc.contents, "export default 1;");
        assert_eq!(doc.info.name, "a.js");
        assert_eq!(doc.info.category, DocumentCategory::Script);

        let json = loader
            .load(&settings, Some(&referrer), "./data.json", DocumentCategory::Script)
            .unwrap();
        assert_eq!(json.info.category, DocumentCategory::Json);
    }

    #[test]
    fn test_missing_document() {
        let loader = Arc::new(MemoryDocumentLoader::new());
        let settings = DocumentSettings::new(loader.clone());
        let err = loader
            .load(&settings, None, "file:///nope.js", DocumentCategory::Script)
            .unwrap_err();
        assert!(err.to_string().contains("document not found"));
    }

    #[test]
    fn test_register_invalid_uri() {
        let loader = MemoryDocumentLoader::new();
        assert!(matches!(loader.register("not a uri", ""), Err(BridgeError::Url(_))));
        assert!(loader.is_empty());
    }
}
