// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! File system document loader

use super::{
    Document, DocumentCache, DocumentCategory, DocumentInfo, DocumentLoader, DocumentSettings,
};
use crate::error::{BridgeError, Result};
use std::sync::Arc;

/// Loads `file:` documents, caching their contents.
#[derive(Default)]
pub struct FileDocumentLoader {
    cache: DocumentCache,
}

impl FileDocumentLoader {
    /// Create a loader caching at most `max_cache_size` documents
    pub fn new(max_cache_size: usize) -> Self {
        Self {
            cache: DocumentCache::new(max_cache_size),
        }
    }
}

impl DocumentLoader for FileDocumentLoader {
    fn load(
        &self,
        settings: &DocumentSettings,
        referrer: Option<&DocumentInfo>,
        specifier: &str,
        category: DocumentCategory,
    ) -> Result<Document> {
        if !settings.allow_file_loading {
            return Err(BridgeError::module_resolution(
                specifier,
                "file loading is disabled",
            ));
        }

        let candidates = settings.candidate_uris(referrer, specifier)?;
        for uri in &candidates {
            if uri.scheme() != "file" {
                continue;
            }

            let contents = match self.cache.get(uri) {
                Some(contents) => contents,
                None => {
                    let Ok(path) = uri.to_file_path() else {
                        continue;
                    };
                    if !path.is_file() {
                        continue;
                    }
                    let contents: Arc<str> = std::fs::read_to_string(&path)
                        .map_err(|e| {
                            BridgeError::module_resolution(
                                specifier,
                                format!("cannot read {}: {}", path.display(), e),
                            )
                        })?
                        .into();
                    tracing::debug!(path = %path.display(), "loaded document from disk");
                    self.cache.insert(uri.clone(), Arc::clone(&contents));
                    contents
                }
            };

            let category = DocumentCategory::infer(uri, category);
            return Ok(Document {
                info: DocumentInfo::from_uri(uri.clone(), category),
                contents: contents.to_string(),
            });
        }

        let tried: Vec<&str> = candidates.iter().map(|u| u.as_str()).collect();
        Err(BridgeError::module_resolution(
            specifier,
            format!("file not found (tried {})", tried.join(", ")),
        ))
    }

    fn discard_cached(&self) {
        self.cache.clear();
    }

    fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::file_url;
    use crate::error::FaultKind;
    use std::fs;

    fn setup() -> (tempfile::TempDir, DocumentInfo) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.js"), "import './util';").unwrap();
        fs::write(dir.path().join("util.js"), "export const x = 1;").unwrap();
        fs::write(dir.path().join("lib.cjs"), "module.exports = 2;").unwrap();
        let referrer = DocumentInfo::from_uri(
            file_url(&dir.path().join("main.js")).unwrap(),
            DocumentCategory::StandardModule,
        );
        (dir, referrer)
    }

    fn settings(loader: &Arc<FileDocumentLoader>) -> DocumentSettings {
        DocumentSettings::new(loader.clone())
    }

    #[test]
    fn test_load_tries_extensions() {
        let (_dir, referrer) = setup();
        let loader = Arc::new(FileDocumentLoader::new(8));
        let doc = loader
            .load(&settings(&loader), Some(&referrer), "./util", referrer.category)
            .unwrap();
        assert_eq!(doc.contents, "export const x = 1;");
        assert_eq!(doc.info.name, "util.js");
        assert_eq!(doc.info.category, DocumentCategory::StandardModule);
        assert_eq!(loader.cache_len(), 1);
    }

    #[test]
    fn test_commonjs_category() {
        let (_dir, referrer) = setup();
        let loader = Arc::new(FileDocumentLoader::new(8));
        let doc = loader
            .load(&settings(&loader), Some(&referrer), "./lib.cjs", referrer.category)
            .unwrap();
        assert_eq!(doc.info.category, DocumentCategory::CommonJsModule);
    }

    #[test]
    fn test_cache_serves_after_delete() {
        let (dir, referrer) = setup();
        let loader = Arc::new(FileDocumentLoader::new(8));
        let settings = settings(&loader);
        loader.load(&settings, Some(&referrer), "./util.js", referrer.category).unwrap();

        fs::remove_file(dir.path().join("util.js")).unwrap();
        assert!(loader.load(&settings, Some(&referrer), "./util.js", referrer.category).is_ok());

        loader.discard_cached();
        assert_eq!(loader.cache_len(), 0);
        assert!(loader.load(&settings, Some(&referrer), "./util.js", referrer.category).is_err());
    }

    #[test]
    fn test_file_loading_disabled() {
        let (_dir, referrer) = setup();
        let loader = Arc::new(FileDocumentLoader::new(8));
        let mut settings = settings(&loader);
        settings.allow_file_loading = false;
        let err = loader
            .load(&settings, Some(&referrer), "./util", referrer.category)
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_not_found_lists_candidates() {
        let (_dir, referrer) = setup();
        let loader = Arc::new(FileDocumentLoader::new(8));
        let err = loader
            .load(&settings(&loader), Some(&referrer), "./missing", referrer.category)
            .unwrap_err();
        assert!(err.to_string().contains("missing.mjs"));
    }

    #[test]
    fn test_unreadable_file_is_resolution_failure() {
        let (dir, referrer) = setup();
        fs::write(dir.path().join("bad.js"), [0xff, 0xfe, 0xfd]).unwrap();
        let loader = Arc::new(FileDocumentLoader::new(8));
        let err = loader
            .load(&settings(&loader), Some(&referrer), "./bad.js", referrer.category)
            .unwrap_err();
        assert!(matches!(err, BridgeError::ModuleResolution { .. }));
        assert_eq!(err.into_fault().kind, FaultKind::DocumentLoad);
        assert_eq!(loader.cache_len(), 0);
    }
}
