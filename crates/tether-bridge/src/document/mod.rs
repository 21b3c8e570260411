// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Documents and document loading
//!
//! A document is a unit of source text identified by a URI. Each load
//! produces a fresh [`UniqueDocumentInfo`], so two loads of the same file
//! are distinct identities to the native module pipeline.

mod cache;
mod file;
mod memory;

pub use cache::DocumentCache;
pub use file::FileDocumentLoader;
pub use memory::MemoryDocumentLoader;

use crate::config::ModuleConfig;
use crate::error::{BridgeError, HostFault, Result};
use crate::object::HostObject;
use crate::value::HostValue;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// Snapshot of identifiers exposed to a module as its context.
pub type ContextSnapshot = BTreeMap<String, HostValue>;

/// Produces the context snapshot for a loaded document.
pub type ContextCallback =
    Arc<dyn Fn(&DocumentInfo) -> std::result::Result<Option<ContextSnapshot>, HostFault> + Send + Sync>;

/// How a document's source is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DocumentCategory {
    /// Classic script
    Script,
    /// ECMAScript module
    #[default]
    StandardModule,
    /// CommonJS module
    CommonJsModule,
    /// JSON document
    Json,
}

impl DocumentCategory {
    /// Category for a document at `uri`, falling back to `inherited`
    pub fn infer(uri: &Url, inherited: DocumentCategory) -> Self {
        match Path::new(uri.path()).extension().and_then(|e| e.to_str()) {
            Some("json") => DocumentCategory::Json,
            Some("cjs") => DocumentCategory::CommonJsModule,
            _ => inherited,
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentCategory::Script => "script",
            DocumentCategory::StandardModule => "module",
            DocumentCategory::CommonJsModule => "commonjs",
            DocumentCategory::Json => "json",
        };
        f.write_str(s)
    }
}

/// Logical description of a document.
#[derive(Clone, Default)]
pub struct DocumentInfo {
    /// Display name
    pub name: String,
    /// Location the document was loaded from
    pub uri: Option<Url>,
    /// Location of the document's source map
    pub source_map_uri: Option<Url>,
    /// How the source is interpreted
    pub category: DocumentCategory,
    /// Per-document context callback, overriding the engine default
    pub context_callback: Option<ContextCallback>,
}

impl DocumentInfo {
    /// Create a document description with no URI
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Describe the document at `uri`, named after its last path segment
    pub fn from_uri(uri: Url, category: DocumentCategory) -> Self {
        let name = uri
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uri.to_string());
        Self {
            name,
            uri: Some(uri),
            category,
            ..Default::default()
        }
    }

    /// Set the URI
    pub fn with_uri(mut self, uri: Url) -> Self {
        self.uri = Some(uri);
        self
    }

    /// Set the source map URI
    pub fn with_source_map_uri(mut self, uri: Url) -> Self {
        self.source_map_uri = Some(uri);
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: DocumentCategory) -> Self {
        self.category = category;
        self
    }

    /// Set the context callback
    pub fn with_context_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DocumentInfo) -> std::result::Result<Option<ContextSnapshot>, HostFault>
            + Send
            + Sync
            + 'static,
    {
        self.context_callback = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for DocumentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentInfo")
            .field("name", &self.name)
            .field("uri", &self.uri.as_ref().map(Url::as_str))
            .field("source_map_uri", &self.source_map_uri.as_ref().map(Url::as_str))
            .field("category", &self.category)
            .field("context_callback", &self.context_callback.is_some())
            .finish()
    }
}

/// One load of a document.
///
/// Immutable. The `unique_id` tells repeated loads of the same document
/// apart.
#[derive(Debug)]
pub struct UniqueDocumentInfo {
    info: DocumentInfo,
    unique_id: u64,
}

impl UniqueDocumentInfo {
    /// Stamp `info` with a fresh identity
    pub fn new(info: DocumentInfo) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self {
            info,
            unique_id: NEXT.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The logical document
    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    /// Process-unique identity of this load
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }
}

impl HostObject for UniqueDocumentInfo {}

/// Loaded source text with its description
#[derive(Debug, Clone)]
pub struct Document {
    /// Document description
    pub info: DocumentInfo,
    /// Source text
    pub contents: String,
}

/// Loads documents for the module pipeline.
pub trait DocumentLoader: Send + Sync {
    /// Load the document `specifier` refers to from `referrer`.
    ///
    /// `category` is the category inherited from the referrer; loaders may
    /// refine it from the resolved URI.
    fn load(
        &self,
        settings: &DocumentSettings,
        referrer: Option<&DocumentInfo>,
        specifier: &str,
        category: DocumentCategory,
    ) -> Result<Document>;

    /// Drop any cached document contents
    fn discard_cached(&self) {}

    /// Number of cached documents
    fn cache_len(&self) -> usize {
        0
    }
}

/// An engine's document-loading policy.
#[derive(Clone)]
pub struct DocumentSettings {
    /// Loader used for every module request
    pub loader: Arc<dyn DocumentLoader>,
    /// Directories searched for bare specifiers
    pub search_path: Vec<PathBuf>,
    /// Extensions tried when a specifier has none
    pub extensions: Vec<String>,
    /// Whether documents may be read from the file system
    pub allow_file_loading: bool,
    /// Engine-wide context callback
    pub context_callback: Option<ContextCallback>,
}

impl DocumentSettings {
    /// Settings that load through `loader`
    pub fn new(loader: Arc<dyn DocumentLoader>) -> Self {
        let defaults = ModuleConfig::default();
        Self {
            loader,
            search_path: defaults.search_path,
            extensions: defaults.extensions,
            allow_file_loading: defaults.allow_file_loading,
            context_callback: None,
        }
    }

    /// File-system settings built from configuration
    pub fn from_config(config: &ModuleConfig) -> Result<Self> {
        Ok(Self {
            loader: Arc::new(FileDocumentLoader::new(config.max_cache_size)),
            search_path: config.search_path.clone(),
            extensions: config.extensions.clone(),
            allow_file_loading: config.allow_file_loading,
            context_callback: None,
        })
    }

    /// Set the engine-wide context callback
    pub fn with_context_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DocumentInfo) -> std::result::Result<Option<ContextSnapshot>, HostFault>
            + Send
            + Sync
            + 'static,
    {
        self.context_callback = Some(Arc::new(callback));
        self
    }

    /// URIs to try for `specifier`, most specific first.
    pub fn candidate_uris(
        &self,
        referrer: Option<&DocumentInfo>,
        specifier: &str,
    ) -> Result<Vec<Url>> {
        if specifier.is_empty() {
            return Err(BridgeError::module_resolution(specifier, "empty specifier"));
        }

        let referrer_uri = referrer.and_then(|r| r.uri.as_ref());
        let is_relative =
            specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/');

        let bases: Vec<Url> = if let Ok(absolute) = Url::parse(specifier) {
            vec![absolute]
        } else if is_relative {
            let base = referrer_uri.ok_or_else(|| {
                BridgeError::module_resolution(specifier, "relative specifier without a referrer URI")
            })?;
            vec![base.join(specifier)?]
        } else {
            let mut bases = Vec::new();
            for dir in &self.search_path {
                bases.push(directory_url(dir)?.join(specifier)?);
            }
            if let Some(base) = referrer_uri {
                bases.push(base.join(specifier)?);
            }
            bases
        };

        let mut candidates = Vec::new();
        for base in bases {
            let has_extension = Path::new(base.path()).extension().is_some();
            if !has_extension {
                for ext in &self.extensions {
                    let mut with_ext = base.clone();
                    with_ext.set_path(&format!("{}{}", base.path(), ext));
                    candidates.push(with_ext);
                }
            }
            candidates.push(base);
        }
        candidates.dedup();
        Ok(candidates)
    }
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self::new(Arc::new(FileDocumentLoader::default()))
    }
}

impl fmt::Debug for DocumentSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSettings")
            .field("search_path", &self.search_path)
            .field("extensions", &self.extensions)
            .field("allow_file_loading", &self.allow_file_loading)
            .field("context_callback", &self.context_callback.is_some())
            .finish()
    }
}

/// `file:` URL for a directory, relative paths taken from the working
/// directory.
fn directory_url(dir: &Path) -> Result<Url> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    Url::from_directory_path(&absolute)
        .map_err(|_| BridgeError::Config(format!("invalid search path: {}", absolute.display())))
}

/// `file:` URL for a file path, relative paths taken from the working
/// directory.
pub fn file_url(path: &Path) -> Result<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&absolute)
        .map_err(|_| BridgeError::Config(format!("invalid file path: {}", absolute.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn referrer() -> DocumentInfo {
        DocumentInfo::from_uri(
            Url::parse("file:///app/src/main.js").unwrap(),
            DocumentCategory::StandardModule,
        )
    }

    fn settings() -> DocumentSettings {
        DocumentSettings::new(Arc::new(MemoryDocumentLoader::new()))
    }

    #[test]
    fn test_from_uri_name() {
        assert_eq!(referrer().name, "main.js");
        let root =
            DocumentInfo::from_uri(Url::parse("file:///").unwrap(), DocumentCategory::Script);
        assert_eq!(root.name, "file:///");
    }

    #[test]
    fn test_infer_category() {
        let json = Url::parse("file:///a/data.json").unwrap();
        let cjs = Url::parse("file:///a/lib.cjs").unwrap();
        let js = Url::parse("file:///a/lib.js").unwrap();
        assert_eq!(
            DocumentCategory::infer(&json, DocumentCategory::Script),
            DocumentCategory::Json
        );
        assert_eq!(
            DocumentCategory::infer(&cjs, DocumentCategory::Script),
            DocumentCategory::CommonJsModule
        );
        assert_eq!(
            DocumentCategory::infer(&js, DocumentCategory::Script),
            DocumentCategory::Script
        );
    }

    #[test]
    fn test_relative_candidates() {
        let uris = settings().candidate_uris(Some(&referrer()), "./util").unwrap();
        let uris: Vec<&str> = uris.iter().map(Url::as_str).collect();
        assert_eq!(
            uris,
            vec![
                "file:///app/src/util.js",
                "file:///app/src/util.mjs",
                "file:///app/src/util.json",
                "file:///app/src/util",
            ]
        );
    }

    #[test]
    fn test_explicit_extension_not_extended() {
        let uris = settings().candidate_uris(Some(&referrer()), "../lib/a.mjs").unwrap();
        assert_eq!(uris.len(), 1);
        assert_eq!(uris[0].as_str(), "file:///app/lib/a.mjs");
    }

    #[test]
    fn test_relative_without_referrer() {
        let err = settings().candidate_uris(None, "./a").unwrap_err();
        assert!(matches!(err, BridgeError::ModuleResolution { .. }));
    }

    #[test]
    fn test_bare_specifier_uses_search_path() {
        let mut settings = settings();
        settings.search_path = vec![PathBuf::from("/opt/modules")];
        settings.extensions = vec![".js".into()];
        let uris = settings.candidate_uris(None, "pkg/index").unwrap();
        let uris: Vec<&str> = uris.iter().map(Url::as_str).collect();
        assert_eq!(
            uris,
            vec!["file:///opt/modules/pkg/index.js", "file:///opt/modules/pkg/index"]
        );
    }

    #[test]
    fn test_unique_ids_differ() {
        let a = UniqueDocumentInfo::new(referrer());
        let b = UniqueDocumentInfo::new(referrer());
        assert_ne!(a.unique_id(), b.unique_id());
        assert_eq!(a.info().name, b.info().name);
    }
}
