//! Template loading
//!
//! Writers start from factory container skeletons. The core never embeds or
//! locates those bytes itself: a [`TemplateSource`] supplies them and a
//! [`TemplateStore`] caches each template once it has been loaded. Cached
//! entries are immutable and shared.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::{CodecError, Result};

/// Something that can produce template bytes by name
pub trait TemplateSource: Send + Sync {
    /// Load the named template
    fn load(&self, name: &str) -> Result<Vec<u8>>;

    /// Source name for diagnostics
    fn name(&self) -> &str;
}

/// Templates held in memory (tests, embedded resources)
#[derive(Debug, Default)]
pub struct InMemorySource {
    templates: HashMap<String, Vec<u8>>,
}

impl InMemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template
    pub fn with_template(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.templates.insert(name.into(), bytes);
        self
    }
}

impl TemplateSource for InMemorySource {
    fn load(&self, name: &str) -> Result<Vec<u8>> {
        self.templates.get(name).cloned().ok_or_else(|| {
            CodecError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Template '{name}' not found"),
            ))
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Templates stored as files below a directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Serve templates from `root`
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl TemplateSource for DirectorySource {
    fn load(&self, name: &str) -> Result<Vec<u8>> {
        let relative = Path::new(name);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return Err(CodecError::Config(format!(
                "Template name '{name}' must be a plain relative path"
            )));
        }
        Ok(std::fs::read(self.root.join(relative))?)
    }

    fn name(&self) -> &str {
        "directory"
    }
}

/// Lazily filled, process-wide template cache
pub struct TemplateStore {
    source: Box<dyn TemplateSource>,
    cache: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl TemplateStore {
    /// Create a store backed by `source`
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get a template, loading it on first use
    pub fn get(&self, name: &str) -> Result<Arc<[u8]>> {
        if let Some(bytes) = self.cache.read().get(name) {
            return Ok(Arc::clone(bytes));
        }

        let loaded: Arc<[u8]> = self.source.load(name)?.into();
        debug!(
            "Loaded template '{}' ({} bytes) from {} source",
            name,
            loaded.len(),
            self.source.name()
        );

        // A concurrent loader may have won; keep whichever entry landed first.
        let mut cache = self.cache.write();
        let entry = cache.entry(name.to_string()).or_insert(loaded);
        Ok(Arc::clone(entry))
    }

    /// True if the template is already cached
    pub fn is_loaded(&self, name: &str) -> bool {
        self.cache.read().contains_key(name)
    }

    /// Number of cached templates
    pub fn loaded_count(&self) -> usize {
        self.cache.read().len()
    }
}
