//! Document plug loader
//!
//! Plugs are declared in YAML or JSON:
//!
//! ```yaml
//! name: X12_850
//! element_separators: ["*", ":"]
//! segment_separators: ["~", 10]
//! root:
//!   tag: "850"
//!   children:
//!     - tag: BEG
//!       mandatory: true
//!       children:
//!         - { tag: BEG01, kind: leaf }
//!     - tag: N1Loop
//!       max_occurs: unbounded
//!       children:
//!         - { tag: N1, mandatory: true }
//! ```

use crate::model::{DocumentPlug, NodeDef};
use crate::registry::PlugRegistry;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Serializable plug format for loading from files
#[derive(Debug, Deserialize)]
struct PlugFile {
    name: String,
    #[serde(default)]
    element_separators: Vec<SeparatorCode>,
    #[serde(default)]
    segment_separators: Vec<SeparatorCode>,
    root: NodeDef,
}

/// A separator given either as a numeric code or a one-character string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeparatorCode {
    Code(u8),
    Char(String),
}

impl SeparatorCode {
    fn to_code(&self) -> Result<u8> {
        match self {
            Self::Code(code) => Ok(*code),
            Self::Char(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii() => Ok(c as u8),
                    _ => Err(Error::InvalidFormat(format!(
                        "separator '{text}' must be a single ASCII character"
                    ))),
                }
            }
        }
    }
}

/// Loads plugs from disk and caches them in a shared registry
pub struct SchemaLoader {
    registry: Arc<PlugRegistry>,
    schema_paths: Vec<PathBuf>,
}

impl SchemaLoader {
    /// Create a new loader with the given search paths
    pub fn new(schema_paths: Vec<PathBuf>) -> Self {
        Self {
            registry: Arc::new(PlugRegistry::new()),
            schema_paths,
        }
    }

    /// Create a new loader with a pre-configured registry
    pub fn with_registry(registry: Arc<PlugRegistry>, schema_paths: Vec<PathBuf>) -> Self {
        Self {
            registry,
            schema_paths,
        }
    }

    /// Load a plug by name, checking the cache first
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no `<name>.yaml|yml|json` exists in the
    /// search paths, or the file's parse/validation error.
    pub fn load(&self, name: &str) -> Result<Arc<DocumentPlug>> {
        if let Some(cached) = self.registry.get(name) {
            debug!("Cache hit for plug: {}", name);
            return Ok(cached);
        }

        trace!("Cache miss for plug: {}", name);
        let path = self.find_file(name)?;
        let plug = self.load_from_file(&path)?;
        Ok(self.registry.register(name, plug))
    }

    /// Load a plug from a file path, caching it under its path
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not a valid plug.
    pub fn load_path(&self, path: &Path) -> Result<Arc<DocumentPlug>> {
        let key = path.to_string_lossy().into_owned();
        if let Some(cached) = self.registry.get(&key) {
            debug!("Cache hit for plug file: {}", key);
            return Ok(cached);
        }

        let plug = self.load_from_file(path)?;
        Ok(self.registry.register(key, plug))
    }

    /// Load a plug from a specific file path, without caching
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not a valid plug.
    pub fn load_from_file(&self, path: &Path) -> Result<DocumentPlug> {
        trace!("Loading plug from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            self.load_from_yaml(&content)
        } else {
            self.load_from_json(&content)
        }
    }

    /// Load a plug from a JSON string
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] for malformed JSON or separators.
    pub fn load_from_json(&self, json: &str) -> Result<DocumentPlug> {
        let file: PlugFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))?;
        Self::convert_plug_file(file)
    }

    /// Load a plug from a YAML string
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] for malformed YAML or separators.
    pub fn load_from_yaml(&self, yaml: &str) -> Result<DocumentPlug> {
        let file: PlugFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))?;
        Self::convert_plug_file(file)
    }

    fn convert_plug_file(file: PlugFile) -> Result<DocumentPlug> {
        let element = file
            .element_separators
            .iter()
            .map(SeparatorCode::to_code)
            .collect::<Result<Vec<_>>>()?;
        let segment = file
            .segment_separators
            .iter()
            .map(SeparatorCode::to_code)
            .collect::<Result<Vec<_>>>()?;

        let plug = DocumentPlug::new(file.name, file.root)?.with_separators(element, segment);
        debug!(plug = plug.name(), nodes = plug.len(), "Loaded plug");
        Ok(plug)
    }

    fn find_file(&self, name: &str) -> Result<PathBuf> {
        let lower = name.to_lowercase();
        let candidates = [
            format!("{name}.yaml"),
            format!("{name}.yml"),
            format!("{name}.json"),
            format!("{lower}.yaml"),
            format!("{lower}.yml"),
            format!("{lower}.json"),
        ];

        for path in &self.schema_paths {
            for candidate in &candidates {
                let file_path = path.join(candidate);
                if file_path.exists() {
                    trace!("Found plug file: {:?}", file_path);
                    return Ok(file_path);
                }
            }
        }

        Err(Error::NotFound(format!(
            "Plug {} not found in search paths: {:?}",
            name, self.schema_paths
        )))
    }

    /// Add a search path for plug files
    pub fn add_path(&mut self, path: PathBuf) {
        self.schema_paths.push(path);
    }

    /// Get the registry
    pub fn registry(&self) -> &PlugRegistry {
        &self.registry
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}
