//! Disk-backed dimension definition store.
//!
//! One YAML document per dimension under a dimensions directory, with
//! an in-memory cache in front. Malformed or incomplete files are
//! logged and fallen back from (built-in registry, then generated
//! stub); the public load API never propagates a parse error.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use super::builtin;
use super::definition::DimensionDefinition;
use crate::errors::StoreError;

/// Store for dimension definitions.
///
/// Cache entries are shared via `Arc`, so repeated loads of the same
/// name return the identical object until it is saved over.
#[derive(Debug)]
pub struct DimensionStore {
    dir: PathBuf,
    create_defaults: bool,
    cache: RwLock<HashMap<String, Arc<DimensionDefinition>>>,
}

impl DimensionStore {
    /// Create a store over `dir`. With `create_defaults`, cache misses
    /// for unknown names synthesize (and persist) a definition instead
    /// of returning `None`.
    pub fn new(dir: impl Into<PathBuf>, create_defaults: bool) -> Self {
        Self {
            dir: dir.into(),
            create_defaults,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The directory this store reads and writes.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a definition by name: cache, then disk, then (if enabled)
    /// the built-in registry and stub synthesizer.
    pub fn load(&self, name: &str) -> Option<Arc<DimensionDefinition>> {
        self.load_inner(name, self.create_defaults)
    }

    fn load_inner(&self, name: &str, allow_defaults: bool) -> Option<Arc<DimensionDefinition>> {
        if let Some(cached) = self.cache.read().get(name) {
            return Some(Arc::clone(cached));
        }

        if let Some(def) = self.read_from_disk(name) {
            let def = Arc::new(def);
            self.cache
                .write()
                .insert(name.to_string(), Arc::clone(&def));
            return Some(def);
        }

        if !allow_defaults {
            return None;
        }

        let synthesized = builtin::builtin(name).unwrap_or_else(|| builtin::stub(name));
        if let Err(e) = self.write_to_disk(name, &synthesized) {
            log::warn!(
                "Failed to persist synthesized dimension '{}': {}",
                name,
                e
            );
        }
        let def = Arc::new(synthesized);
        self.cache
            .write()
            .insert(name.to_string(), Arc::clone(&def));
        Some(def)
    }

    /// Load every definition in the backing store, guaranteeing that
    /// all built-in names are present (creating missing ones).
    pub fn load_all(&self) -> HashMap<String, Arc<DimensionDefinition>> {
        let mut names: Vec<String> = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_yaml = path
                    .extension()
                    .map_or(false, |ext| ext == "yaml" || ext == "yml");
                if is_yaml {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }

        for builtin_name in builtin::BUILTIN_NAMES {
            if !names.iter().any(|n| n == builtin_name) {
                names.push((*builtin_name).to_string());
            }
        }

        let mut result = HashMap::new();
        for name in names {
            // Built-in names are always synthesizable, regardless of
            // the create_defaults flag.
            let allow = self.create_defaults || builtin::is_builtin(&name);
            if let Some(def) = self.load_inner(&name, allow) {
                result.insert(name, def);
            }
        }
        result
    }

    /// Persist a definition, stamping `updated_at` and refreshing the
    /// cache.
    pub fn save(&self, name: &str, mut definition: DimensionDefinition) -> Result<(), StoreError> {
        definition.name = name.to_string();
        definition.metadata.updated_at = Utc::now();
        self.write_to_disk(name, &definition)?;
        self.cache
            .write()
            .insert(name.to_string(), Arc::new(definition));
        Ok(())
    }

    /// Read and validate a definition file. Returns `None` (with a
    /// warning) on parse failure or failed validation, so the caller
    /// falls back instead of crashing on a hand-edited file.
    fn read_from_disk(&self, name: &str) -> Option<DimensionDefinition> {
        let path = self.path_for(name);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return None,
        };

        let mut def: DimensionDefinition = match serde_yaml::from_str(&content) {
            Ok(d) => d,
            Err(e) => {
                log::warn!(
                    "Malformed dimension file {}: {}; falling back to defaults",
                    path.display(),
                    e
                );
                return None;
            }
        };

        if def.name.is_empty() {
            def.name = name.to_string();
        }

        let validation = def.validate();
        if !validation.valid {
            log::warn!(
                "Dimension file {} failed validation (missing: {}); falling back to defaults",
                path.display(),
                validation.missing.join(", ")
            );
            return None;
        }

        Some(def)
    }

    fn write_to_disk(&self, name: &str, definition: &DimensionDefinition) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let yaml = serde_yaml::to_string(definition)?;
        fs::write(self.path_for(name), yaml)?;
        Ok(())
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", name))
    }
}
