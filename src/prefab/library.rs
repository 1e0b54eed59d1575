//! Prefab library loading
//!
//! Templates are loaded once from a RON file and shared read-only between
//! runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::world::Point;

use super::template::{Prefab, PrefabDefinition, Tagged};

/// On-disk layout of a library file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrefabLibraryFile {
    pub prefabs: Vec<PrefabDefinition>,
}

/// Immutable collection of templates keyed by id
#[derive(Debug, Clone, Default)]
pub struct PrefabLibrary {
    prefabs: BTreeMap<String, Arc<Prefab>>,
}

impl PrefabLibrary {
    /// Build a library from definitions; a later duplicate id replaces an earlier one
    pub fn from_definitions(defs: Vec<PrefabDefinition>) -> Result<Self> {
        let mut prefabs = BTreeMap::new();
        for def in defs {
            let prefab = Prefab::from_definition(def)?;
            if prefabs.contains_key(prefab.id()) {
                log::warn!("Duplicate prefab id '{}', keeping the last one", prefab.id());
            }
            prefabs.insert(prefab.id().to_string(), Arc::new(prefab));
        }
        Ok(Self { prefabs })
    }

    /// Parse a library from RON text
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let file: PrefabLibraryFile = ron::from_str(content)?;
        Self::from_definitions(file.prefabs)
    }

    /// Load a library from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let library = Self::from_ron_str(&content)?;
        log::info!("Loaded {} prefabs from {}", library.len(), path.display());
        Ok(library)
    }

    /// Keep only templates whose tags intersect `whitelist` (`*` keeps all)
    pub fn with_tag_whitelist(&self, whitelist: &[String]) -> Self {
        let mut prefabs = BTreeMap::new();
        for (id, prefab) in &self.prefabs {
            if prefab.matches_any(whitelist) {
                prefabs.insert(id.clone(), Arc::clone(prefab));
            } else {
                log::info!("Excluding prefab '{}' (tags {:?})", id, prefab.tags());
            }
        }
        Self { prefabs }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Prefab>> {
        self.prefabs.get(id)
    }

    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }

    /// All templates in id order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Prefab>> {
        self.prefabs.values()
    }

    /// Templates carrying `tag`, in id order
    pub fn with_tag(&self, tag: &str) -> Vec<Arc<Prefab>> {
        self.iter().filter(|p| p.matches(tag)).cloned().collect()
    }

    /// Templates with at least one directed port facing `direction`, in id order
    pub fn facing(&self, direction: Point) -> Vec<Arc<Prefab>> {
        self.iter()
            .filter(|p| p.has_port_facing(direction))
            .cloned()
            .collect()
    }
}
