//! Transformer caching so repeated CRS groups reuse one PROJ object

use std::collections::HashMap;

use log::debug;

use crate::error::Result;
use crate::projection::{CrsDescriptor, Transformer};

/// Cache of built transformers keyed by (source, target) descriptor
///
/// PROJ objects are not thread-safe, so the cache lives inside a single
/// conversion run.
pub struct TransformCache {
    entries: HashMap<(CrsDescriptor, CrsDescriptor), Transformer>,
    hits: usize,
    misses: usize,
}

impl TransformCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Gets the transformer for a descriptor pair, building it on first use
    ///
    /// # Arguments
    /// * `source` - Source descriptor, compound expansion already applied
    /// * `target` - Target descriptor, compound expansion already applied
    pub fn get_or_build(&mut self, source: &CrsDescriptor, target: &CrsDescriptor) -> Result<&Transformer> {
        let key = (source.clone(), target.clone());

        if self.entries.contains_key(&key) {
            self.hits += 1;
        } else {
            debug!("building transformer {} -> {}", source, target);
            let transformer = Transformer::between(source, target)?;
            self.entries.insert(key.clone(), transformer);
            self.misses += 1;
        }

        Ok(&self.entries[&key])
    }

    /// Clears the cache
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the current number of cached transformers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            transformers: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of transformers currently cached
    pub transformers: usize,
    /// Lookups served from the cache
    pub hits: usize,
    /// Lookups that had to build a transformer
    pub misses: usize,
}
