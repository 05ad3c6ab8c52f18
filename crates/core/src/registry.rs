//! Registry of report variants, keyed by report-type name.

use crate::catalog;
use crate::error::{ReportError, ReportResult};
use crate::variant::ReportVariant;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct VariantRegistry {
    variants: BTreeMap<String, ReportVariant>,
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for variant in catalog::builtin_variants() {
            registry.variants.insert(variant.name.clone(), variant);
        }
        registry
    }

    /// Add or replace a variant after validating it.
    pub fn register(&mut self, variant: ReportVariant) -> ReportResult<()> {
        variant.validate()?;
        if self.variants.contains_key(&variant.name) {
            info!(variant = %variant.name, "Replacing registered report variant");
        }
        self.variants.insert(variant.name.clone(), variant);
        Ok(())
    }

    /// Load a JSON variant definition and register it.
    pub fn register_file(&mut self, path: &Path) -> ReportResult<String> {
        if !path.exists() {
            return Err(ReportError::MissingFile(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let variant: ReportVariant = serde_json::from_str(&raw)?;
        let name = variant.name.clone();
        self.register(variant)?;
        info!(variant = %name, path = %path.display(), "Registered report variant from file");
        Ok(name)
    }

    pub fn get(&self, name: &str) -> ReportResult<&ReportVariant> {
        self.variants
            .get(name)
            .ok_or_else(|| ReportError::UnknownVariant(name.to_string()))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.variants.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportVariant> {
        self.variants.values()
    }
}
