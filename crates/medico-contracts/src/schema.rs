use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Declarative metadata for one model input variable.
///
/// A descriptor with `choices` renders as a single-select widget whose
/// collected value is the zero-based option index; without `choices` it
/// renders as free numeric entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

impl FeatureSpec {
    pub fn is_choice(&self) -> bool {
        self.choices.as_ref().is_some_and(|options| !options.is_empty())
    }
}

/// Ordered mapping from feature name to descriptor for one diagnosis panel.
///
/// Iteration order is the JSON key order of the schema file, which is the
/// order the panel's model expects its input vector at inference time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    features: IndexMap<String, FeatureSpec>,
}

impl FeatureSchema {
    pub fn new(features: IndexMap<String, FeatureSpec>) -> Self {
        Self { features }
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema file {}", path.display()))?;
        let schema: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse schema file {}", path.display()))?;
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureSpec)> {
        self.features.iter()
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &String> {
        self.features.keys()
    }
}

/// Widget label for a feature name: underscores become spaces, the first
/// character is uppercased and the rest lowercased.
pub fn display_label(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
