//! Candidate catalog construction.
//!
//! The catalog is a pure function of the static fallback list and whatever
//! discovery returned, so identical inputs always produce the same ordering.

use crate::models::{Attempt, EndpointVersion, PayloadShape};
use std::collections::HashSet;

/// Known-good models, most capable/fastest first.
pub const DEFAULT_FALLBACK_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-pro",
];

/// Substrings marking models that should never be used for plain text generation.
const UNSTABLE_MARKERS: &[&str] = &["vision", "tuning"];

/// Models known to reject `systemInstruction` and modern config keys.
const LEGACY_MODEL_MARKERS: &[&str] = &["gemini-1.0", "gemma"];

#[derive(Debug, Clone)]
pub struct AttemptCatalog {
    fallback_models: Vec<String>,
}

impl Default for AttemptCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl AttemptCatalog {
    /// Build a catalog over `fallback_models`; an empty list selects
    /// [`DEFAULT_FALLBACK_MODELS`] so the catalog can never be empty.
    pub fn new(fallback_models: Vec<String>) -> Self {
        let fallback_models = if fallback_models.is_empty() {
            DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect()
        } else {
            fallback_models
        };
        Self { fallback_models }
    }

    /// Ordered, de-duplicated attempts for one request.
    pub fn build(&self, discovered: Option<&[String]>) -> Vec<Attempt> {
        let discovered = discovered
            .map(filter_models)
            .filter(|models| !models.is_empty());

        let models = match discovered {
            Some(models) => models,
            None => {
                let fallback = filter_models(&self.fallback_models);
                if fallback.is_empty() {
                    self.fallback_models.clone()
                } else {
                    fallback
                }
            }
        };

        let mut seen = HashSet::new();
        models
            .iter()
            .flat_map(|model| attempts_for_model(model))
            .filter(|attempt| seen.insert(attempt.clone()))
            .collect()
    }
}

/// Drops unstable identifiers and duplicates, keeping first occurrence.
pub fn filter_models(models: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    models
        .iter()
        .map(|m| m.trim())
        .map(|m| m.strip_prefix("models/").unwrap_or(m))
        .filter(|m| !m.is_empty() && !is_unstable(m))
        .filter(|m| seen.insert(m.to_string()))
        .map(str::to_string)
        .collect()
}

fn is_unstable(model: &str) -> bool {
    let lower = model.to_ascii_lowercase();
    UNSTABLE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Whether `model` is known to reject modern field names.
pub fn needs_legacy_shape(model: &str) -> bool {
    let lower = model.to_ascii_lowercase();
    lower == "gemini-pro" || LEGACY_MODEL_MARKERS.iter().any(|m| lower.contains(m))
}

fn attempts_for_model(model: &str) -> Vec<Attempt> {
    let mut attempts = vec![
        Attempt::new(EndpointVersion::V1Beta, PayloadShape::Modern, model),
        Attempt::new(EndpointVersion::V1, PayloadShape::Modern, model),
    ];
    if needs_legacy_shape(model) {
        attempts.push(Attempt::new(EndpointVersion::V1, PayloadShape::Legacy, model));
    }
    attempts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_static_catalog_is_never_empty() {
        let catalog = AttemptCatalog::new(Vec::new());
        let attempts = catalog.build(None);
        assert!(!attempts.is_empty());
        assert_eq!(attempts[0].model_id, DEFAULT_FALLBACK_MODELS[0]);

        let from_empty_discovery = catalog.build(Some(&[][..]));
        assert_eq!(from_empty_discovery, attempts);
    }

    #[test]
    fn test_model_major_order_prefers_v1beta_modern() {
        let catalog = AttemptCatalog::new(strings(&["model-a", "gemini-pro"]));
        assert_eq!(
            catalog.build(None),
            vec![
                Attempt::new(EndpointVersion::V1Beta, PayloadShape::Modern, "model-a"),
                Attempt::new(EndpointVersion::V1, PayloadShape::Modern, "model-a"),
                Attempt::new(EndpointVersion::V1Beta, PayloadShape::Modern, "gemini-pro"),
                Attempt::new(EndpointVersion::V1, PayloadShape::Modern, "gemini-pro"),
                Attempt::new(EndpointVersion::V1, PayloadShape::Legacy, "gemini-pro"),
            ]
        );
    }

    #[test]
    fn test_discovered_models_replace_static_list_after_filtering() {
        let catalog = AttemptCatalog::new(strings(&["static-model"]));
        let discovered = strings(&[
            "models/gemini-2.0-flash",
            "gemini-pro-vision",
            "gemini-1.5-flash-tuning",
            "gemini-2.0-flash",
        ]);

        let attempts = catalog.build(Some(discovered.as_slice()));
        let models: Vec<&str> = attempts.iter().map(|a| a.model_id.as_str()).collect();
        assert_eq!(models, vec!["gemini-2.0-flash", "gemini-2.0-flash"]);
    }

    #[test]
    fn test_discovery_with_only_unstable_models_falls_back() {
        let catalog = AttemptCatalog::new(strings(&["static-model"]));
        let attempts = catalog.build(Some(strings(&["gemini-pro-vision"]).as_slice()));
        assert_eq!(attempts[0].model_id, "static-model");
    }

    #[test]
    fn test_catalog_has_no_duplicates_and_is_stable() {
        let catalog = AttemptCatalog::new(strings(&["m", "m", "gemma-3", "m"]));
        let first = catalog.build(None);
        let second = catalog.build(None);
        assert_eq!(first, second);

        let unique: HashSet<_> = first.iter().cloned().collect();
        assert_eq!(unique.len(), first.len());
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_needs_legacy_shape() {
        assert!(needs_legacy_shape("gemini-pro"));
        assert!(needs_legacy_shape("gemini-1.0-pro-001"));
        assert!(needs_legacy_shape("gemma-3-27b-it"));
        assert!(!needs_legacy_shape("gemini-1.5-pro"));
        assert!(!needs_legacy_shape("gemini-2.5-flash"));
    }
}
