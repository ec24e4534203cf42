use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{ConfigError, Result};
use crate::provider::{Model, Provider};

#[derive(Debug, Deserialize)]
struct RawModelEntry {
    providers: Vec<Provider>,
}

/// The whole registry: family → model name → Model, plus the subset of
/// models actually exposed by `/models`-style endpoints.
///
/// Loaded once at startup from a JSON document (see the module-level docs
/// for the exact shape). Reread is out of scope; callers hold this behind
/// an `Arc` and share it freely — it is immutable after [`ModelConfig::load`].
#[derive(Debug, Clone)]
pub struct ModelConfig {
    families: HashMap<String, HashMap<String, Model>>,
    active_models: HashMap<String, Vec<String>>,
}

impl ModelConfig {
    /// Loads and validates a config file from disk.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&text)
    }

    /// Parses and validates a config document already in memory.
    pub fn from_str(text: &str) -> Result<Self> {
        let root: serde_json::Value = serde_json::from_str(text)?;
        let mut root = match root {
            serde_json::Value::Object(map) => map,
            _ => return Err(ConfigError::NotAnObject),
        };

        let active_raw = root.remove("active_models");
        let active_models: HashMap<String, Vec<String>> = match active_raw {
            Some(v) => serde_json::from_value(v)?,
            None => HashMap::new(),
        };

        let mut families: HashMap<String, HashMap<String, Model>> = HashMap::new();
        for (family_name, family_value) in root {
            let raw_models: HashMap<String, RawModelEntry> =
                serde_json::from_value(family_value)?;
            let mut models = HashMap::with_capacity(raw_models.len());
            for (model_name, entry) in raw_models {
                let mut seen_ids = std::collections::HashSet::new();
                for p in &entry.providers {
                    if p.api_host.trim().is_empty() {
                        return Err(ConfigError::MissingApiHost {
                            family: family_name.clone(),
                            model: model_name.clone(),
                            id: p.id.clone(),
                        });
                    }
                    if !seen_ids.insert(p.id.clone()) {
                        return Err(ConfigError::DuplicateProviderId {
                            family: family_name.clone(),
                            model: model_name.clone(),
                            id: p.id.clone(),
                        });
                    }
                }
                if entry.providers.is_empty() {
                    return Err(ConfigError::EmptyModel {
                        family: family_name.clone(),
                        model: model_name.clone(),
                    });
                }
                models.insert(
                    model_name.clone(),
                    Model {
                        name: model_name,
                        family: family_name.clone(),
                        providers: entry.providers,
                    },
                );
            }
            families.insert(family_name, models);
        }

        for (family_name, names) in &active_models {
            let Some(models) = families.get(family_name) else {
                return Err(ConfigError::UnknownActiveModel {
                    family: family_name.clone(),
                    model: names.first().cloned().unwrap_or_default(),
                });
            };
            for name in names {
                if !models.contains_key(name) {
                    return Err(ConfigError::UnknownActiveModel {
                        family: family_name.clone(),
                        model: name.clone(),
                    });
                }
            }
        }

        info!(
            families = families.len(),
            active = active_models.values().map(Vec::len).sum::<usize>(),
            "model config loaded"
        );

        Ok(Self {
            families,
            active_models,
        })
    }

    /// Looks up a model by its logical name, across all families.
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.families.values().find_map(|m| m.get(name))
    }

    /// All models considered "active" (exposed by `/models`-style endpoints),
    /// grouped by family.
    pub fn active_models(&self) -> HashMap<&str, Vec<&Model>> {
        let mut out = HashMap::new();
        for (family, names) in &self.active_models {
            let Some(models) = self.families.get(family) else {
                continue;
            };
            let list = names.iter().filter_map(|n| models.get(n)).collect();
            out.insert(family.as_str(), list);
        }
        out
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    /// Every configured model across every family, active or not — used to
    /// seed the health monitor's registry at startup.
    pub fn all_providers(&self) -> impl Iterator<Item = &Model> {
        self.families.values().flat_map(|models| models.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> &'static str {
        r#"{
            "chat": {
                "m1": { "providers": [
                    { "id": "p1", "api_host": "http://up1", "api_type": "ollama", "enabled": true, "order": 0 },
                    { "id": "p2", "api_host": "http://up2", "api_type": "ollama", "enabled": false, "order": 1 }
                ]},
                "m2": { "providers": [
                    { "id": "p1", "api_host": "http://up3", "api_type": "openai", "enabled": true, "order": 0 }
                ]}
            },
            "active_models": { "chat": ["m1"] }
        }"#
    }

    #[test]
    fn loads_and_validates_fixture() {
        let cfg = ModelConfig::from_str(fixture()).expect("valid fixture");
        let m1 = cfg.model("m1").expect("m1 present");
        assert_eq!(m1.providers.len(), 2);
        assert_eq!(m1.enabled_providers().len(), 1);
        let active = cfg.active_models();
        assert_eq!(active.get("chat").unwrap().len(), 1);
    }

    #[test]
    fn rejects_unknown_active_model() {
        let bad = r#"{
            "chat": { "m1": { "providers": [
                { "id": "p1", "api_host": "http://up1", "api_type": "ollama" }
            ]}},
            "active_models": { "chat": ["does-not-exist"] }
        }"#;
        let err = ModelConfig::from_str(bad).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownActiveModel { .. }));
    }

    #[test]
    fn rejects_provider_missing_host() {
        let bad = r#"{
            "chat": { "m1": { "providers": [
                { "id": "p1", "api_host": "", "api_type": "ollama" }
            ]}},
            "active_models": {}
        }"#;
        let err = ModelConfig::from_str(bad).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiHost { .. }));
    }

    #[test]
    fn all_providers_covers_every_model_not_just_active_ones() {
        let cfg = ModelConfig::from_str(fixture()).expect("valid fixture");
        let names: Vec<&str> = cfg.all_providers().map(|m| m.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"m1"));
        assert!(names.contains(&"m2"));
    }

    #[test]
    fn rejects_empty_model() {
        let bad = r#"{
            "chat": { "m1": { "providers": [] } },
            "active_models": {}
        }"#;
        let err = ModelConfig::from_str(bad).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyModel { .. }));
    }
}
