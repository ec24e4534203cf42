use serde::Serialize;

use router_config::ModelConfig;

/// The normalized shape shared by `/api/tags`, `/v1/models`, and
/// `/api/v0/models` — each family's handler reshapes this into its own
/// exact JSON envelope rather than duplicating the active-model walk.
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub family: String,
}

/// Every active model across every family, flattened in family-then-name
/// order for a stable listing.
pub fn tags(config: &ModelConfig) -> Vec<ModelDescriptor> {
    let mut families: Vec<&str> = config.families().collect();
    families.sort_unstable();

    let active = config.active_models();
    let mut out = Vec::new();
    for family in families {
        let Some(models) = active.get(family) else {
            continue;
        };
        let mut names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        names.sort_unstable();
        for name in names {
            out.push(ModelDescriptor {
                name: name.to_string(),
                family: family.to_string(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> ModelConfig {
        ModelConfig::from_str(
            r#"{
                "chat": {
                    "m1": { "providers": [{ "id": "p1", "api_host": "http://up1", "api_type": "ollama" }] },
                    "m2": { "providers": [{ "id": "p1", "api_host": "http://up2", "api_type": "ollama" }] }
                },
                "active_models": { "chat": ["m2", "m1"] }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn tags_lists_active_models_sorted_within_family() {
        let cfg = fixture();
        let listed = tags(&cfg);
        let names: Vec<&str> = listed.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["m1", "m2"]);
    }
}
