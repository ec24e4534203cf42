use regex::Regex;
use serde_json::Value;

use crate::traits::MaskerPlugin;

/// Recursively walks a payload's objects, arrays, and strings, replacing
/// every match of the configured patterns with a placeholder. Stands in for
/// the real PII rule set (`llm_router_plugins/maskers/fast_masker`), whose
/// actual patterns are plugin internals out of scope here.
pub struct RegexMasker {
    patterns: Vec<Regex>,
    placeholder: String,
}

impl RegexMasker {
    pub fn new(patterns: Vec<Regex>, placeholder: impl Into<String>) -> Self {
        Self {
            patterns,
            placeholder: placeholder.into(),
        }
    }

    fn mask_str(&self, s: &str) -> Option<String> {
        let mut changed = false;
        let mut out = s.to_string();
        for pattern in &self.patterns {
            if pattern.is_match(&out) {
                out = pattern.replace_all(&out, self.placeholder.as_str()).into_owned();
                changed = true;
            }
        }
        changed.then_some(out)
    }

    fn mask_value(&self, value: &mut Value) -> bool {
        match value {
            Value::String(s) => {
                if let Some(masked) = self.mask_str(s) {
                    *s = masked;
                    true
                } else {
                    false
                }
            }
            Value::Array(items) => items.iter_mut().fold(false, |acc, item| self.mask_value(item) || acc),
            Value::Object(map) => map
                .values_mut()
                .fold(false, |acc, item| self.mask_value(item) || acc),
            _ => false,
        }
    }
}

impl MaskerPlugin for RegexMasker {
    fn mask(&self, payload: &mut Value) -> bool {
        self.mask_value(payload)
    }
}
