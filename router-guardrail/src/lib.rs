//! Pipeline contract for guardrail/masker/utils plugins. The proxy pipeline
//! depends only on these traits, never on a concrete plugin — rule
//! internals (PII patterns, classifier models, ...) are out of scope here.

mod error;
mod noop;
mod regex_masker;
mod traits;

pub use error::{GuardrailError, UtilsError};
pub use noop::NoopGuardrail;
pub use regex_masker::RegexMasker;
pub use traits::{GuardrailPlugin, GuardrailVerdict, MaskerPlugin, UtilsPlugin};
