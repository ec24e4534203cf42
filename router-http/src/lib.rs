//! Outbound HTTP dispatch: builds and sends requests to upstream providers,
//! injecting auth headers and an optional system prompt, with a
//! per-user-message fan-out mode for providers that only accept one user
//! turn per call.

mod error;
mod executor;
mod payload;

pub use error::{HttpError, make_snippet};
pub use executor::{HttpExecutor, UpstreamBytes};
pub use payload::{prepend_system_prompt, split_by_user_message, user_message_indices};
