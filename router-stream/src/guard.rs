/// RAII replacement for the Python implementation's
/// `contextlib.contextmanager`-wrapped `finally` block: guarantees the
/// pipeline's release callback runs exactly once, on whichever exit path the
/// stream takes — normal completion, an upstream error, or the consumer
/// dropping the stream early (client disconnect).
///
/// The release callback is synchronous by construction: async release work
/// (releasing a provider lock through the coordination store) is spawned
/// onto the ambient Tokio runtime from inside the closure, since `Drop`
/// cannot itself be `async`.
pub struct ReleaseGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ReleaseGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A guard that releases nothing — for call sites that already released
    /// up front (the fake-acquire path).
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
