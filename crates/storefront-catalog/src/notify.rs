//! User-facing notification surface.

/// Receives failures worth showing to the user. Cancellations never reach it.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        tracing::warn!(target: "storefront::notify", "{message}");
    }
}
