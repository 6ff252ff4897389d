/// Operator-visible error events for problems that happen in the background.
///
/// Emitting never fails and never blocks the caller.
pub trait BackgroundErrorSink: Send + Sync {
    fn emit(&self, message: &str, entity_id: Option<i64>);
}

/// Writes events to the `background_error` tracing target.
#[derive(Debug, Clone, Default)]
pub struct TracingErrorSink;

impl BackgroundErrorSink for TracingErrorSink {
    fn emit(&self, message: &str, entity_id: Option<i64>) {
        tracing::error!(target: "background_error", entity_id = ?entity_id, "{}", message);
    }
}
