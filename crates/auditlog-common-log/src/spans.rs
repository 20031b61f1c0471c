//! Span helpers.

use tracing::{info_span, Span};

/// Span covering one unit of work, from first capture to flush.
pub fn unit_of_work_span(id: &str, actor: &str) -> Span {
    info_span!(
        "unit_of_work",
        id = %id,
        actor = %actor,
        error = tracing::field::Empty
    )
}

/// Span covering a rebuild of the cached audit policy.
pub fn policy_rebuild_span(generation: u64) -> Span {
    info_span!(
        "policy_rebuild",
        generation,
        error = tracing::field::Empty
    )
}

/// Span covering persistence of one unit of work's record trees.
pub fn flush_span(trees: usize, records: usize) -> Span {
    info_span!(
        "audit_flush",
        trees,
        records,
        error = tracing::field::Empty
    )
}

/// Record an error on the current span's `error` field.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", tracing::field::display(error));
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Complete the timer and record duration.
    pub fn finish(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %duration.as_millis(),
            "operation completed"
        );
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;

    fn with_subscriber<F>(f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(EnvFilter::new("trace"))
            .finish();

        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_nested_spans() {
        with_subscriber(|| {
            let uow = unit_of_work_span("uow_1", "admin");
            let _outer = uow.enter();
            let flush = flush_span(1, 4);
            let _inner = flush.enter();
            tracing::info!("flushing");
        });
    }

    #[test]
    fn test_record_error_on_span() {
        with_subscriber(|| {
            let span = policy_rebuild_span(3);
            let _guard = span.enter();
            let error = std::io::Error::new(std::io::ErrorKind::Other, "store unavailable");
            record_error(&error);
        });
    }

    #[test]
    fn test_timer_reports_elapsed() {
        let timer = Timer::start("sleep");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.finish() >= std::time::Duration::from_millis(5));
    }
}
