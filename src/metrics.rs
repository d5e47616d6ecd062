use tracing::trace;

// Trace-based counters only; this stays a flat-file CLI, so no metrics
// backend is wired in.

pub fn products_fetched(count: usize) {
    trace!(target = "calliope.metrics", count, "products_fetched");
}

pub fn generation_elapsed(subject: &str, elapsed_ms: u128) {
    trace!(
        target = "calliope.metrics",
        subject,
        elapsed_ms = elapsed_ms as u64,
        "generation_elapsed"
    );
}
