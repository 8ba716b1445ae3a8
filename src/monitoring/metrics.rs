//! Prometheus counters, compiled in with the `metrics` feature. Without it
//! every recorder is a no-op.

#[cfg(feature = "metrics")]
mod prom {
    use prometheus::{IntCounterVec, Opts, Registry};
    use std::sync::OnceLock;

    pub struct Metrics {
        pub registry: Registry,
        pub read_failures: IntCounterVec,
        pub submissions: IntCounterVec,
    }

    fn build() -> prometheus::Result<Metrics> {
        let registry = Registry::new();
        let read_failures = IntCounterVec::new(
            Opts::new("phantom_read_failures_total", "Suppressed contract read failures"),
            &["method"],
        )?;
        let submissions = IntCounterVec::new(
            Opts::new("phantom_submissions_total", "Position submissions by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(read_failures.clone()))?;
        registry.register(Box::new(submissions.clone()))?;

        Ok(Metrics {
            registry,
            read_failures,
            submissions,
        })
    }

    pub fn get() -> Option<&'static Metrics> {
        static METRICS: OnceLock<Option<Metrics>> = OnceLock::new();
        METRICS
            .get_or_init(|| match build() {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    tracing::error!("Failed to register metrics: {}", e);
                    None
                }
            })
            .as_ref()
    }
}

pub fn record_read_failure(method: &str) {
    #[cfg(feature = "metrics")]
    {
        if let Some(m) = prom::get() {
            m.read_failures.with_label_values(&[method]).inc();
        }
    }
    #[cfg(not(feature = "metrics"))]
    {
        let _ = method;
    }
}

pub fn record_submission(outcome: &str) {
    #[cfg(feature = "metrics")]
    {
        if let Some(m) = prom::get() {
            m.submissions.with_label_values(&[outcome]).inc();
        }
    }
    #[cfg(not(feature = "metrics"))]
    {
        let _ = outcome;
    }
}

/// Registry holding every counter, for an exporter to scrape.
#[cfg(feature = "metrics")]
pub fn registry() -> Option<&'static prometheus::Registry> {
    prom::get().map(|m| &m.registry)
}
