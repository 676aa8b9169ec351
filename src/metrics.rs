use std::sync::LazyLock;

use prometheus::register_int_counter_vec_with_registry;
use prometheus::{Encoder, IntCounterVec, Registry as PrometheusRegistry, TextEncoder};
use tracing::error;

use crate::error::Error;

pub static AUTH_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "auth_strategy_attempts_total",
        "Total number of authentication strategy attempts",
        &["strategy", "outcome"],
        &METRICS_PROVIDER.registry
    )
    .expect("Failed to register auth_strategy_attempts metric")
});

pub static SESSION_LOGINS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "auth_session_logins_total",
        "Total number of identities persisted to or removed from sessions",
        &["operation", "result"],
        &METRICS_PROVIDER.registry
    )
    .expect("Failed to register auth_session_logins metric")
});

pub static METRICS_PROVIDER: LazyLock<MetricsProvider> = LazyLock::new(MetricsProvider::new);

pub struct MetricsProvider {
    registry: PrometheusRegistry,
}

impl MetricsProvider {
    fn new() -> Self {
        Self {
            registry: PrometheusRegistry::new(),
        }
    }

    pub fn gather(&self) -> Result<(String, Vec<u8>), Error> {
        let mut buffer = vec![];
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer).map_err(|error| {
            error!("Unable to encode metrics: {error}");
            Error::Internal(format!("Unable to encode metrics: {error}"))
        })?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

/// Text exposition of every counter in the crate registry.
pub fn gather() -> Result<(String, Vec<u8>), Error> {
    METRICS_PROVIDER.gather()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_exposes_auth_counters() {
        AUTH_ATTEMPTS
            .with_label_values(&["local", "success"])
            .inc();
        SESSION_LOGINS.with_label_values(&["login", "success"]).inc();

        let (content_type, body) = gather().unwrap();
        let body = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("auth_strategy_attempts_total"));
        assert!(body.contains(r#"strategy="local""#));
        assert!(body.contains("auth_session_logins_total"));
    }
}
