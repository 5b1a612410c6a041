//! Metrics recorder initialization and configuration.

use anyhow::Result;
use tracing::info;

/// Handle to the metrics system, providing access to exported metrics.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle.render()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    pub enabled: bool,
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system.
///
/// Should be called once at application startup. When the `prometheus`
/// feature is enabled, this installs the Prometheus exporter; otherwise
/// metrics calls are no-ops.
///
/// # Errors
///
/// Returns an error if the underlying exporter fails to install.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection disabled");
        return Ok(MetricsHandle {
            #[cfg(feature = "prometheus")]
            prometheus_handle: install_prometheus(Vec::new())?,
        });
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = install_prometheus(config.global_labels)?;
        info!("prometheus metrics exporter initialized");
        Ok(MetricsHandle { prometheus_handle: handle })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle {})
    }
}

#[cfg(feature = "prometheus")]
fn install_prometheus(
    global_labels: Vec<(String, String)>,
) -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    use crate::buckets;
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let mut builder = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("_duration_seconds".to_string()), &buckets::HTTP_DURATION)?
        .set_buckets_for_metric(Matcher::Prefix("conflux_llm_call".to_string()), &buckets::LLM_DURATION)?
        .set_buckets_for_metric(Matcher::Full(crate::orchestration::LEG_DURATION_SECONDS.to_string()), &buckets::LEG_DURATION)?;

    for (key, value) in global_labels {
        builder = builder.add_global_label(key, value);
    }

    Ok(builder.install_recorder()?)
}
