//! Scrape Handlers
//!
//! The real handler encodes a registry in the Prometheus text format;
//! the dummy handler answers every request with an empty 200.
//!
//! Gathering runs on the blocking pool: collectors are synchronous and
//! may be slow, and the runtime workers must stay free to enforce the
//! shutdown grace period.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prometheus::proto::{MetricFamily, MetricType};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::warn;

/// State behind a real scrape route.
pub struct ScrapeState {
    pub registry: Registry,
    /// Skip families that fail validation or encoding instead of failing the scrape.
    pub ignore_errors: bool,
}

/// Liveness-style endpoint: 200, no body, no metrics.
pub async fn dummy() -> StatusCode {
    StatusCode::OK
}

pub async fn scrape(State(state): State<Arc<ScrapeState>>) -> Response {
    let registry = state.registry.clone();
    let ignore_errors = state.ignore_errors;

    let outcome = tokio::task::spawn_blocking(move || encode(&registry, ignore_errors))
        .await
        .unwrap_or_else(|err| Err(prometheus::Error::Msg(format!("scrape task failed: {err}"))));

    match outcome {
        Ok(body) => ([(CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            warn!(error = %err, "Scrape failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("error gathering metrics: {err}"),
            )
                .into_response()
        }
    }
}

/// Validate and encode every gathered family, one at a time.
///
/// A family that fails leaves no partial output behind.
pub fn encode(registry: &Registry, ignore_errors: bool) -> prometheus::Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let mut body = Vec::new();

    for family in registry.gather() {
        let mut chunk = Vec::new();
        let outcome = check_family(&family)
            .and_then(|()| encoder.encode(std::slice::from_ref(&family), &mut chunk));

        match outcome {
            Ok(()) => body.extend_from_slice(&chunk),
            Err(err) if ignore_errors => {
                warn!(
                    metric = family.get_name(),
                    error = %err,
                    "Skipping metric family that failed to gather"
                );
            }
            Err(err) => return Err(err),
        }
    }

    Ok(body)
}

/// `Registry::gather` merges same-named families from different
/// collectors without checking them. Reject samples whose value kind
/// differs from the family type and label sets that repeat.
fn check_family(family: &MetricFamily) -> prometheus::Result<()> {
    let kind = family.get_field_type();
    let mut seen = HashSet::with_capacity(family.get_metric().len());

    for metric in family.get_metric() {
        let matches_kind = match kind {
            MetricType::COUNTER => metric.has_counter(),
            MetricType::GAUGE => metric.has_gauge(),
            MetricType::SUMMARY => metric.has_summary(),
            MetricType::UNTYPED => metric.has_untyped(),
            MetricType::HISTOGRAM => metric.has_histogram(),
        };
        if !matches_kind {
            return Err(prometheus::Error::Msg(format!(
                "metric {} has type {kind:?} but carries a sample of another type",
                family.get_name()
            )));
        }

        let mut labels: Vec<(&str, &str)> = metric
            .get_label()
            .iter()
            .map(|pair| (pair.get_name(), pair.get_value()))
            .collect();
        labels.sort_unstable();
        if seen.contains(&labels) {
            return Err(prometheus::Error::Msg(format!(
                "metric {} was collected twice with labels {labels:?}",
                family.get_name()
            )));
        }
        seen.insert(labels);
    }

    Ok(())
}
