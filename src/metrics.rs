use prometheus::{Encoder, TextEncoder};

use crate::errors::ServiceError;

/// Renders every metric registered against the default prometheus registry
/// in text exposition format. Counters register themselves lazily from the
/// services that own them.
pub async fn metrics_handler() -> Result<String, ServiceError> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ServiceError::InternalError(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| ServiceError::InternalError(format!("Metrics are not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handler_produces_text_exposition() {
        let body = metrics_handler().await.expect("metrics should encode");
        // Encoding an empty registry is valid; with counters registered the
        // body carries HELP/TYPE lines.
        assert!(body.is_empty() || body.contains("# "));
    }
}
