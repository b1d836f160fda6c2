//! Detector service HTTP client.

use std::time::Duration;

use kennelcam_models::RawDetection;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{DetectorError, DetectorResult};
use crate::types::{DetectResponse, HealthResponse};

/// Longest wait between two attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Configuration for the detector client.
#[derive(Debug, Clone)]
pub struct DetectorClientConfig {
    /// Base URL of the detector service
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Max retries per frame
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further attempt
    pub retry_backoff: Duration,
}

impl Default for DetectorClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_millis(2000),
            max_retries: 1,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

impl DetectorClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_url: std::env::var("DETECTOR_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout: std::env::var("DETECTOR_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("DETECTOR_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_backoff: defaults.retry_backoff,
        }
    }
}

/// Client for the detector service.
pub struct DetectorClient {
    http: Client,
    config: DetectorClientConfig,
}

impl DetectorClient {
    /// Create a new detector client.
    pub fn new(config: DetectorClientConfig) -> DetectorResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectorError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DetectorResult<Self> {
        Self::new(DetectorClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check if the detector service is healthy.
    pub async fn health_check(&self) -> DetectorResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health = response
                    .bytes()
                    .await
                    .map_err(DetectorError::Network)
                    .and_then(|body| parse_health(&body));
                match health {
                    Ok(health) => Ok(health.is_healthy()),
                    Err(e) => {
                        warn!(error = %e, "Detector health check returned an unreadable body");
                        Ok(false)
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "Detector health check failed");
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "Detector health check error");
                Ok(false)
            }
        }
    }

    /// Run detection on one JPEG-encoded frame.
    pub async fn detect(&self, jpeg: &[u8]) -> DetectorResult<Vec<RawDetection>> {
        let url = format!("{}/detect", self.config.base_url);

        debug!(url = %url, bytes = jpeg.len(), "Sending detection request");

        let url = url.as_str();
        let response = self
            .with_retry(|| async move {
                let response = self
                    .http
                    .post(url)
                    .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
                    .body(jpeg.to_vec())
                    .send()
                    .await
                    .map_err(|e| self.map_send_error(e))?;

                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                if is_unavailable_status(status) {
                    Err(DetectorError::ServiceUnavailable(format!(
                        "detector returned {}: {}",
                        status, body
                    )))
                } else {
                    Err(DetectorError::RequestFailed(format!(
                        "detector returned {}: {}",
                        status, body
                    )))
                }
            })
            .await?;

        let body = response.bytes().await?;
        let parsed: DetectResponse = serde_json::from_slice(&body)
            .map_err(|e| DetectorError::InvalidResponse(e.to_string()))?;

        debug!(
            detections = parsed.detections.len(),
            inference_ms = parsed.inference_ms,
            "Detection response received"
        );
        Ok(parsed.detections)
    }

    fn map_send_error(&self, error: reqwest::Error) -> DetectorError {
        if error.is_timeout() {
            DetectorError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            DetectorError::Network(error)
        }
    }

    /// Backoff before retry number `attempt + 1`, doubling up to a ceiling.
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.config
            .retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_RETRY_DELAY)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> DetectorResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = DetectorResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Detector request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(DetectorError::RequestFailed("Unknown error".to_string())))
    }
}

fn parse_health(body: &[u8]) -> DetectorResult<HealthResponse> {
    serde_json::from_slice(body).map_err(|e| DetectorError::InvalidResponse(e.to_string()))
}

fn is_unavailable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, max_retries: u32) -> DetectorClient {
        DetectorClient::new(DetectorClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(2),
            max_retries,
            retry_backoff: Duration::from_millis(1),
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = DetectorClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_millis(2000));
        assert_eq!(config.max_retries, 1);
    }

    #[tokio::test]
    async fn test_detect_parses_detections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .and(header("content-type", "image/jpeg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "detections": [
                    {"xmin": 1.0, "ymin": 2.0, "xmax": 51.0, "ymax": 62.0, "confidence": 0.9, "name": "dog"},
                    {"xmin": 100.0, "ymin": 20.0, "xmax": 150.0, "ymax": 160.0, "confidence": 0.6, "name": "person"}
                ],
                "inference_ms": 12.5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let detections = client_for(&server, 0).detect(b"jpeg").await.unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].name, "dog");
        assert_eq!(detections[1].xmax, 150.0);
    }

    #[tokio::test]
    async fn test_detect_retries_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"detections": []})),
            )
            .mount(&server)
            .await;

        let detections = client_for(&server, 1).detect(b"jpeg").await.unwrap();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn test_detect_gives_up_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server, 2).detect(b"jpeg").await.unwrap_err();
        assert!(matches!(err, DetectorError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_detect_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(400).set_body_string("not a jpeg"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, 3).detect(b"png").await.unwrap_err();
        assert!(matches!(err, DetectorError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_detect_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server, 0).detect(b"jpeg").await.unwrap_err();
        assert!(matches!(err, DetectorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "healthy"})),
            )
            .mount(&server)
            .await;

        assert!(client_for(&server, 0).health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check_plain_text_body_is_not_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .expect(1)
            .mount(&server)
            .await;

        assert!(!client_for(&server, 3).health_check().await.unwrap());
    }

    #[test]
    fn test_unreadable_health_body_not_retryable() {
        let err = parse_health(b"OK").unwrap_err();
        assert!(matches!(err, DetectorError::InvalidResponse(_)));
        assert!(!err.is_retryable());

        let health = parse_health(br#"{"status": "ok"}"#).unwrap();
        assert!(health.is_healthy());
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let client = DetectorClient::new(DetectorClientConfig {
            retry_backoff: Duration::from_millis(100),
            max_retries: 40,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(client.retry_delay(0), Duration::from_millis(100));
        assert_eq!(client.retry_delay(2), Duration::from_millis(400));
        assert_eq!(client.retry_delay(31), MAX_RETRY_DELAY);
        assert_eq!(client.retry_delay(39), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let client = DetectorClient::new(DetectorClientConfig {
            base_url: uri,
            ..Default::default()
        })
        .unwrap();
        assert!(!client.health_check().await.unwrap());
    }

    #[test]
    fn test_unavailable_statuses() {
        assert!(is_unavailable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_unavailable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_unavailable_status(StatusCode::BAD_REQUEST));
    }
}
