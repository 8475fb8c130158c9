//! HTTP delivery client

use crate::config::CollectorConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use habitat_shared::{codec, DeliveryOutcome};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sends one encoded record and reports what happened
#[async_trait]
pub trait Deliverer: Send + Sync {
    /// Deliver `record` for `sample_name`. At most one attempt is made.
    async fn deliver(&self, sample_name: &str, record: Bytes) -> DeliveryOutcome;
}

/// Posts records to the collector endpoint
pub struct HttpDelivery {
    endpoint: Url,
    accept_status: u16,
    request_timeout: Duration,
    accept_invalid_certs: bool,
}

impl HttpDelivery {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .with_context(|| format!("invalid collector endpoint '{}'", config.endpoint))?;

        Ok(Self {
            endpoint,
            accept_status: config.accept_status,
            request_timeout: config.request_timeout(),
            accept_invalid_certs: config.accept_invalid_certs,
        })
    }

    /// Fresh client with no connection pool, so every delivery starts from
    /// a clean connection that is closed when the client is dropped
    fn connect(&self) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(self.request_timeout)
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
    }
}

#[async_trait]
impl Deliverer for HttpDelivery {
    async fn deliver(&self, sample_name: &str, record: Bytes) -> DeliveryOutcome {
        let client = match self.connect() {
            Ok(client) => client,
            Err(e) => {
                warn!("[POST] {}: cannot create client: {}", sample_name, e);
                return DeliveryOutcome::failed(sample_name);
            }
        };

        debug!("[POST] {}: {} bytes to {}", sample_name, record.len(), self.endpoint);

        let result = client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, codec::CONTENT_TYPE)
            .body(record)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                info!("[POST] {}: HTTP {} - {}", sample_name, status, body.trim());
                DeliveryOutcome::responded(sample_name, status, self.accept_status)
            }
            Err(e) => {
                warn!("[POST] {}: delivery failed: {}", sample_name, e);
                DeliveryOutcome::failed(sample_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(String, Bytes)>>>;

    async fn spawn_collector(status: StatusCode, delay: Duration) -> (SocketAddr, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let handler_seen = seen.clone();

        let app = Router::new().route(
            "/api/sensor",
            post(move |headers: HeaderMap, body: Bytes| {
                let seen = handler_seen.clone();
                async move {
                    let content_type = headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().await.push((content_type, body));
                    tokio::time::sleep(delay).await;
                    (status, "{\"status\":\"ok\"}")
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, seen)
    }

    fn client_for(addr: SocketAddr, timeout_ms: u64) -> HttpDelivery {
        HttpDelivery::new(&CollectorConfig {
            endpoint: format!("http://{}/api/sensor", addr),
            request_timeout_ms: timeout_ms,
            ..Default::default()
        })
        .unwrap()
    }

    fn record() -> Bytes {
        Bytes::from_static(br#"{"sensor":"Office","temp":72.3,"humidity":41.0}"#)
    }

    #[tokio::test]
    async fn test_accepted_delivery() {
        let (addr, seen) = spawn_collector(StatusCode::OK, Duration::ZERO).await;
        let client = client_for(addr, 5_000);

        let outcome = client.deliver("Office", record()).await;
        assert_eq!(outcome, DeliveryOutcome::responded("Office", 200, 200));
        assert!(outcome.succeeded);

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "application/json");
        assert_eq!(seen[0].1, record());
    }

    #[tokio::test]
    async fn test_rejected_status_is_failure() {
        let (addr, _) = spawn_collector(StatusCode::INTERNAL_SERVER_ERROR, Duration::ZERO).await;
        let client = client_for(addr, 5_000);

        let outcome = client.deliver("Office", record()).await;
        assert!(outcome.attempted);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.status_code, Some(500));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let client = client_for(addr, 5_000);

        let outcome = client.deliver("Office", record()).await;
        assert_eq!(outcome, DeliveryOutcome::failed("Office"));
    }

    #[tokio::test]
    async fn test_slow_collector_times_out() {
        let (addr, _) = spawn_collector(StatusCode::OK, Duration::from_secs(5)).await;
        let client = client_for(addr, 200);

        let outcome = client.deliver("Office", record()).await;
        assert!(outcome.attempted);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.status_code, None);
    }

    #[tokio::test]
    async fn test_each_delivery_is_independent() {
        let (addr, seen) = spawn_collector(StatusCode::OK, Duration::ZERO).await;
        let client = client_for(addr, 5_000);

        for name in ["Avicularia Avicularia", "Red Knee", "Office Sensor"] {
            let outcome = client.deliver(name, record()).await;
            assert!(outcome.succeeded, "{} should succeed", name);
            assert_eq!(outcome.sample_name, name);
        }
        assert_eq!(seen.lock().await.len(), 3);
    }
}
