//! StatusProbe: one-shot reachability check for a single service
//!
//! HTTP-style services get a GET against their (normalised) URL; databases
//! and non-HTTP schemes get a raw TCP connect. Network conditions are not
//! errors: every outcome is classified straight into a `ServiceStatus`.
//! The probe has no side effects; callers persist the result.

use std::time::Duration;

use reqwest::{StatusCode, Url};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::ProbeConfig;
use crate::types::{MonitoredService, ServiceStatus, ServiceType};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid service URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// How a service is probed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    Http(Url),
    Tcp { host: String, port: u16 },
}

/// Reachability checker with bounded timeouts
#[derive(Debug, Clone)]
pub struct StatusProbe {
    http: reqwest::Client,
    http_timeout: Duration,
    tcp_timeout: Duration,
}

impl StatusProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        // 3xx must be observed, not followed
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            http_timeout: Duration::from_millis(config.http_timeout_ms),
            tcp_timeout: Duration::from_millis(config.tcp_timeout_ms),
        })
    }

    /// Same client with a different HTTP abort.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Probe one service.
    pub async fn probe(&self, service: &MonitoredService) -> ServiceStatus {
        let status = match probe_target(service) {
            Ok(ProbeTarget::Http(url)) => self.probe_http(&url).await,
            Ok(ProbeTarget::Tcp { host, port }) => self.probe_tcp(&host, port).await,
            Err(e) => {
                debug!(service = %service.name, error = %e, "Probe target could not be built");
                ServiceStatus::Error
            }
        };
        debug!(service = %service.name, status = %status, "Probe complete");
        status
    }

    /// GET `url`: 2xx-3xx Running, other responses and timeouts Unreachable,
    /// transport failures Stopped.
    pub async fn probe_http(&self, url: &Url) -> ServiceStatus {
        match tokio::time::timeout(self.http_timeout, self.http.get(url.clone()).send()).await {
            Err(_) => ServiceStatus::Unreachable,
            Ok(Ok(resp)) => classify_http_status(resp.status()),
            Ok(Err(e)) => classify_http_error(&e),
        }
    }

    /// Raw TCP connect: success Running, timeout Unreachable, refusal Stopped.
    pub async fn probe_tcp(&self, host: &str, port: u16) -> ServiceStatus {
        match tokio::time::timeout(self.tcp_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => ServiceStatus::Running,
            Ok(Err(_)) => ServiceStatus::Stopped,
            Err(_) => ServiceStatus::Unreachable,
        }
    }
}

pub fn classify_http_status(status: StatusCode) -> ServiceStatus {
    if status.is_success() || status.is_redirection() {
        ServiceStatus::Running
    } else {
        ServiceStatus::Unreachable
    }
}

fn classify_http_error(e: &reqwest::Error) -> ServiceStatus {
    if e.is_timeout() {
        ServiceStatus::Unreachable
    } else if e.is_builder() {
        ServiceStatus::Error
    } else {
        ServiceStatus::Stopped
    }
}

// ============================================================================
// Target Resolution
// ============================================================================

fn has_scheme(url: &str) -> bool {
    url.contains("://")
}

fn is_http_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Databases and non-HTTP schemes are probed over TCP, everything else over HTTP.
pub fn probe_target(service: &MonitoredService) -> Result<ProbeTarget, ProbeError> {
    let raw = service.url.trim();
    let tcp = service.service_type == ServiceType::Database || (has_scheme(raw) && !is_http_scheme(raw));
    if tcp {
        Ok(ProbeTarget::Tcp {
            host: tcp_host(raw),
            port: service.port,
        })
    } else {
        normalize_url(service).map(ProbeTarget::Http)
    }
}

/// Scheme-normalised URL with the service port (when non-standard) and
/// health-check path applied.
pub fn normalize_url(service: &MonitoredService) -> Result<Url, ProbeError> {
    let raw = service.url.trim();
    let with_scheme = if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let invalid = |reason: String| ProbeError::InvalidUrl {
        url: service.url.clone(),
        reason,
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    let standard = matches!((url.scheme(), service.port), ("http", 80) | ("https", 443));
    if url.port().is_none() && !standard && service.port != 0 {
        url.set_port(Some(service.port))
            .map_err(|()| invalid("cannot carry a port".to_string()))?;
    }

    if let Some(path) = service.health_check_path.as_deref().map(str::trim) {
        if !path.is_empty() {
            let path = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
            url.set_path(&path);
        }
    }

    Ok(url)
}

fn tcp_host(raw: &str) -> String {
    if has_scheme(raw) {
        if let Some(host) = Url::parse(raw).ok().and_then(|u| u.host_str().map(str::to_string)) {
            return host.trim_matches(|c| c == '[' || c == ']').to_string();
        }
    }
    let host = raw
        .split(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim();
    if host.is_empty() {
        "localhost".to_string()
    } else {
        host.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::Redirect;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    fn fast_probe() -> StatusProbe {
        StatusProbe::new(&ProbeConfig {
            http_timeout_ms: 300,
            tcp_timeout_ms: 300,
        })
        .expect("client")
    }

    async fn serve() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/moved", get(|| async { Redirect::temporary("/health") }))
            .route("/broken", get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        port
    }

    fn http_service(port: u16, path: &str) -> MonitoredService {
        let mut svc = MonitoredService::new(1, "web", "127.0.0.1", port).with_type(ServiceType::Frontend);
        svc.health_check_path = Some(path.to_string());
        svc
    }

    #[test]
    fn test_normalize_adds_scheme_port_and_path() {
        let mut svc = MonitoredService::new(1, "api", "localhost", 8080);
        svc.health_check_path = Some("healthz".to_string());
        let url = normalize_url(&svc).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/healthz");
    }

    #[test]
    fn test_normalize_keeps_standard_and_explicit_ports() {
        let svc = MonitoredService::new(1, "site", "https://example.com", 443);
        assert_eq!(normalize_url(&svc).expect("url").as_str(), "https://example.com/");

        let svc = MonitoredService::new(1, "site", "http://example.com:9000", 8080);
        assert_eq!(normalize_url(&svc).expect("url").port(), Some(9000));
    }

    #[test]
    fn test_database_and_foreign_schemes_use_tcp() {
        let db = MonitoredService::new(1, "pg", "db.internal", 5432).with_type(ServiceType::Database);
        assert_eq!(
            probe_target(&db).expect("target"),
            ProbeTarget::Tcp { host: "db.internal".to_string(), port: 5432 }
        );

        let redis = MonitoredService::new(2, "cache", "redis://cache.local:6379", 6379);
        assert_eq!(
            probe_target(&redis).expect("target"),
            ProbeTarget::Tcp { host: "cache.local".to_string(), port: 6379 }
        );
    }

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(classify_http_status(StatusCode::OK), ServiceStatus::Running);
        assert_eq!(classify_http_status(StatusCode::FOUND), ServiceStatus::Running);
        assert_eq!(classify_http_status(StatusCode::NOT_FOUND), ServiceStatus::Unreachable);
        assert_eq!(classify_http_status(StatusCode::BAD_GATEWAY), ServiceStatus::Unreachable);
    }

    #[tokio::test]
    async fn test_http_outcomes() {
        let port = serve().await;
        let probe = fast_probe();
        assert_eq!(probe.probe(&http_service(port, "/health")).await, ServiceStatus::Running);
        assert_eq!(probe.probe(&http_service(port, "/moved")).await, ServiceStatus::Running);
        assert_eq!(probe.probe(&http_service(port, "/broken")).await, ServiceStatus::Unreachable);
        assert_eq!(probe.probe(&http_service(port, "/slow")).await, ServiceStatus::Unreachable);
    }

    #[tokio::test]
    async fn test_tcp_outcomes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let open = listener.local_addr().expect("addr").port();
        let probe = fast_probe();
        assert_eq!(probe.probe_tcp("127.0.0.1", open).await, ServiceStatus::Running);

        drop(listener);
        assert_eq!(probe.probe_tcp("127.0.0.1", open).await, ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_refused_http_is_stopped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        assert_eq!(fast_probe().probe(&http_service(port, "/")).await, ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_unparseable_url_is_error() {
        let svc = MonitoredService::new(1, "bad", "http://", 80);
        assert_eq!(fast_probe().probe(&svc).await, ServiceStatus::Error);
    }
}
