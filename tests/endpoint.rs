/// End-to-end tests for the HTTP endpoint.
///
/// Each test binds the server to an ephemeral port, points it at a mocked
/// IP-API upstream and talks to it with a plain HTTP client.
use ipgeocache::server::{self, AppState, CONTENT_TYPE_VALUE};
use ipgeocache::{AccessGate, CachePolicy, DayStore, FsStore, GeoService, IpApiResolver};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Croqujs/1.4.0 Chrome/83.0 Electron/9.1.0 Safari/537.36";

async fn start(upstream: &MockServer, cache: &TempDir, forwarded_header: Option<&str>) -> SocketAddr {
    let resolver = IpApiResolver::new(upstream.uri(), None).unwrap();
    let service = GeoService::new(
        Arc::new(FsStore::new(cache.path())),
        Arc::new(resolver),
        AccessGate::default(),
        CachePolicy::default(),
    );
    let state = AppState {
        service: Arc::new(service),
        forwarded_header: forwarded_header.map(str::to_string),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve_on(listener, state));
    addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_and_cache() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/203.0.113.7"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status":"success","lat":51.5074,"lon":-0.1278}"#,
            ))
            .expect(1)
            .mount(&upstream)
            .await;
        let cache = TempDir::new().unwrap();
        let addr = start(&upstream, &cache, Some("x-forwarded-for")).await;

        let client = reqwest::Client::new();
        for _ in 0..2 {
            let response = client
                .get(format!("http://{}/", addr))
                .header("user-agent", UA)
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
            assert_eq!(
                response.headers().get("content-type").unwrap().to_str().unwrap(),
                CONTENT_TYPE_VALUE
            );
            assert_eq!(response.text().await.unwrap(), r#"{"lat":52,"lon":0}"#);
        }

        let store = FsStore::new(cache.path());
        assert_eq!(store.list_days().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_any_method_and_v1_path() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status":"success","lat":1.2,"lon":3.4}"#,
            ))
            .mount(&upstream)
            .await;
        let cache = TempDir::new().unwrap();
        let addr = start(&upstream, &cache, Some("x-forwarded-for")).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/v1/", addr))
            .header("user-agent", UA)
            .header("x-forwarded-for", "::ffff:192.168.1.1")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), r#"{"lat":1,"lon":3}"#);
    }

    #[tokio::test]
    async fn test_rejected_user_agent_is_404() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;
        let cache = TempDir::new().unwrap();
        let addr = start(&upstream, &cache, Some("x-forwarded-for")).await;

        let response = reqwest::Client::new()
            .get(format!("http://{}/", addr))
            .header("user-agent", "curl/8.0")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
        assert!(response.text().await.unwrap().is_empty());
        assert!(std::fs::read_dir(cache.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_upstream_failure_returns_null() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"fail"}"#))
            .mount(&upstream)
            .await;
        let cache = TempDir::new().unwrap();
        // without a forwarded header the peer address (127.0.0.1) is used
        let addr = start(&upstream, &cache, None).await;

        let response = reqwest::Client::new()
            .get(format!("http://{}/", addr))
            .header("user-agent", UA)
            .header("x-forwarded-for", "203.0.113.7")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "null");

        let requests = upstream.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.path(), "/json/127.0.0.1");
    }
}
