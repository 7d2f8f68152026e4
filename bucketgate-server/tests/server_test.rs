use anyhow::Result;
use bucketgate::{EndpointPolicy, PolicyResolver, RateLimiter};
use bucketgate_server::metrics::Metrics;
use bucketgate_server::middleware::Gate;
use bucketgate_server::transport::http::serve;
use bucketgate_server::types::StatusResponse;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    async fn start(gate: Gate) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let handle = tokio::spawn(serve(listener, gate, async move {
            let _ = signal.await;
        }));

        Ok(TestServer {
            addr,
            shutdown,
            handle,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.handle.await?
    }
}

fn user_gate() -> Gate {
    let resolver = PolicyResolver::new(vec![
        EndpointPolicy::parse("GET /user/:id", 5, 5).unwrap(),
        EndpointPolicy::parse("PATCH /user/:id", 2, 2).unwrap(),
    ]);

    Gate::new(
        Arc::new(RateLimiter::new(resolver)),
        Arc::new(Metrics::new()),
    )
}

#[tokio::test]
async fn test_take_flow_over_tcp() -> Result<()> {
    let server = TestServer::start(user_gate()).await?;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/user/1234")).send().await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await?, "Hello World with user id");

    let status: StatusResponse = client
        .get(server.url("/take"))
        .query(&[("method", "GET"), ("route", "/user/:id")])
        .send()
        .await?
        .json()
        .await?;
    assert!(status.allow);
    assert_eq!(status.available_tokens, 4);

    server.stop().await
}

#[tokio::test]
async fn test_peer_address_identifies_client() -> Result<()> {
    let server = TestServer::start(user_gate()).await?;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client.patch(server.url("/user/7")).send().await?;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }

    let response = client.patch(server.url("/user/7")).send().await?;
    assert_eq!(response.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok()),
        Some("0")
    );

    // Forwarded headers are not trusted by default
    let response = client
        .patch(server.url("/user/7"))
        .header("x-forwarded-for", "203.0.113.50")
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);

    server.stop().await
}

#[tokio::test]
async fn test_unknown_route_is_not_found() -> Result<()> {
    let server = TestServer::start(user_gate()).await?;

    let response = reqwest::get(server.url("/nowhere")).await?;
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    server.stop().await
}

#[tokio::test]
async fn test_concurrent_clients_never_exceed_burst() -> Result<()> {
    let server = TestServer::start(user_gate()).await?;
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let client = client.clone();
        let url = server.url("/user/42");
        tasks.push(tokio::spawn(async move {
            client.get(url).send().await.map(|r| r.status())
        }));
    }

    let mut allowed = 0;
    for task in tasks {
        if task.await?? == reqwest::StatusCode::OK {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 5);

    server.stop().await
}
