#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use pigeonhole::core::client::RelayClient;
use pigeonhole::core::server::Server;
use pigeonhole::database::registry::UserRegistry;
use pigeonhole::utils::config::Config;
use pigeonhole::utils::enums::LoginReply;
use pigeonhole::utils::logger;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<UserRegistry>,
    handle: JoinHandle<()>,
}

//Stops accepting when the test ends, same idea as the Cleanup guard
impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn test_config() -> Config {
    Config {
        bind: "127.0.0.1".to_string(),
        port: 0,
        idle_timeout_secs: 10,
        ..Config::default()
    }
}

pub async fn spawn_server(config: Config) -> TestServer {
    logger::init_tracing();
    let server = Server::bind(&config).await.expect("Error binding test server");
    let addr = server.local_addr().expect("Error reading local addr");
    let registry = server.registry();
    let handle = tokio::spawn(async move {
        server.run().await.expect("Server loop failed");
    });
    TestServer {
        addr,
        registry,
        handle,
    }
}

pub async fn connect(addr: SocketAddr) -> RelayClient<TcpStream> {
    RelayClient::connect(addr)
        .await
        .expect("Error connecting to test server")
}

pub async fn login(addr: SocketAddr, name: &str) -> RelayClient<TcpStream> {
    let mut client = connect(addr).await;
    let reply = client.login(name).await.expect("Error logging in");
    assert_eq!(reply, LoginReply::Accepted, "{} was not accepted", name);
    client
}

pub async fn is_active(registry: &UserRegistry, name: &str) -> bool {
    let index = match registry.find_by_name(name).await {
        Some(index) => index,
        None => return false,
    };
    let record = registry.get(index).await.expect("index from find_by_name");
    let active = record.lock().await.active.is_some();
    active
}

//Server side effects land after the client call returns, poll for them
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = timeout(Duration::from_secs(5), async {
        while !check().await {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not reached within 5s");
}
