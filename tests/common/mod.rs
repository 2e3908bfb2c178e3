//! Shared utilities for the end-to-end tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use balancer::config::{BackendConfig, BalancerConfig};
use balancer::origin::{OriginHandle, OriginServer, RequestCounter};
use balancer::{Balancer, BalancerHandle};

/// Request counter backed by an atomic, shared with the test body.
#[derive(Default)]
pub struct HitCounter(AtomicUsize);

impl HitCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl RequestCounter for HitCounter {
    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Start an origin on `addr`; returns its handle and a request counter.
pub async fn start_origin(addr: &str) -> (OriginHandle, Arc<HitCounter>) {
    let counter = HitCounter::new();
    let origin = OriginServer::with_counter(addr, counter.clone());
    let handle = origin.handle();

    tokio::spawn(async move {
        if let Err(e) = origin.run().await {
            eprintln!("origin failed: {e}");
        }
    });

    wait_for_listen(addr).await;
    (handle, counter)
}

/// Start a balancer on `bind` fronting `backends` with default settings.
pub async fn start_balancer(bind: &str, backends: &[&str]) -> BalancerHandle {
    start_balancer_with(bind, backends, |_| {}).await
}

/// Start a balancer with a config tweak (probe cadence, retry budget).
pub async fn start_balancer_with(
    bind: &str,
    backends: &[&str],
    tweak: impl FnOnce(&mut BalancerConfig),
) -> BalancerHandle {
    let mut config = BalancerConfig::default();
    config.listener.bind_address = bind.to_string();
    for address in backends {
        config.backends.push(BackendConfig {
            address: address.to_string(),
        });
    }
    tweak(&mut config);

    let balancer = Balancer::new(config);
    let handle = balancer.handle();

    tokio::spawn(async move {
        if let Err(e) = balancer.run().await {
            eprintln!("balancer failed: {e}");
        }
    });

    wait_for_listen(bind).await;
    handle
}

/// Poll until something accepts connections on `addr`.
pub async fn wait_for_listen(addr: &str) {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing listening on {addr}");
}

/// Client that opens a fresh connection per request, so round-robin
/// distribution stays observable across sequential requests.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
