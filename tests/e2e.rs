//! End-to-end scenarios: real origins behind a real balancer on loopback.
//!
//! Each test uses its own port range so the scenarios can run in parallel.

mod common;

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use balancer::http::message::{read_message, ReadError};

#[tokio::test]
async fn answers_502_when_no_backends_are_configured() {
    let lb = common::start_balancer("127.0.0.1:18080", &[]).await;

    let resp = common::http_client()
        .get("http://127.0.0.1:18080/")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);

    lb.shutdown().await;
}

#[tokio::test]
async fn answers_502_when_every_backend_is_down() {
    // Configured origins that were never started.
    let lb = common::start_balancer(
        "127.0.0.1:18090",
        &["127.0.0.1:18091", "127.0.0.1:18092", "127.0.0.1:18093"],
    )
    .await;

    let resp = common::http_client()
        .get("http://127.0.0.1:18090/")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);

    lb.shutdown().await;
}

#[tokio::test]
async fn forwards_to_a_running_backend() {
    let (origin, hits) = common::start_origin("127.0.0.1:18101").await;
    let lb = common::start_balancer("127.0.0.1:18100", &["127.0.0.1:18101"]).await;

    let resp = common::http_client()
        .get("http://127.0.0.1:18100/")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hello From Backend Server\r\n");
    assert_eq!(hits.count(), 1);

    lb.shutdown().await;
    origin.shutdown().await;
}

#[tokio::test]
async fn distributes_requests_round_robin() {
    let (o1, c1) = common::start_origin("127.0.0.1:18111").await;
    let (o2, c2) = common::start_origin("127.0.0.1:18112").await;
    let (o3, c3) = common::start_origin("127.0.0.1:18113").await;
    let lb = common::start_balancer(
        "127.0.0.1:18110",
        &["127.0.0.1:18111", "127.0.0.1:18112", "127.0.0.1:18113"],
    )
    .await;

    let client = common::http_client();
    for _ in 0..3 {
        let resp = client.get("http://127.0.0.1:18110/").send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    assert_eq!(c1.count(), 1);
    assert_eq!(c2.count(), 1);
    assert_eq!(c3.count(), 1);

    lb.shutdown().await;
    o1.shutdown().await;
    o2.shutdown().await;
    o3.shutdown().await;
}

#[tokio::test]
async fn fails_over_to_the_remaining_backend() {
    let (o1, c1) = common::start_origin("127.0.0.1:18121").await;
    let (o2, c2) = common::start_origin("127.0.0.1:18122").await;
    let lb = common::start_balancer(
        "127.0.0.1:18120",
        &["127.0.0.1:18121", "127.0.0.1:18122"],
    )
    .await;

    // The second origin disappears before any request is made.
    o2.shutdown().await;

    let client = common::http_client();
    for _ in 0..2 {
        let resp = client.get("http://127.0.0.1:18120/").send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    assert_eq!(c1.count(), 2);
    assert_eq!(c2.count(), 0);

    lb.shutdown().await;
    o1.shutdown().await;
}

#[tokio::test]
async fn serves_concurrent_clients() {
    let (o1, c1) = common::start_origin("127.0.0.1:18131").await;
    let (o2, c2) = common::start_origin("127.0.0.1:18132").await;
    let lb = common::start_balancer(
        "127.0.0.1:18130",
        &["127.0.0.1:18131", "127.0.0.1:18132"],
    )
    .await;

    let client = common::http_client();
    let mut requests = Vec::new();
    for _ in 0..10 {
        let client = client.clone();
        requests.push(tokio::spawn(async move {
            client
                .get("http://127.0.0.1:18130/")
                .send()
                .await
                .unwrap()
                .status()
        }));
    }
    for request in requests {
        assert_eq!(request.await.unwrap(), 200);
    }

    assert_eq!(c1.count() + c2.count(), 10);

    lb.shutdown().await;
    o1.shutdown().await;
    o2.shutdown().await;
}

#[tokio::test]
async fn probes_revive_a_backend_that_comes_up_late() {
    let backend_addr = "127.0.0.1:18141";
    let lb = common::start_balancer_with("127.0.0.1:18140", &[backend_addr], |config| {
        config.health_check.interval_secs = 1;
    })
    .await;

    // Past one probe interval the absent origin has been marked down.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let resp = common::http_client()
        .get("http://127.0.0.1:18140/")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);

    let (origin, _hits) = common::start_origin(backend_addr).await;

    // Past another interval a probe has revived it.
    tokio::time::sleep(Duration::from_millis(2000)).await;
    let resp = common::http_client()
        .get("http://127.0.0.1:18140/")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    lb.shutdown().await;
    origin.shutdown().await;
}

#[tokio::test]
async fn reuses_one_client_connection_for_many_requests() {
    let (origin, hits) = common::start_origin("127.0.0.1:18151").await;
    let lb = common::start_balancer("127.0.0.1:18150", &["127.0.0.1:18151"]).await;

    let stream = TcpStream::connect("127.0.0.1:18150").await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    for _ in 0..3 {
        write_half
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let response = read_message(&mut reader, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with(b"Hello From Backend Server\r\n"));
    }

    // Unknown paths pass through to the origin's 404.
    write_half
        .write_all(b"GET /missing HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    let response = read_message(&mut reader, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(response.starts_with(b"HTTP/1.1 404 Not Found\r\n"));

    assert_eq!(hits.count(), 4);

    drop(write_half);
    drop(reader);
    lb.shutdown().await;
    origin.shutdown().await;
}

#[tokio::test]
async fn closes_silently_on_malformed_client_traffic() {
    let (origin, hits) = common::start_origin("127.0.0.1:18161").await;
    let lb = common::start_balancer("127.0.0.1:18160", &["127.0.0.1:18161"]).await;

    let stream = TcpStream::connect("127.0.0.1:18160").await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // Not a full message: no terminating blank line before the half-close.
    write_half.write_all(b"NOT-HTTP garbage\r\n").await.unwrap();
    write_half.shutdown().await.unwrap();

    // The balancer closes without sending anything back.
    let err = read_message(&mut reader, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::ClosedByPeer));
    assert_eq!(hits.count(), 0);

    lb.shutdown().await;
    origin.shutdown().await;
}
