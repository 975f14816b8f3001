//! HTTP catalog source against a canned local server
//!
//! These tests verify how responses map onto `SourceError`:
//! 1. Success bodies decode into wire shapes
//! 2. Non-success statuses become `Status`
//! 3. Undecodable bodies become `Decode`
//! 4. Missing species generation becomes `Shape`
//! 5. Unreachable hosts become `Transport`

use dexlab_ingest::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve `routes` (path → status, body) on an ephemeral port; unknown paths
/// get a 404. Returns the base URL.
async fn serve(routes: &[(&str, u16, &str)]) -> String {
    let routes: Arc<HashMap<String, (u16, String)>> = Arc::new(
        routes
            .iter()
            .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
            .collect(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = routes
                    .get(path)
                    .cloned()
                    .unwrap_or((404, "{}".to_string()));
                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

fn source(base_url: &str) -> HttpCatalogSource {
    let config = IngestConfig {
        base_url: base_url.to_string(),
        index_limit: 3,
        timeout_secs: 5,
        ..Default::default()
    };
    HttpCatalogSource::new(&config).unwrap()
}

const RECORD: &str = r#"{
    "id": 25,
    "name": "pikachu",
    "sprites": {"front_default": null},
    "types": [{"slot": 1, "type": {"name": "electric", "url": ""}}],
    "stats": [{"base_stat": 35, "effort": 0, "stat": {"name": "hp", "url": ""}}],
    "abilities": [],
    "species": {"name": "pikachu", "url": "x"}
}"#;

#[tokio::test]
async fn test_success_bodies_decode() {
    let base = serve(&[
        (
            "/pokemon?limit=3",
            200,
            r#"{"count": 1302, "results": [{"name": "pikachu", "url": "u/25"}]}"#,
        ),
        ("/pokemon/25", 200, RECORD),
        ("/species/25", 200, r#"{"generation": {"name": "generation-iii", "url": ""}}"#),
    ])
    .await;
    let source = source(&base);

    let index = source.fetch_index().await.unwrap();
    assert_eq!(index.count, 1302);
    assert_eq!(index.results.len(), 1);

    let record = source.fetch_record(&format!("{base}/pokemon/25")).await.unwrap();
    assert_eq!(record.id, 25);
    assert_eq!(record.stats[0].base_stat, 35);

    let classification = source
        .fetch_classification(&format!("{base}/species/25"))
        .await
        .unwrap();
    assert_eq!(classification, 3);
}

#[tokio::test]
async fn test_error_status_maps_to_status() {
    let base = serve(&[("/pokemon/1", 503, "{}")]).await;
    let source = source(&base);

    let err = source.fetch_record(&format!("{base}/pokemon/1")).await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 503, .. }), "{err}");

    let err = source.fetch_index().await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 404, .. }), "{err}");
}

#[tokio::test]
async fn test_bad_body_maps_to_decode() {
    let base = serve(&[
        ("/pokemon/1", 200, "not json"),
        ("/pokemon/2", 200, r#"{"id": "two"}"#),
    ])
    .await;
    let source = source(&base);

    for path in ["/pokemon/1", "/pokemon/2"] {
        let err = source.fetch_record(&format!("{base}{path}")).await.unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }), "{path}: {err}");
    }
}

#[tokio::test]
async fn test_species_without_generation_maps_to_shape() {
    let base = serve(&[("/species/1", 200, r#"{"name": "bulbasaur"}"#)]).await;

    let err = source(&base)
        .fetch_classification(&format!("{base}/species/1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Shape { what: "generation", .. }), "{err}");
}

#[tokio::test]
async fn test_unreachable_host_maps_to_transport() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let err = source(&format!("http://{addr}")).fetch_index().await.unwrap_err();
    assert!(matches!(err, SourceError::Transport { .. }), "{err}");
}
