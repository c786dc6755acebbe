use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use assert_matches::assert_matches;

use ndex_mirror::config::Config;
use ndex_mirror::error::MirrorError;
use ndex_mirror::ndex::{CatalogClient, ContentFetcher, NdexHttpClient, build_manifest};

/// What the local server saw for one request.
struct CapturedRequest {
    request_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Accepts a single connection, records the request and answers with
/// `status` and `body`.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}/v2", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let read = stream.read(&mut chunk).unwrap();
            assert!(read > 0, "connection closed before headers were complete");
            raw.extend_from_slice(&chunk[..read]);
            if let Some(pos) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
                break pos;
            }
        };

        let head = String::from_utf8(raw[..header_end].to_vec()).unwrap();
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();
        let content_length = headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| value.parse::<usize>().unwrap())
            .unwrap_or(0);

        let mut request_body = raw[header_end + 4..].to_vec();
        while request_body.len() < content_length {
            let read = stream.read(&mut chunk).unwrap();
            assert!(read > 0, "connection closed before body was complete");
            request_body.extend_from_slice(&chunk[..read]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();

        CapturedRequest {
            request_line,
            headers,
            body: request_body,
        }
    });
    (base_url, handle)
}

fn client_for(base_url: &str) -> NdexHttpClient {
    let config = Config {
        ndex_base_url: base_url.to_string(),
        ..Config::default()
    };
    NdexHttpClient::new(&config).unwrap()
}

#[test]
fn search_posts_empty_query_with_size_ceiling() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"numFound": 2, "start": 0, "networks": [
            {"name": "Alpha", "externalId": "net-a", "nodeCount": 3, "edgeCount": 2, "owner": "x"},
            {"name": "Beta", "externalId": "net-b", "nodeCount": 7, "edgeCount": 9, "isReadOnly": true}
        ]}"#,
    );
    let client = client_for(&base_url);

    let manifest = build_manifest(&client).unwrap();
    let request = server.join().unwrap();

    assert_eq!(
        request.request_line,
        "POST /v2/search/network?size=1000000 HTTP/1.1"
    );
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body, serde_json::json!({ "searchString": "" }));
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert!(
        request
            .header("user-agent")
            .is_some_and(|agent| agent.starts_with("ndex-mirror/"))
    );

    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest[0].id.as_str(), "net-a");
    assert_eq!(manifest[0].name, "Alpha");
    assert_eq!(manifest[1].id.as_str(), "net-b");
    assert_eq!(manifest[1].node_count, 7);
    assert_eq!(manifest[1].edge_count, 9);
}

#[test]
fn search_uses_configured_size() {
    let (base_url, server) = serve_once("200 OK", r#"{"numFound": 0, "networks": []}"#);
    let config = Config {
        ndex_base_url: base_url,
        search_size: 250,
        ..Config::default()
    };
    let client = NdexHttpClient::new(&config).unwrap();

    let response = client.search_networks().unwrap();
    let request = server.join().unwrap();

    assert_eq!(response.num_found, 0);
    assert_eq!(
        request.request_line,
        "POST /v2/search/network?size=250 HTTP/1.1"
    );
}

#[test]
fn search_error_status_maps_to_ndex_status() {
    let (base_url, server) = serve_once("503 Service Unavailable", "down");
    let client = client_for(&base_url);

    let err = client.search_networks().unwrap_err();
    server.join().unwrap();

    assert_matches!(err, MirrorError::NdexStatus { status: 503, ref message } if message == "down");
}

#[test]
fn search_with_undecodable_body_is_a_decode_error() {
    let (base_url, server) = serve_once("200 OK", "<html>not json</html>");
    let client = client_for(&base_url);

    let err = client.search_networks().unwrap_err();
    server.join().unwrap();

    assert_matches!(err, MirrorError::NdexDecode(_));
}

#[test]
fn fetch_gets_network_by_id_and_streams_body() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"[{"numberVerification":[{"longNumber":281474976710655}]}]"#,
    );
    let client = client_for(&base_url);
    let id = "abc".parse().unwrap();

    let mut body = match client.fetch(&id) {
        Ok(body) => body,
        Err(err) => panic!("fetch failed: {err}"),
    };
    let mut content = String::new();
    body.read_to_string(&mut content).unwrap();
    let request = server.join().unwrap();

    assert_eq!(request.request_line, "GET /v2/network/abc HTTP/1.1");
    assert!(request.body.is_empty());
    assert_eq!(
        content,
        r#"[{"numberVerification":[{"longNumber":281474976710655}]}]"#
    );
}

#[test]
fn fetch_not_found_maps_to_ndex_status() {
    let (base_url, server) = serve_once("404 Not Found", "nope");
    let client = client_for(&base_url);
    let id = "abc".parse().unwrap();

    let err = match client.fetch(&id) {
        Ok(_) => panic!("fetch of a missing network succeeded"),
        Err(err) => err,
    };
    let request = server.join().unwrap();

    assert_eq!(request.request_line, "GET /v2/network/abc HTTP/1.1");
    assert_matches!(err, MirrorError::NdexStatus { status: 404, ref message } if message == "nope");
}
