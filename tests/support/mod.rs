#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use remote_models::{ClientConfig, RawResponse, RemoteResponse, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

pub const API_PREFIX: &str = "/api/v1/";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BenchmarkState {
    pub id: u64,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct BenchmarkTimeseries {
    pub date: String,
    pub benchmark: u64,
    #[serde(skip)]
    raw: Option<RawResponse>,
}

impl RemoteResponse for BenchmarkTimeseries {
    fn attach_raw(&mut self, raw: RawResponse) {
        self.raw = Some(raw);
    }

    fn raw(&self) -> Option<&RawResponse> {
        self.raw.as_ref()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn api_root(server_url: &str) -> String {
    format!("{server_url}{API_PREFIX}")
}

/// Short timeout, fast retries.
pub fn fast_config(timeout: Duration, max_retries: u32) -> ClientConfig {
    ClientConfig {
        timeout,
        retry: RetryPolicy {
            max_retries,
            backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
        },
        ..ClientConfig::default()
    }
}

/// Accepts connections and never answers. Returns the API root and the
/// number of accepted connections.
pub fn silent_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let root = api_root(&format!("http://{}", listener.local_addr().expect("addr")));
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(stream);
        }
    });

    (root, accepted)
}

/// Closes the first `drops` connections after reading the request, then
/// answers every later one with `200` and `body`.
pub fn flaky_server(drops: usize, body: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let root = api_root(&format!("http://{}", listener.local_addr().expect("addr")));
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            let seen = counter.fetch_add(1, Ordering::SeqCst);
            if read_request(&stream).is_err() || seen < drops {
                continue;
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\n\
                 content-type: application/json\r\n\
                 content-length: {}\r\n\
                 connection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    (root, accepted)
}

/// Address nothing listens on.
pub fn refused_root() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    api_root(&format!("http://{addr}"))
}

fn read_request(stream: &TcpStream) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)
}
