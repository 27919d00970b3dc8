//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a single static body on every GET path. Can attach a
//! Content-Disposition header, answer 503 to the first N requests, and act
//! as a premium processing endpoint that checks the `pass` query parameter.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Value for a Content-Disposition header on successful responses.
    pub content_disposition: Option<String>,
    /// Answer 503 to this many requests before serving normally.
    pub fail_first: u32,
    /// When set, requests to /process_download.php must carry
    /// `pass=<token>`; anything else on that path gets 401.
    pub premium_token: Option<String>,
}

pub struct TestServer {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
    premium_hits: Arc<AtomicUsize>,
}

impl TestServer {
    /// Total requests handled.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Requests that hit the premium endpoint with a valid token.
    pub fn premium_hits(&self) -> usize {
        self.premium_hits.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread serving `body`. The server runs
/// until the process exits.
pub fn start(body: Vec<u8>, opts: ServerOptions) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let requests = Arc::new(AtomicUsize::new(0));
    let premium_hits = Arc::new(AtomicUsize::new(0));
    let failures_left = Arc::new(AtomicU32::new(opts.fail_first));

    let server = TestServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        requests: Arc::clone(&requests),
        premium_hits: Arc::clone(&premium_hits),
    };

    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let opts = opts.clone();
            let requests = Arc::clone(&requests);
            let premium_hits = Arc::clone(&premium_hits);
            let failures_left = Arc::clone(&failures_left);
            thread::spawn(move || {
                handle(stream, &body, &opts, &requests, &premium_hits, &failures_left)
            });
        }
    });

    server
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: &ServerOptions,
    requests: &AtomicUsize,
    premium_hits: &AtomicUsize,
    failures_left: &AtomicU32,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    requests.fetch_add(1, Ordering::SeqCst);

    let target = request
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/");
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p, q),
        None => (target, ""),
    };

    if path == "/process_download.php" {
        let Some(token) = &opts.premium_token else {
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            return;
        };
        let pass = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("pass="))
            .unwrap_or("");
        if pass != token {
            let _ = stream.write_all(b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            return;
        }
        premium_hits.fetch_add(1, Ordering::SeqCst);
        write_body(&mut stream, body, opts);
        return;
    }

    // One-shot failures come off a shared countdown so retries see recovery.
    if failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        let _ = stream.write_all(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }

    write_body(&mut stream, body, opts);
}

fn write_body(stream: &mut std::net::TcpStream, body: &[u8], opts: &ServerOptions) {
    let disposition = opts
        .content_disposition
        .as_deref()
        .map(|v| format!("Content-Disposition: {}\r\n", v))
        .unwrap_or_default();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        body.len(),
        disposition
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body);
}
