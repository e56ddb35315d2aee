//! Test utilities and helper functions for the pagemill test suite

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Creates a test HTML document with specified content
#[allow(dead_code)]
pub fn test_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title></head>
<body><h1>{title}</h1><div id="content">{body}</div></body>
</html>"#
    )
}

/// Build a minimal HTTP/1.1 response with a closing connection.
#[allow(dead_code)]
pub fn http_response(status: u16, content_type: &str, body: &[u8]) -> Vec<u8> {
    let reason = match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let mut out = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// A TCP server that answers successive requests with a fixed sequence
/// of canned responses, then repeats the last one. Each response closes
/// the connection so every fetch attempt is observable.
#[allow(dead_code)]
pub struct ScriptedServer {
    pub addr: String,
}

#[allow(dead_code)]
impl ScriptedServer {
    pub async fn start(responses: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let addr = format!("http://{}", listener.local_addr().expect("local addr"));
        let queue = Arc::new(Mutex::new(responses));

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let queue = queue.clone();
                tokio::spawn(async move {
                    // Read the request head; the test payloads have no body
                    let mut buf = [0u8; 4096];
                    let mut head = Vec::new();
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) => return,
                            Ok(n) => {
                                head.extend_from_slice(&buf[..n]);
                                if head.windows(4).any(|w| w == b"\r\n\r\n") {
                                    break;
                                }
                            }
                            Err(_) => return,
                        }
                    }
                    let response = {
                        let mut q = queue.lock().await;
                        if q.len() > 1 {
                            q.remove(0)
                        } else {
                            q.first().cloned().unwrap_or_default()
                        }
                    };
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.addr)
    }
}
