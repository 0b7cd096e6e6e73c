use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One canned response.
#[derive(Clone)]
struct Route {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

/// Local HTTP/1.1 server answering GET requests from a route table.
///
/// Every connection is closed after one response. Unknown paths get a 404.
pub struct TestServer {
    addr: std::net::SocketAddr,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::default();
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

        let (routes_task, hits_task) = (routes.clone(), hits.clone());
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes_task.clone();
                let hits = hits_task.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&request);
                    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                    *hits.lock().unwrap().entry(path.clone()).or_default() += 1;

                    let route = routes.lock().unwrap().get(&path).cloned().unwrap_or(Route {
                        status: 404,
                        content_type: "text/plain",
                        body: b"not found".to_vec(),
                    });
                    let header = format!(
                        "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        route.status,
                        route.content_type,
                        route.body.len()
                    );
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.write_all(&route.body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            addr,
            routes,
            hits,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn serve_json(&self, path: &str, json: impl Into<String>) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status: 200,
                content_type: "application/json",
                body: json.into().into_bytes(),
            },
        );
    }

    pub fn serve_bytes(&self, path: &str, body: &[u8]) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status: 200,
                content_type: "application/octet-stream",
                body: body.to_vec(),
            },
        );
    }

    /// Publish a release at `/api` pointing at `/app` with the given bytes.
    pub fn publish(&self, version: &str, body: &[u8], sha256: Option<&str>) {
        let digest = sha256.map(|d| format!(r#","sha256":"{d}""#)).unwrap_or_default();
        self.serve_json(
            "/api",
            format!(r#"{{"downloadUrl":"{}","version":"{version}"{digest}}}"#, self.url("/app")),
        );
        self.serve_bytes("/app", body);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}
