//! A tiny HTTP/1.1 server for driving the worker in tests.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Start the server on the current runtime.
pub async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream));
        }
    });
    addr
}

/// Start the server on its own thread, for tests that block.
pub fn spawn_server_thread() -> SocketAddr {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            tx.send(spawn_server().await).unwrap();
            std::future::pending::<()>().await;
        });
    });
    rx.recv().unwrap()
}

/// An address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

struct ReceivedRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ReceivedRequest {
    fn header(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<ReceivedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let len = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(ReceivedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn respond(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n",
        body.len()
    );
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    let mut out = head.into_bytes();
    out.extend_from_slice(body);
    out
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

// Routes:
//   /ok             200 "hello"
//   /missing        404
//   /redirect       302 -> /ok
//   /loop           302 -> /loop
//   /see-other      303 -> /echo
//   /moved          301 -> /echo
//   /temp-redirect  307 -> /echo
//   /echo           200 "<METHOD> <body>", request headers echoed as x-echo-*
//   /gzip           gzip-encoded "zipped!" when the client accepts it
//   /big            10 000 bytes of 'x'
//   /gzip-big       10 000 bytes of 'x', always gzip-encoded
//   /slow           answers after 3 s
//   /multi          repeated response headers
//   /reason         200 with a custom reason phrase
async fn serve(mut stream: TcpStream) {
    let Some(req) = read_request(&mut stream).await else {
        return;
    };

    let response = match req.path.as_str() {
        "/ok" => respond("200 OK", &[("content-type", "text/plain")], b"hello"),
        "/missing" => respond("404 Not Found", &[], b"nope"),
        "/redirect" => respond("302 Found", &[("location", "/ok")], b""),
        "/loop" => respond("302 Found", &[("location", "/loop")], b""),
        "/see-other" => respond("303 See Other", &[("location", "/echo")], b""),
        "/moved" => respond("301 Moved Permanently", &[("location", "/echo")], b""),
        "/temp-redirect" => respond("307 Temporary Redirect", &[("location", "/echo")], b""),
        "/echo" => {
            let body = format!("{} {}", req.method, String::from_utf8_lossy(&req.body));
            respond(
                "200 OK",
                &[
                    ("x-echo-content-type", req.header("content-type")),
                    ("x-echo-accept-encoding", req.header("accept-encoding")),
                    ("x-echo-user-agent", req.header("user-agent")),
                    ("x-echo-custom", req.header("x-custom")),
                ],
                body.as_bytes(),
            )
        }
        "/gzip" => {
            if req.header("accept-encoding").contains("gzip") {
                respond("200 OK", &[("content-encoding", "gzip")], &gzip(b"zipped!"))
            } else {
                respond("200 OK", &[], b"zipped!")
            }
        }
        "/big" => respond("200 OK", &[], &[b'x'; 10_000]),
        "/gzip-big" => respond(
            "200 OK",
            &[("content-encoding", "gzip")],
            &gzip(&[b'x'; 10_000]),
        ),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            respond("200 OK", &[], b"late")
        }
        "/multi" => respond(
            "200 OK",
            &[
                ("set-cookie", "a=1"),
                ("set-cookie", "b=2"),
                ("x-dup", "a"),
                ("x-dup", "b"),
            ],
            b"",
        ),
        "/reason" => respond("200 Fine Thanks", &[], b"ok"),
        _ => respond("404 Not Found", &[], b""),
    };

    let _ = stream.write_all(&response).await;
    let _ = stream.shutdown().await;
}
