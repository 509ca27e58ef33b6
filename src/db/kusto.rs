use log::{debug, info, trace};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::connection::Connection;
use crate::db::{CommandResult, KustoBehavior};

const APP_HEADER: &str = "kusto-seed";

#[cfg(test)]
thread_local! {
    static RELEASES: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

#[derive(Debug, Error)]
pub enum KustoError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("kusto returned {status} ({code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("client session is closed")]
    Closed,
}

#[derive(Serialize)]
struct RequestBody<'a> {
    db: &'a str,
    csl: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(rename = "@message")]
    detail: Option<String>,
}

/// Blocking REST client for a Kusto (ADX) endpoint.
pub struct KustoClient {
    http: Option<Client>,
    conn: Connection,
    next_request: u64,
}

impl KustoClient {
    pub fn connect(conn: &Connection) -> Result<Self, KustoError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", conn.token))?,
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-ms-app", HeaderValue::from_static(APP_HEADER));

        // Targets a local emulator; system proxies would only get in the way.
        let http = Client::builder()
            .timeout(conn.timeout)
            .default_headers(headers)
            .no_proxy()
            .build()?;

        info!("kusto client opened for {}", conn.endpoint);
        Ok(Self {
            http: Some(http),
            conn: conn.clone(),
            next_request: 0,
        })
    }

    /// Release the underlying HTTP client. Returns false if it was already released.
    pub fn release(&mut self) -> bool {
        match self.http.take() {
            Some(_) => {
                #[cfg(test)]
                RELEASES.with(|n| n.set(n.get() + 1));
                info!("kusto client closed for {}", self.conn.endpoint);
                true
            }
            None => false,
        }
    }

    pub fn close(mut self) {
        self.release();
    }

    pub fn is_closed(&self) -> bool {
        self.http.is_none()
    }

    fn post(&mut self, url: &str, database: &str, csl: &str) -> Result<CommandResult, KustoError> {
        let http = self.http.as_ref().ok_or(KustoError::Closed)?;
        self.next_request += 1;
        let request_id = format!("{};{}", APP_HEADER, self.next_request);

        debug!("POST {} [{}] db={}", url, request_id, database);
        trace!("csl: {}", csl);

        let response = http
            .post(url)
            .header("x-ms-client-request-id", HeaderValue::from_str(&request_id)?)
            .json(&RequestBody { db: database, csl })
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(service_error(status.as_u16(), &text));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(CommandResult::new(body))
    }
}

impl KustoBehavior for KustoClient {
    fn execute_mgmt(&mut self, database: &str, csl: &str) -> Result<CommandResult, KustoError> {
        let url = self.conn.mgmt_url();
        self.post(&url, database, csl)
    }

    fn execute_query(&mut self, database: &str, csl: &str) -> Result<CommandResult, KustoError> {
        let url = self.conn.query_url();
        self.post(&url, database, csl)
    }
}

impl Drop for KustoClient {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.release();
        }
    }
}

/// Turn a non-2xx body into an error, preferring the detailed `@message`.
fn service_error(status: u16, body: &str) -> KustoError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => KustoError::Service {
            status,
            code: env.error.code,
            message: env.error.detail.unwrap_or(env.error.message),
        },
        Err(_) => KustoError::Service {
            status,
            code: String::new(),
            message: body.trim().to_string(),
        },
    }
}

/// Open a client, hand it to `f`, and close it once whatever `f` returns.
///
/// A panic inside `f` still releases the client through `Drop`.
pub fn with_client<F, R>(conn: &Connection, f: F) -> anyhow::Result<R>
where
    F: FnOnce(&mut KustoClient) -> anyhow::Result<R>,
{
    let mut client = KustoClient::connect(conn)?;
    let result = f(&mut client);
    client.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let len = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        if k.eq_ignore_ascii_case("content-length") {
                            v.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serve exactly one response and hand back the raw request.
    fn one_shot(status: &'static str, body: &'static str) -> (Connection, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                concat!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\n",
                    "Content-Length: {}\r\nConnection: close\r\n\r\n{}"
                ),
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        let conn = Connection {
            endpoint: format!("http://{}", addr),
            token: "123456".into(),
            timeout: Duration::from_secs(5),
        };
        (conn, handle)
    }

    #[test]
    fn mgmt_command_posts_db_and_csl() {
        let (conn, server) = one_shot(
            "200 OK",
            r#"{"Tables":[{"TableName":"Table_0","Columns":[],"Rows":[["Events"]]}]}"#,
        );
        let mut client = KustoClient::connect(&conn).unwrap();
        let result = client
            .execute("NetDefaultDB", ".create table Events (id : long)")
            .unwrap();
        assert_eq!(result.primary_row_count(), 1);

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /v1/rest/mgmt HTTP/1.1"));
        let lower = request.to_lowercase();
        assert!(lower.contains("authorization: bearer 123456"));
        assert!(lower.contains("x-ms-client-request-id: kusto-seed;1"));
        assert!(request.contains(r#""db":"NetDefaultDB""#));
        assert!(request.contains(r#""csl":".create table Events (id : long)""#));
    }

    #[test]
    fn query_goes_to_v2_endpoint() {
        let (conn, server) = one_shot("200 OK", r#"[{"FrameType":"DataSetHeader"}]"#);
        let mut client = KustoClient::connect(&conn).unwrap();
        let result = client.execute("NetDefaultDB", "Events | count").unwrap();
        assert!(result.tables().is_empty());
        assert!(server.join().unwrap().starts_with("POST /v2/rest/query HTTP/1.1"));
    }

    #[test]
    fn error_envelope_becomes_service_error() {
        let (conn, server) = one_shot(
            "400 Bad Request",
            concat!(
                r#"{"error":{"code":"BadRequest","message":"Request is invalid","#,
                r#""@message":"Table 'X' was not found"}}"#
            ),
        );
        let mut client = KustoClient::connect(&conn).unwrap();
        let err = client.execute_mgmt("NetDefaultDB", ".show table X").unwrap_err();
        server.join().unwrap();
        match err {
            KustoError::Service {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, "BadRequest");
                assert_eq!(message, "Table 'X' was not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unstructured_error_body_is_kept() {
        match service_error(502, "bad gateway\n") {
            KustoError::Service { code, message, .. } => {
                assert!(code.is_empty());
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn release_happens_once() {
        let mut client = KustoClient::connect(&unreachable_conn()).unwrap();
        assert!(client.release());
        assert!(!client.release());
        assert!(client.is_closed());
        assert!(matches!(
            client.execute_mgmt("db", ".show tables"),
            Err(KustoError::Closed)
        ));
    }

    fn unreachable_conn() -> Connection {
        Connection {
            endpoint: "http://127.0.0.1:1".into(),
            token: "t".into(),
            timeout: Duration::from_secs(1),
        }
    }

    fn releases() -> usize {
        RELEASES.with(|n| n.get())
    }

    #[test]
    fn with_client_releases_once_on_success() {
        let before = releases();
        let value = with_client(&unreachable_conn(), |client| {
            assert!(!client.is_closed());
            Ok(7)
        })
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(releases() - before, 1);
    }

    #[test]
    fn with_client_releases_once_on_error() {
        let before = releases();
        let err = with_client(&unreachable_conn(), |client| -> anyhow::Result<()> {
            assert!(!client.is_closed());
            anyhow::bail!("boom")
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(releases() - before, 1);
    }

    #[test]
    fn with_client_releases_once_on_panic() {
        let before = releases();
        let outcome = std::panic::catch_unwind(|| {
            with_client(&unreachable_conn(), |_client| -> anyhow::Result<()> {
                panic!("boom")
            })
        });
        assert!(outcome.is_err());
        assert_eq!(releases() - before, 1);
    }
}
