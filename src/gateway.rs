use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

// ── Commands ──────────────────────────────────────────────────────────────────

/// A backend command together with its parameter record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Vectorize and store a local file
    EmbedFile { file_path: String },
    /// Resolve a natural-language query into matching files
    FindFile { query: String },
    /// Storage-layer capability probe
    DbFun,
}

impl Command {
    /// Wire name of the command, as the backend registers it.
    pub fn name(&self) -> &'static str {
        match self {
            Command::EmbedFile { .. } => "embed_file",
            Command::FindFile { .. } => "find_file",
            Command::DbFun => "db_fun",
        }
    }

    /// Parameter record sent with the command. Keys are camelCase on the wire.
    pub fn params(&self) -> Value {
        match self {
            Command::EmbedFile { file_path } => serde_json::json!({ "filePath": file_path }),
            Command::FindFile { query } => serde_json::json!({ "query": query }),
            Command::DbFun => serde_json::json!({}),
        }
    }
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// Opaque success value returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload(pub Value);

impl Payload {
    #[cfg(test)]
    pub fn text(s: impl Into<String>) -> Self {
        Self(Value::String(s.into()))
    }

    /// Display-ready form: strings verbatim, `null` as nothing, anything else as compact JSON.
    pub fn to_display(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// Domain error reported by the backend; `body` is its error value.
    #[error("backend error {status}: {body}")]
    Backend { status: u16, body: Value },
    #[error("unreadable backend response: {0}")]
    Decode(String),
}

impl GatewayError {
    #[cfg(test)]
    pub fn backend(body: impl Into<Value>) -> Self {
        GatewayError::Backend { status: 500, body: body.into() }
    }

    /// Display-ready form. Backend errors keep their JSON shape, so a string
    /// error renders with its quotes.
    pub fn to_display(&self) -> String {
        match self {
            GatewayError::Backend { body, .. } => body.to_string(),
            other => other.to_string(),
        }
    }
}

// ── Gateway trait ─────────────────────────────────────────────────────────────

/// Single-shot passthrough to the backend. No retry, no timeout.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn invoke(&self, command: &Command) -> Result<Payload, GatewayError>;
}

// ── HTTP gateway ──────────────────────────────────────────────────────────────

/// Talks to a backend exposing `POST {endpoint}/invoke/{command}`.
pub struct HttpGateway {
    http: reqwest::Client,
    pub endpoint: String,
    api_key: Option<String>,
}

impl HttpGateway {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key: None,
        }
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    fn url_for(&self, command: &Command) -> String {
        format!("{}/invoke/{}", self.endpoint.trim_end_matches('/'), command.name())
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn invoke(&self, command: &Command) -> Result<Payload, GatewayError> {
        let url = self.url_for(command);

        let mut req = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&command.params());

        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        // A bare 404 means no such route; a 404 with a body is the backend's own error
        if status == reqwest::StatusCode::NOT_FOUND && text.trim().is_empty() {
            return Err(GatewayError::UnknownCommand(command.name().to_string()));
        }

        let body = parse_body(&text);
        if status.is_success() {
            Ok(Payload(body))
        } else {
            Err(GatewayError::Backend { status: status.as_u16(), body })
        }
    }
}

/// JSON when the body parses, otherwise the raw text as a JSON string.
/// An empty body is `null`.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, answer with `status` + `body`, hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(split) = text.find("\r\n\r\n") else { return false };
        let content_length = text[..split]
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.trim().eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        raw.len() >= split + 4 + content_length
    }

    #[test]
    fn test_command_names_and_params() {
        let embed = Command::EmbedFile { file_path: "/tmp/a.txt".to_string() };
        assert_eq!(embed.name(), "embed_file");
        assert_eq!(embed.params(), serde_json::json!({ "filePath": "/tmp/a.txt" }));

        let find = Command::FindFile { query: "invoice".to_string() };
        assert_eq!(find.name(), "find_file");
        assert_eq!(find.params(), serde_json::json!({ "query": "invoice" }));

        assert_eq!(Command::DbFun.name(), "db_fun");
        assert_eq!(Command::DbFun.params(), serde_json::json!({}));
    }

    #[test]
    fn test_payload_display() {
        assert_eq!(Payload::text("embedded:42").to_display(), "embedded:42");
        assert_eq!(Payload(Value::Null).to_display(), "");
        assert_eq!(
            Payload(serde_json::json!(["invoice_2023.pdf"])).to_display(),
            r#"["invoice_2023.pdf"]"#
        );
        assert_eq!(Payload(serde_json::json!(3)).to_display(), "3");
    }

    #[test]
    fn test_error_display_keeps_json_shape() {
        let err = GatewayError::backend("no file path");
        assert_eq!(err.to_display(), "\"no file path\"");

        let err = GatewayError::Backend { status: 422, body: serde_json::json!({ "code": 7 }) };
        assert_eq!(err.to_display(), r#"{"code":7}"#);

        let err = GatewayError::UnknownCommand("greet".to_string());
        assert_eq!(err.to_display(), "unknown command: greet");
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("  \n"), Value::Null);
        assert_eq!(parse_body("\"ok\""), Value::String("ok".to_string()));
        assert_eq!(parse_body("plain words"), Value::String("plain words".to_string()));
        assert_eq!(parse_body("[1,2]"), serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn test_http_success_posts_params() {
        let (endpoint, server) = serve_once("200 OK", "\"embedded:42\"").await;
        let gateway = HttpGateway::new(format!("{endpoint}/"));
        let cmd = Command::EmbedFile { file_path: "/tmp/a.txt".to_string() };

        let payload = gateway.invoke(&cmd).await.unwrap();
        assert_eq!(payload.to_display(), "embedded:42");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /invoke/embed_file "));
        assert!(request.contains(r#""filePath":"/tmp/a.txt""#));
    }

    #[tokio::test]
    async fn test_http_sends_bearer_key() {
        let (endpoint, server) = serve_once("200 OK", "null").await;
        let mut gateway = HttpGateway::new(endpoint);
        gateway.set_api_key("secret".to_string());

        gateway.invoke(&Command::DbFun).await.unwrap();
        let request = server.await.unwrap().to_lowercase();
        assert!(request.contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn test_http_domain_error() {
        let (endpoint, _server) = serve_once("500 Internal Server Error", "\"no file path\"").await;
        let gateway = HttpGateway::new(endpoint);

        let err = gateway
            .invoke(&Command::EmbedFile { file_path: String::new() })
            .await
            .unwrap_err();
        match &err {
            GatewayError::Backend { status, body } => {
                assert_eq!(*status, 500);
                assert_eq!(body, &Value::String("no file path".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_display(), "\"no file path\"");
    }

    #[tokio::test]
    async fn test_http_unknown_command() {
        let (endpoint, _server) = serve_once("404 Not Found", "").await;
        let gateway = HttpGateway::new(endpoint);

        let err = gateway.invoke(&Command::DbFun).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownCommand(ref name) if name == "db_fun"));
    }

    #[tokio::test]
    async fn test_http_not_found_with_body_is_domain_error() {
        let (endpoint, _server) = serve_once("404 Not Found", "\"file not found: /tmp/gone.txt\"").await;
        let gateway = HttpGateway::new(endpoint);

        let err = gateway
            .invoke(&Command::EmbedFile { file_path: "/tmp/gone.txt".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Backend { status: 404, .. }));
        assert_eq!(err.to_display(), "\"file not found: /tmp/gone.txt\"");
    }

    #[tokio::test]
    async fn test_http_unreachable() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway = HttpGateway::new(format!("http://{addr}"));
        let err = gateway.invoke(&Command::DbFun).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unreachable(_)));
    }
}
