use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_API_V1_STR: &str = "/api/v1";

pub type Result<T> = std::result::Result<T, NanoIndexError>;

#[derive(Debug)]
pub enum NanoIndexError {
    InvalidOption(String),
    InvalidArgument(String),
    Transport {
        method: String,
        path: String,
        source: std::io::Error,
    },
    Http {
        status: u16,
        method: String,
        path: String,
        body: String,
    },
    InvalidJson {
        method: String,
        path: String,
        body: String,
        source: serde_json::Error,
    },
}

impl Display for NanoIndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOption(message) | Self::InvalidArgument(message) => write!(f, "{message}"),
            Self::Transport {
                method,
                path,
                source,
            } => write!(f, "request failed for {method} {path}: {source}"),
            Self::Http {
                status,
                method,
                path,
                body,
            } => write!(f, "HTTP {status} on {method} {path}: {body}"),
            Self::InvalidJson {
                method,
                path,
                source,
                ..
            } => write!(f, "invalid JSON response on {method} {path}: {source}"),
        }
    }
}

impl std::error::Error for NanoIndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport { source, .. } => Some(source),
            Self::InvalidJson { source, .. } => Some(source),
            Self::InvalidOption(_) | Self::InvalidArgument(_) | Self::Http { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub api_v1_str: String,
    pub headers: HashMap<String, String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            api_v1_str: DEFAULT_API_V1_STR.to_string(),
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    L2,
    Cosine,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveResponse {
    pub status: String,
    pub uptime_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadyChecks {
    pub engine_loaded: bool,
    pub storage_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadyResponse {
    pub status: String,
    pub uptime_ms: u64,
    pub checks: ReadyChecks,
}

pub type MetricsResponse = Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub query_id: Option<i64>,
    pub results: Vec<SearchHit>,
    pub latency_ms: f64,
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub top_k: Option<usize>,
    pub id: Option<i64>,
    pub metric: Option<Metric>,
    pub use_index: Option<bool>,
    pub use_agent: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexAddResponse {
    pub count: usize,
    pub total_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexTrainResponse {
    pub n_cells: usize,
    pub total_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexResetResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArmStats {
    pub name: String,
    pub pulls: u64,
    pub total_reward: f64,
    pub avg_reward: f64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStatsResponse {
    pub algorithm: String,
    pub total_pulls: u64,
    pub arms: Vec<ArmStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResetResponse {
    pub message: String,
}

#[derive(Debug, Clone)]
struct ParsedBaseUrl {
    host: String,
    port: u16,
    path_prefix: String,
}

#[derive(Debug, Clone)]
pub struct NanoIndexClient {
    base_url: ParsedBaseUrl,
    timeout: Duration,
    api_v1_str: String,
    default_headers: HashMap<String, String>,
}

impl NanoIndexClient {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_options(base_url, ClientOptions::default())
    }

    pub fn with_options(base_url: impl AsRef<str>, options: ClientOptions) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url.as_ref())?,
            timeout: options.timeout,
            api_v1_str: options.api_v1_str,
            default_headers: options.headers,
        })
    }

    pub fn live(&self) -> Result<LiveResponse> {
        self.request_json("GET", "/live", None)
    }

    pub fn ready(&self) -> Result<ReadyResponse> {
        self.request_json("GET", "/ready", None)
    }

    pub fn metrics(&self) -> Result<MetricsResponse> {
        self.request_json("GET", "/metrics", None)
    }

    pub fn search(&self, vector: &[f32], options: Option<SearchOptions>) -> Result<SearchResponse> {
        let options = options.unwrap_or_default();
        let mut body = serde_json::Map::new();
        body.insert("vector".into(), json!(vector));
        if let Some(top_k) = options.top_k {
            body.insert("top_k".into(), json!(top_k));
        }
        if let Some(id) = options.id {
            body.insert("id".into(), json!(id));
        }
        body.insert("metric".into(), json!(options.metric.unwrap_or_default()));
        if let Some(use_index) = options.use_index {
            body.insert("use_index".into(), json!(use_index));
        }
        if let Some(use_agent) = options.use_agent {
            body.insert("use_agent".into(), json!(use_agent));
        }

        let path = format!("{}/search", self.api_v1_str);
        self.request_json("POST", &path, Some(Value::Object(body)))
    }

    pub fn index_add(&self, vectors: &[Vec<f32>], ids: Option<&[i64]>) -> Result<IndexAddResponse> {
        let body = json!({ "vectors": vectors, "ids": ids });
        let path = format!("{}/index/add", self.api_v1_str);
        self.request_json("POST", &path, Some(body))
    }

    pub fn index_train(&self, n_cells: Option<usize>) -> Result<IndexTrainResponse> {
        let path = match n_cells {
            Some(n_cells) => format!("{}/index/train?n_cells={n_cells}", self.api_v1_str),
            None => format!("{}/index/train", self.api_v1_str),
        };
        self.request_json("POST", &path, None)
    }

    pub fn index_reset(&self) -> Result<IndexResetResponse> {
        let path = format!("{}/index/reset", self.api_v1_str);
        self.request_json("POST", &path, None)
    }

    pub fn agent_stats(&self) -> Result<AgentStatsResponse> {
        let path = format!("{}/agent/stats", self.api_v1_str);
        self.request_json("GET", &path, None)
    }

    pub fn agent_reset(&self) -> Result<AgentResetResponse> {
        let path = format!("{}/agent/reset", self.api_v1_str);
        self.request_json("POST", &path, None)
    }

    fn request_json<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let payload = self.do_request(method, path, body)?;
        self.deserialize_json(method, path, payload)
    }

    fn deserialize_json<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        payload: String,
    ) -> Result<T> {
        serde_json::from_str::<T>(&payload).map_err(|source| NanoIndexError::InvalidJson {
            method: method.to_string(),
            path: path.to_string(),
            body: payload,
            source,
        })
    }

    fn do_request(&self, method: &str, path: &str, body: Option<Value>) -> Result<String> {
        let target = format!("{}{}", self.base_url.path_prefix, path);
        let mut stream = TcpStream::connect((self.base_url.host.as_str(), self.base_url.port))
            .map_err(|source| transport_error(method, path, source))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
            .map_err(|source| transport_error(method, path, source))?;

        let body_payload = body
            .map(|value| serde_json::to_string(&value))
            .transpose()
            .map_err(|source| NanoIndexError::InvalidJson {
                method: method.to_string(),
                path: path.to_string(),
                body: String::new(),
                source,
            })?;

        let request = self.build_http_request(method, &target, body_payload.as_deref());

        stream
            .write_all(request.as_bytes())
            .and_then(|_| stream.flush())
            .map_err(|source| transport_error(method, path, source))?;

        let mut raw_response = Vec::new();
        stream
            .read_to_end(&mut raw_response)
            .map_err(|source| transport_error(method, path, source))?;

        let parsed = parse_http_response(&raw_response)
            .map_err(|source| transport_error(method, path, source))?;
        let payload = String::from_utf8_lossy(&parsed.body).into_owned();

        if !(200..=299).contains(&parsed.status) {
            return Err(NanoIndexError::Http {
                status: parsed.status,
                method: method.to_string(),
                path: path.to_string(),
                body: payload,
            });
        }

        Ok(payload)
    }

    fn build_http_request(&self, method: &str, path: &str, body_payload: Option<&str>) -> String {
        let mut request = String::new();
        request.push_str(&format!("{method} {path} HTTP/1.1\r\n"));
        request.push_str(&format!("Host: {}\r\n", self.base_url.host));
        request.push_str("Connection: close\r\n");
        request.push_str("Accept: application/json\r\n");

        for (name, value) in &self.default_headers {
            request.push_str(&format!("{name}: {value}\r\n"));
        }

        if let Some(payload) = body_payload {
            request.push_str("Content-Type: application/json\r\n");
            request.push_str(&format!("Content-Length: {}\r\n", payload.len()));
            request.push_str("\r\n");
            request.push_str(payload);
        } else {
            request.push_str("\r\n");
        }

        request
    }
}

#[derive(Debug)]
struct ParsedHttpResponse {
    status: u16,
    body: Vec<u8>,
}

fn parse_http_response(raw: &[u8]) -> std::io::Result<ParsedHttpResponse> {
    let split_index = raw
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "missing response headers")
        })?;

    let headers_block = &raw[..split_index];
    let body_block = &raw[split_index + 4..];
    let headers_text = String::from_utf8_lossy(headers_block);

    let mut lines = headers_text.split("\r\n");
    let status_line = lines.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "missing status line")
    })?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "missing status code"))?
        .parse::<u16>()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid status code"))?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let body = if headers
        .get("transfer-encoding")
        .map(|value| value.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false)
    {
        decode_chunked_body(body_block)?
    } else {
        body_block.to_vec()
    };

    Ok(ParsedHttpResponse { status, body })
}

fn decode_chunked_body(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut cursor = 0_usize;

    while cursor < body.len() {
        let line_end = find_crlf(body, cursor).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid chunk header")
        })?;
        let line = std::str::from_utf8(&body[cursor..line_end]).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid chunk size line")
        })?;
        let hex_size = line.split(';').next().unwrap_or("0").trim();
        let size = usize::from_str_radix(hex_size, 16).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid chunk size")
        })?;
        cursor = line_end + 2;

        if size == 0 {
            break;
        }
        let end = cursor + size;
        if end > body.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "chunk exceeds payload size",
            ));
        }
        result.extend_from_slice(&body[cursor..end]);
        cursor = end + 2;
    }

    Ok(result)
}

fn find_crlf(buffer: &[u8], start: usize) -> Option<usize> {
    buffer[start..]
        .windows(2)
        .position(|window| window == b"\r\n")
        .map(|index| start + index)
}

fn parse_base_url(base_url: &str) -> Result<ParsedBaseUrl> {
    let trimmed = base_url.trim();
    let normalized = if trimmed.is_empty() {
        DEFAULT_BASE_URL
    } else {
        trimmed
    };

    let remainder = normalized.strip_prefix("http://").ok_or_else(|| {
        NanoIndexError::InvalidOption("base URL must start with http://".to_string())
    })?;

    let (authority, path_prefix) = match remainder.split_once('/') {
        Some((authority, path)) => {
            let prefix = format!("/{}", path.trim_matches('/'));
            let prefix = if prefix == "/" { String::new() } else { prefix };
            (authority, prefix)
        }
        None => (remainder, String::new()),
    };

    if authority.is_empty() {
        return Err(NanoIndexError::InvalidOption(
            "base URL authority cannot be empty".to_string(),
        ));
    }

    let (host, port) = if let Some((host, port)) = authority.rsplit_once(':') {
        let parsed_port = port
            .parse::<u16>()
            .map_err(|_| NanoIndexError::InvalidOption("invalid base URL port".to_string()))?;
        (host.to_string(), parsed_port)
    } else {
        (authority.to_string(), 80_u16)
    };

    if host.is_empty() {
        return Err(NanoIndexError::InvalidOption(
            "base URL host cannot be empty".to_string(),
        ));
    }

    Ok(ParsedBaseUrl {
        host,
        port,
        path_prefix,
    })
}

fn transport_error(method: &str, path: &str, source: std::io::Error) -> NanoIndexError {
    NanoIndexError::Transport {
        method: method.to_string(),
        path: path.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_headers(request: &str) -> HashMap<String, String> {
        let head = request.split("\r\n\r\n").next().expect("headers split");
        let mut lines = head.split("\r\n");
        let _request_line = lines.next().expect("request line");

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        headers
    }

    #[test]
    fn search_body_omits_optional_fields_by_default() {
        let client = NanoIndexClient::new("http://127.0.0.1:8080").expect("client");
        let request = client.build_http_request(
            "POST",
            "/api/v1/search",
            Some(&serde_json::to_string(&json!({"vector": [1.0, 2.0], "metric": "l2"})).unwrap()),
        );
        assert!(request.contains("\"vector\":[1.0,2.0]"));
        assert!(!request.contains("top_k"));
        let _ = client;
    }

    #[test]
    fn index_train_path_includes_n_cells_query_param() {
        let client = NanoIndexClient::new("http://127.0.0.1:8080").expect("client");
        assert_eq!(client.api_v1_str, DEFAULT_API_V1_STR);
    }

    #[test]
    fn client_with_custom_api_prefix() {
        let client = NanoIndexClient::with_options(
            "http://127.0.0.1:9000",
            ClientOptions {
                api_v1_str: "/v2".to_string(),
                ..ClientOptions::default()
            },
        )
        .expect("client");
        assert_eq!(client.api_v1_str, "/v2");
    }

    #[test]
    fn http_error_status_and_body_are_parsed() {
        let raw = b"HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\nContent-Length: 16\r\n\r\n{\"error\":\"boom\"}";
        let parsed = parse_http_response(raw).expect("parsed");

        assert_eq!(parsed.status, 400);
        assert_eq!(
            String::from_utf8_lossy(&parsed.body),
            "{\"error\":\"boom\"}"
        );
    }

    #[test]
    fn invalid_json_response_is_exposed() {
        let client = NanoIndexClient::new("http://127.0.0.1:8080").expect("client");
        let error = client
            .deserialize_json::<LiveResponse>("GET", "/live", "not-json".to_string())
            .expect_err("should fail");

        match error {
            NanoIndexError::InvalidJson { body, .. } => assert_eq!(body, "not-json"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn request_headers_include_custom_defaults() {
        let mut headers = HashMap::new();
        headers.insert("x-request-source".to_string(), "sdk-test".to_string());
        let client = NanoIndexClient::with_options(
            "http://127.0.0.1:8080",
            ClientOptions {
                headers,
                ..ClientOptions::default()
            },
        )
        .expect("client");

        let request = client.build_http_request("GET", "/live", None);
        let parsed_headers = request_headers(&request);
        assert_eq!(
            parsed_headers.get("x-request-source"),
            Some(&"sdk-test".to_string())
        );
    }
}
