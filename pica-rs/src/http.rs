//! Sending requests.
//!
//! The runner builds an [`HttpRequest`] and hands it to a [`Transport`].
//! [`HttpClient`] sends it with `reqwest`; `gzip` and `deflate` bodies are
//! decoded before the response comes back.

use reqwest::Method;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid url `{url}`: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid method `{0}`")]
    Method(String),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("request timed out after {0} ms")]
    Timeout(u128),
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    /// Headers in the order received, names in `Title-Case`.
    pub headers: Vec<(String, String)>,
    /// The decoded body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(is_json_type)
    }
}

/// `application/json`, optionally with parameters or a `+json` suffix type.
pub fn is_json_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    mime.eq_ignore_ascii_case("application/json")
        || mime.to_ascii_lowercase().ends_with("+json")
}

/// `content-type` → `Content-Type`.
pub fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

/// Parse `url`, keeping the text in the error.
pub fn parse_url(url: &str) -> Result<url::Url, HttpError> {
    url::Url::parse(url).map_err(|source| HttpError::Url {
        url: url.to_owned(),
        source,
    })
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// Sends one request and returns the whole response.
///
/// [`HttpClient`] is the network implementation; tests substitute canned
/// responses.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, HttpError>;
}

pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .http1_title_case_headers()
            // Every item gets a fresh connection.
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpClient {
    async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = parse_url(&req.url)?;
        let method = Method::from_bytes(req.method.as_bytes())
            .map_err(|_| HttpError::Method(req.method.clone()))?;
        tracing::debug!(%method, host = url.host_str().unwrap_or_default(), "sending request");

        let mut builder = self.client.request(method, url);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }
        let resp = builder.send().await?;

        let status = resp.status();
        let headers = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    canonical_header_name(name.as_str()),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = resp.bytes().await?.to_vec();
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "response received");
        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
