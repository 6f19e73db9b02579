use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamMethod {
    Get,
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// One outbound HTTP call, already resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: UpstreamMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: UpstreamBody,
}

impl UpstreamRequest {
    pub fn new(method: UpstreamMethod, url: impl Into<String>) -> Self {
        UpstreamRequest {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            bearer: None,
            body: UpstreamBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(UpstreamMethod::Get, url)
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = UpstreamBody::Json(body);
        self
    }

    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = UpstreamBody::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    /// `None` when the body was empty. Non-JSON bodies arrive as a JSON string.
    pub body: Option<Value>,
    pub retry_after_secs: Option<u64>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best-effort human message from an error body. Understands the Web API
    /// shape (`{"error": {"message"}}`), the OAuth shape (`error_description`)
    /// and flat `message` fields.
    pub fn error_message(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        let text = |v: &Value| v.as_str().map(str::to_string);
        body.get("error")
            .and_then(|e| e.get("message"))
            .and_then(text)
            .or_else(|| body.get("error_description").and_then(text))
            .or_else(|| body.get("message").and_then(text))
            .or_else(|| body.get("error").and_then(text))
            .or_else(|| text(body))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
}

/// Plain HTTP transport; status interpretation is left to the caller.
#[async_trait::async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}
