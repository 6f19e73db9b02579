use crate::domain_port::*;
use crate::logger::*;
use reqwest::{Client, header};
use serde_json::Value;
use std::time::Duration;

pub struct ReqwestUpstreamClient {
    http_client: Client,
}

impl ReqwestUpstreamClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(ReqwestUpstreamClient { http_client })
    }
}

fn retry_after(headers: &header::HeaderMap) -> Option<u64> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Empty bodies become `None`; anything that is not JSON is kept as a string.
fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
    )
}

#[async_trait::async_trait]
impl UpstreamClient for ReqwestUpstreamClient {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let mut builder = match request.method {
            UpstreamMethod::Get => self.http_client.get(&request.url),
            UpstreamMethod::Post => self.http_client.post(&request.url),
            UpstreamMethod::Put => self.http_client.put(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            UpstreamBody::Empty => builder.header(header::CONTENT_LENGTH, 0),
            UpstreamBody::Json(body) => builder.json(body),
            UpstreamBody::Form(fields) => builder.form(fields),
        };

        let response = builder.send().await.map_err(|e| {
            warn!(url = %request.url, "upstream request failed: {}", e);
            UpstreamError::Unreachable(e.to_string())
        })?;

        let status = response.status().as_u16();
        let retry_after_secs = retry_after(response.headers());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Unreachable(e.to_string()))?;
        debug!(url = %request.url, status, "upstream responded");

        Ok(UpstreamResponse {
            status,
            body: parse_body(&bytes),
            retry_after_secs,
        })
    }
}
