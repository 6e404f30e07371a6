// HTTP transport to the completion backend

use crate::config::TransportConfig;
use crate::traits::{ByteStream, ChatRequest, ChatResponse, ChatTransport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;

/// Multipart-form chat client (reqwest)
pub struct HttpChatClient {
    http_client: reqwest::Client,
    config: TransportConfig,
}

impl HttpChatClient {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())
                    .with_context(|| format!("Invalid header name: {}", name))?,
                HeaderValue::from_str(value)
                    .with_context(|| format!("Invalid value for header {}", name))?,
            );
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { http_client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn build_form(&self, request: &ChatRequest) -> Result<Form> {
        let mut form = Form::new();

        for (name, value) in request.form_fields(self.config.streaming)? {
            form = form.text(name, value);
        }

        for file in &request.files {
            let mut part = Part::bytes(file.data.clone()).file_name(file.name.clone());
            if !file.content_type.is_empty() {
                part = part
                    .mime_str(&file.content_type)
                    .with_context(|| format!("Invalid content type for {}", file.name))?;
            }
            form = form.part("files", part);
        }

        Ok(form)
    }
}

#[async_trait]
impl ChatTransport for HttpChatClient {
    async fn send(&self, request: ChatRequest) -> Result<ChatResponse> {
        let form = self.build_form(&request)?;

        tracing::debug!(
            session_id = %request.session_id,
            files = request.files.len(),
            streaming = self.config.streaming,
            "Sending chat request"
        );

        let response = self
            .http_client
            .post(&self.config.url)
            .multipart(form)
            .send()
            .await
            .context("Failed to send chat request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("API request failed with status {}", status.as_u16());
        }

        if self.config.streaming {
            return Ok(ChatResponse::Streaming(body_stream(response)));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse chat response body")?;
        let output = body
            .get("output")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(ChatResponse::Complete { output })
    }
}

fn body_stream(response: Response) -> ByteStream {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => yield Ok(bytes.to_vec()),
                Err(e) => {
                    yield Err(anyhow::anyhow!("Stream error: {}", e));
                    break;
                }
            }
        }
    })
}
