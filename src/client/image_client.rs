use crate::{
    client::ImageEndpoint,
    config::EndpointConfig,
    error::{GenerationError, Result},
    models::{GenerateImageRequest, GenerateImageResponse},
};
use async_trait::async_trait;
use reqwest::Client;

/// JSON-over-HTTP client for the image generation route.
#[derive(Debug, Clone)]
pub struct ImageClient {
    client: Client,
    url: String,
}

impl ImageClient {
    pub fn new(config: &EndpointConfig) -> Self {
        Self {
            client: Client::new(),
            url: config.url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers
    }
}

#[async_trait]
impl ImageEndpoint for ImageClient {
    async fn generate_image(&self, request: &GenerateImageRequest) -> Result<String> {
        let body = serde_json::to_vec(request)?;

        log::debug!("POST {} ({} bytes)", self.url, body.len());

        let response = self
            .client
            .post(&self.url)
            .headers(self.build_headers())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::warn!(
                "Generation endpoint returned {}: {}",
                status.as_u16(),
                error_text
            );
            return Err(GenerationError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let parsed: GenerateImageResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::Response(e.to_string()))?;

        parsed.into_image_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerationOptions;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and hands back the raw request it saw.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if request_complete(&received) {
                    break;
                }
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..split]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        raw.len() >= split + 4 + content_length
    }

    fn request_body(raw: &str) -> Value {
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_client_url() {
        let client = ImageClient::new(&EndpointConfig::new().with_base_url("http://host:3000/"));
        assert_eq!(client.url(), "http://host:3000/api/replicate/generate-image");
    }

    #[tokio::test]
    async fn test_posts_json_and_returns_first_output() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", r#"{"output":["https://img/1.png"]}"#).await;
        let client = ImageClient::new(&EndpointConfig::new().with_base_url(base));

        let request = GenerateImageRequest::new(
            "A cat",
            GenerationOptions::new().with_inference_steps(50),
        );
        let url = client.generate_image(&request).await.unwrap();
        assert_eq!(url, "https://img/1.png");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/replicate/generate-image "));
        assert!(raw.to_ascii_lowercase().contains("content-type: application/json"));
        assert_eq!(
            request_body(&raw),
            json!({ "prompt": "A cat", "numInferenceSteps": 50 })
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (base, server) =
            serve_once("HTTP/1.1 500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let client = ImageClient::new(&EndpointConfig::new().with_base_url(base));

        let err = client
            .generate_image(&GenerateImageRequest::new("A cat", GenerationOptions::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Status { status: 500 }));
        assert_eq!(err.user_message(), "Failed to generate image");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_is_error() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", "not json").await;
        let client = ImageClient::new(&EndpointConfig::new().with_base_url(base));

        let err = client
            .generate_image(&GenerateImageRequest::new("A cat", GenerationOptions::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Response(_)));
        assert!(!err.user_message().is_empty());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ImageClient::new(&EndpointConfig::new().with_base_url(format!("http://{}", addr)));
        let err = client
            .generate_image(&GenerateImageRequest::new("A cat", GenerationOptions::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Request(_)));
    }
}
