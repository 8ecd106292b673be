use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::types::{CompletionRequest, LLMResponse, Message, ProviderAdapter, ProviderError};

pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Option<Duration>,
}

pub struct OpenRouterAdapter {
    cfg: OpenRouterConfig,
    client: Client,
}

impl OpenRouterAdapter {
    pub fn new(mut cfg: OpenRouterConfig) -> Result<Self, ProviderError> {
        if cfg.base_url.is_empty() {
            cfg.base_url = crate::config::DEFAULT_OPENROUTER_BASE_URL.to_string();
        }
        if cfg.model.is_empty() {
            cfg.model = crate::config::DEFAULT_OPENROUTER_MODEL.to_string();
        }
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| ProviderError::new("client_error", &err.to_string()))?;
        Ok(Self { cfg, client })
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
        let api_key = self
            .cfg
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::new("auth_error", "OPEN_ROUTER_API_KEY is not set"))?;
        let model = request.model.clone().unwrap_or_else(|| self.cfg.model.clone());
        let payload = build_payload(&request.messages, &model);
        send_request(&self.client, &self.cfg.base_url, api_key, &payload).await
    }
}

fn build_payload(messages: &[Message], model: &str) -> Value {
    let messages: Vec<Value> = messages
        .iter()
        .map(|msg| json!({"role": msg.role, "content": msg.content}))
        .collect();
    json!({
        "model": model,
        "messages": messages,
    })
}

async fn send_request(
    client: &Client,
    base_url: &str,
    api_key: &str,
    payload: &Value,
) -> Result<LLMResponse, ProviderError> {
    let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    debug!(%endpoint, "sending chat completion request");
    let resp = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(payload)
        .send()
        .await
        .map_err(|err| ProviderError::new("network_error", &err.to_string()))?;

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if status.is_client_error() || status.is_server_error() {
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::new("auth_error", &body));
        }
        if status.as_u16() == 429 {
            return Err(ProviderError::new("rate_limit", &body));
        }
        if status.is_server_error() {
            return Err(ProviderError::new("server_error", &body));
        }
        return Err(ProviderError::new("api_error", &body));
    }

    let raw: Value = serde_json::from_str(&body)
        .map_err(|_| ProviderError::new("parse_error", "invalid json"))?;
    let content = parse_response(&raw)
        .ok_or_else(|| ProviderError::new("parse_error", "could not parse assistant's response"))?;
    Ok(LLMResponse {
        content,
        raw: Some(raw),
    })
}

fn parse_response(raw: &Value) -> Option<String> {
    raw.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|text| text.to_string())
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn adapter_for(server: &MockServer) -> OpenRouterAdapter {
        OpenRouterAdapter::new(OpenRouterConfig {
            api_key: Some("sk-test".to_string()),
            base_url: format!("{}/api/v1/", server.uri()),
            model: "deepseek/deepseek-r1:free".to_string(),
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap()
    }

    fn hello() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::system("be helpful"), Message::user("hi")],
            model: None,
        }
    }

    /// Mounts a single chat-completions reply that must be hit exactly once.
    async fn serve_once(server: &MockServer, reply: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(reply)
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn payload_carries_model_and_roles() {
        let payload = build_payload(
            &[Message::system("be helpful"), Message::user("hi")],
            "deepseek/deepseek-r1:free",
        );
        assert_eq!(payload["model"], "deepseek/deepseek-r1:free");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "hi");
    }

    #[test]
    fn parses_first_choice_content() {
        let raw = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "first"}},
                {"message": {"role": "assistant", "content": "second"}}
            ]
        });
        assert_eq!(parse_response(&raw).as_deref(), Some("first"));
    }

    #[test]
    fn missing_choices_is_none() {
        assert!(parse_response(&json!({"error": "nope"})).is_none());
        assert!(parse_response(&json!({"choices": []})).is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_at_call_time() {
        let adapter = OpenRouterAdapter::new(OpenRouterConfig {
            api_key: None,
            base_url: String::new(),
            model: String::new(),
            timeout: None,
        })
        .unwrap();
        let err = adapter
            .complete(CompletionRequest {
                messages: vec![Message::user("hi")],
                model: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, "auth_error");
    }

    // ── HTTP ──

    #[tokio::test]
    async fn posts_to_chat_completions_with_bearer_key() {
        let server = MockServer::start().await;
        serve_once(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "a starter prompt"}}]
            })),
        )
        .await;

        let resp = adapter_for(&server).complete(hello()).await.unwrap();
        assert_eq!(resp.content, "a starter prompt");

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(sent["model"], "deepseek/deepseek-r1:free");
        assert_eq!(sent["messages"][1], json!({"role": "user", "content": "hi"}));
    }

    #[tokio::test]
    async fn error_statuses_map_to_codes_without_retry() {
        let cases = [
            (401, "auth_error"),
            (403, "auth_error"),
            (429, "rate_limit"),
            (500, "server_error"),
            (503, "server_error"),
            (400, "api_error"),
            (404, "api_error"),
        ];
        for (status, code) in cases {
            let server = MockServer::start().await;
            serve_once(&server, ResponseTemplate::new(status).set_body_string("upstream says no")).await;

            let err = adapter_for(&server).complete(hello()).await.unwrap_err();
            assert_eq!(err.code, code, "status {status}");
            assert_eq!(err.message, "upstream says no");
            assert_eq!(server.received_requests().await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn invalid_json_is_a_parse_error() {
        let server = MockServer::start().await;
        serve_once(&server, ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;

        let err = adapter_for(&server).complete(hello()).await.unwrap_err();
        assert_eq!(err.code, "parse_error");
        assert_eq!(err.message, "invalid json");
    }

    #[tokio::test]
    async fn reply_without_choices_is_a_parse_error() {
        let server = MockServer::start().await;
        serve_once(&server, ResponseTemplate::new(200).set_body_json(json!({"choices": []}))).await;

        let err = adapter_for(&server).complete(hello()).await.unwrap_err();
        assert_eq!(err.code, "parse_error");
        assert_eq!(err.message, "could not parse assistant's response");
    }
}
