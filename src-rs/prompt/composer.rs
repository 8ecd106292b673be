use std::sync::Arc;

use tracing::debug;

use super::request::GenerationRequest;
use super::template::{build_system_message, render_project_summary};
use crate::error::ComposeError;
use crate::llm::{CompletionRequest, Message, ProviderAdapter};

/// Turns a request into the final prompt text.
#[derive(Clone)]
pub enum PromptComposer {
    /// Local template only; pure.
    Template,
    /// Sends the templated system message to an inference provider and returns its reply.
    Inference {
        provider: Arc<dyn ProviderAdapter>,
        model: Option<String>,
    },
}

impl PromptComposer {
    pub fn name(&self) -> &'static str {
        match self {
            PromptComposer::Template => "template",
            PromptComposer::Inference { .. } => "inference",
        }
    }

    pub async fn compose(&self, req: &GenerationRequest) -> Result<String, ComposeError> {
        let summary = render_project_summary(req);
        match self {
            PromptComposer::Template => Ok(summary),
            PromptComposer::Inference { provider, model } => {
                let request = CompletionRequest {
                    messages: vec![Message::system(&build_system_message(&summary)), Message::user(&summary)],
                    model: model.clone(),
                };
                debug!(model = ?request.model, "requesting enriched prompt");
                let response = provider.complete(request).await?;
                if response.content.trim().is_empty() {
                    return Err(ComposeError::EmptyCompletion);
                }
                Ok(response.content)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::llm::{LLMResponse, ProviderError};

    struct Recording {
        reply: Result<String, ProviderError>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl ProviderAdapter for Recording {
        async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone().map(|content| LLMResponse { content, raw: None })
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            objective: "o".to_string(),
            tech_stack: "t".to_string(),
            git_tool: "g".to_string(),
            user_info: "u".to_string(),
        }
    }

    #[tokio::test]
    async fn template_returns_summary() {
        let out = PromptComposer::Template.compose(&request()).await.unwrap();
        assert_eq!(out, render_project_summary(&request()));
    }

    #[tokio::test]
    async fn inference_sends_system_then_user_once() {
        let provider = Arc::new(Recording {
            reply: Ok("enriched".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let composer = PromptComposer::Inference {
            provider: provider.clone(),
            model: Some("m".to_string()),
        };
        assert_eq!(composer.compose(&request()).await.unwrap(), "enriched");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let roles: Vec<&str> = seen[0].messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user"]);
        assert!(seen[0].messages[0].content.contains("Objective: o"));
        assert_eq!(seen[0].model.as_deref(), Some("m"));
    }

    #[tokio::test]
    async fn inference_failure_is_reported_once() {
        let provider = Arc::new(Recording {
            reply: Err(ProviderError::new("server_error", "boom")),
            seen: Mutex::new(Vec::new()),
        });
        let composer = PromptComposer::Inference {
            provider: provider.clone(),
            model: None,
        };
        let err = composer.compose(&request()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(provider.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_completion_is_an_error() {
        let composer = PromptComposer::Inference {
            provider: Arc::new(Recording {
                reply: Ok("   ".to_string()),
                seen: Mutex::new(Vec::new()),
            }),
            model: None,
        };
        assert!(matches!(
            composer.compose(&request()).await,
            Err(ComposeError::EmptyCompletion)
        ));
    }
}
