//! Chat completions service.

use std::sync::Arc;
use tracing::instrument;

use super::ensure_success;
use crate::auth::AuthProvider;
use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::resilience::BackoffExecutor;
use crate::transport::{HttpRequest, HttpTransport};
use crate::types::chat::{AnalysisRequest, ChatRequest, ChatResponse};

/// Chat completions service.
pub struct ChatService {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    config: Arc<ClientConfig>,
}

impl ChatService {
    /// Creates a new chat service.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
        }
    }

    /// Sends `content` under a system `instruction` and returns the reply.
    ///
    /// Blank content is rejected without a network call.
    #[instrument(skip(self, request), fields(model = %self.config.model, chars = request.content.len()))]
    pub async fn analyze(&self, request: &AnalysisRequest) -> ClientResult<String> {
        if request.content.trim().is_empty() {
            return Err(ClientError::content_empty());
        }

        let http_request = self.build_request(request)?;
        let executor = BackoffExecutor::new(self.config.analyze_retry);

        let response = executor
            .execute(|| {
                let transport = Arc::clone(&self.transport);
                let req = http_request.clone();
                async move { ensure_success(transport.send(req).await?) }
            })
            .await?;

        let reply = response
            .json::<ChatResponse>()
            .ok()
            .and_then(|body| body.content().map(ToString::to_string))
            .ok_or_else(ClientError::analysis_failed)?;

        tracing::info!(reply_chars = reply.chars().count(), "Analysis completed");
        Ok(reply)
    }

    fn build_request(&self, request: &AnalysisRequest) -> ClientResult<HttpRequest> {
        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: request.messages(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut http_request = HttpRequest::post("chat/completions")
            .with_header("Content-Type", "application/json")
            .with_body(serde_json::to_vec(&body)?);
        self.auth.apply_auth(&mut http_request.headers);

        Ok(http_request)
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{BearerAuth, Credential};
    use crate::errors::ErrorKind;
    use crate::mocks::{MockResponse, MockTransport};
    use test_case::test_case;

    fn service(transport: &Arc<MockTransport>) -> ChatService {
        ChatService::new(
            Arc::clone(transport) as Arc<dyn HttpTransport>,
            Arc::new(BearerAuth::new(Credential::new("sk-test").unwrap())),
            Arc::new(ClientConfig::default()),
        )
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "model": "moonshot-v1-32k",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    #[test_case(""; "empty")]
    #[test_case("   "; "spaces")]
    #[test_case("\n\t "; "mixed whitespace")]
    #[tokio::test]
    async fn test_blank_content_never_sends(content: &str) {
        let transport = Arc::new(MockTransport::new());
        let chat = service(&transport);

        let err = chat
            .analyze(&AnalysisRequest::new(content, "summarize"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ContentEmpty);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_sends_fixed_parameters() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&completion("A short summary"));
        let chat = service(&transport);

        let reply = chat
            .analyze(&AnalysisRequest::new("hello world", "summarize"))
            .await
            .unwrap();

        assert_eq!(reply, "A short summary");

        let request = transport.last_request().unwrap();
        assert_eq!(request.path, "chat/completions");
        let body: serde_json::Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        assert_eq!(body["model"], "moonshot-v1-32k");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "summarize");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hello world");
    }

    #[tokio::test]
    async fn test_missing_reply_is_analysis_failure() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&serde_json::json!({"choices": []}));
        let chat = service(&transport);

        let err = chat
            .analyze(&AnalysisRequest::new("hello", "summarize"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AnalysisFailed);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_three_attempts() {
        let transport = Arc::new(MockTransport::new());
        transport.set_default(MockResponse::error(429, "slow down"));
        let chat = service(&transport);

        let err = chat
            .analyze(&AnalysisRequest::new("hello", "summarize"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.status(), Some(429));
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_credential_single_attempt() {
        let transport = Arc::new(MockTransport::new());
        transport.set_default(MockResponse::error(401, "Invalid Authentication"));
        let chat = service(&transport);

        let err = chat
            .analyze(&AnalysisRequest::new("hello", "summarize"))
            .await
            .unwrap_err();

        assert!(err.is_credential_invalid());
        assert_eq!(transport.request_count(), 1);
    }
}
