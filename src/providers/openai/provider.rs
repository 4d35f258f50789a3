use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::providers::{
    openai::api, providers::ProviderIdentifier, require_credential, ChatProvider, Error,
    ErrorKind,
};

pub(crate) const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";
pub(crate) const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1/";

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        match value {
            api::Error::RequestFailed(err) => err.into(),
            api::Error::Authentication { body } => {
                Error::from_kind(ErrorKind::InvalidCredential).with_detail(body)
            }
            api::Error::Status { body, .. } => Error::from_kind(ErrorKind::Upstream).with_detail(body),
            value @ (api::Error::UnexpectedResponse(_) | api::Error::EmptyCompletion) => {
                Error::from_source(ErrorKind::MalformedResponse, Box::new(value))
            }
            value @ (api::Error::InvalidApiBase(_) | api::Error::InvalidEndpoint(_)) => {
                Error::from_source(ErrorKind::RequestFailed, Box::new(value))
            }
        }
    }
}

/// Serves every provider speaking the OpenAI chat completions protocol with bearer
/// authentication.
pub(crate) struct OpenAIProvider {
    id: ProviderIdentifier,
    api: api::OpenAIApi,
}

impl OpenAIProvider {
    pub(crate) fn new(
        id: ProviderIdentifier,
        api_base: &str,
        timeout: Duration,
    ) -> Result<OpenAIProvider, Error> {
        Ok(OpenAIProvider {
            id,
            api: api::OpenAIApi::new(api_base, timeout)?,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIProvider {
    fn id(&self) -> ProviderIdentifier {
        self.id
    }

    async fn complete(
        &self,
        model: &str,
        credential: Option<&str>,
        message: &str,
    ) -> Result<String, Error> {
        let api_key = require_credential(credential)?;

        debug!(provider = %self.id, model, "requesting chat completion");

        Ok(self.api.chat_completion(api_key, model, message).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::apireq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider_with(server: &MockServer, response: ResponseTemplate) -> OpenAIProvider {
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .respond_with(response)
            .mount(server)
            .await;

        OpenAIProvider::new(
            ProviderIdentifier::Groq,
            &format!("{}/openai/v1", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_is_invalid_credential() {
        let server = MockServer::start().await;
        let provider = provider_with(
            &server,
            ResponseTemplate::new(401).set_body_string(r#"{"error":{"message":"Invalid API Key"}}"#),
        )
        .await;

        let err = provider
            .complete("llama-3.1-8b-instant", Some("sk-bad"), "ping")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
    }

    #[tokio::test]
    async fn test_unauthorized_with_unreadable_body() {
        let base = apireq::testing::truncated_body_server(401).await;
        let provider =
            OpenAIProvider::new(ProviderIdentifier::OpenAI, &base, Duration::from_secs(5)).unwrap();

        let err = provider.complete("gpt-4o", Some("sk-bad"), "ping").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
    }

    #[tokio::test]
    async fn test_server_error_with_unreadable_body() {
        let base = apireq::testing::truncated_body_server(502).await;
        let provider =
            OpenAIProvider::new(ProviderIdentifier::OpenAI, &base, Duration::from_secs(5)).unwrap();

        let err = provider.complete("gpt-4o", Some("sk"), "ping").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn test_server_error_is_upstream_with_body() {
        let server = MockServer::start().await;
        let provider = provider_with(
            &server,
            ResponseTemplate::new(503).set_body_string("model overloaded"),
        )
        .await;

        let err = provider
            .complete("llama-3.1-8b-instant", Some("sk"), "ping")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.detail(), Some("model overloaded"));
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let server = MockServer::start().await;
        let provider = provider_with(
            &server,
            ResponseTemplate::new(200).set_body_string("<html>hello</html>"),
        )
        .await;

        let err = provider
            .complete("llama-3.1-8b-instant", Some("sk"), "ping")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_missing_credential_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider =
            OpenAIProvider::new(ProviderIdentifier::OpenAI, &server.uri(), Duration::from_secs(5))
                .unwrap();

        let err = provider.complete("gpt-4o", Some(""), "ping").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingCredential);
    }
}
