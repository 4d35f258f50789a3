//! The dispatcher routes a chat request to the adapter of the entry's provider.
//!
//! Providers are looked up by their stable string identifier. A provider string which is not a
//! [`ProviderIdentifier`], or which has no adapter registered (for example the catalog-only
//! `custom-openai`), fails with [`ErrorKind::UnsupportedProvider`] without any network I/O.

use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use crate::config::Config;
use crate::providers::huggingface::HUGGINGFACE_API_BASE;
use crate::providers::openai::{GROQ_API_BASE, OPENAI_API_BASE};
use crate::providers::providers::{
    HuggingFaceProvider, LocalProvider, OpenAIProvider, ProviderIdentifier,
};
use crate::providers::{ChatProvider, Error, ErrorKind};

pub(crate) struct Dispatcher {
    adapters: HashMap<ProviderIdentifier, Box<dyn ChatProvider>>,
}

impl Dispatcher {
    pub(crate) fn new() -> Dispatcher {
        Dispatcher {
            adapters: HashMap::new(),
        }
    }

    pub(crate) fn register(&mut self, adapter: Box<dyn ChatProvider>) {
        let id = adapter.id();

        if self.adapters.insert(id, adapter).is_some() {
            panic!("attempt to register two adapters for {}", id)
        }
    }

    /// Registers every adapter, pointed at the configured endpoints.
    pub(crate) fn from_settings(config: &Config) -> Result<Dispatcher, Error> {
        let timeout = config.timeout();
        let providers = &config.providers;

        let mut dispatcher = Dispatcher::new();

        dispatcher.register(Box::new(OpenAIProvider::new(
            ProviderIdentifier::Groq,
            providers.groq.api_base.as_deref().unwrap_or(GROQ_API_BASE),
            timeout,
        )?));
        dispatcher.register(Box::new(OpenAIProvider::new(
            ProviderIdentifier::OpenAI,
            providers.openai.api_base.as_deref().unwrap_or(OPENAI_API_BASE),
            timeout,
        )?));
        dispatcher.register(Box::new(HuggingFaceProvider::new(
            providers
                .huggingface
                .api_base
                .as_deref()
                .unwrap_or(HUGGINGFACE_API_BASE),
            timeout,
        )?));
        dispatcher.register(Box::new(LocalProvider));

        Ok(dispatcher)
    }

    /// Makes exactly one attempt against the adapter for `provider`.
    pub(crate) async fn call(
        &self,
        provider: &str,
        model: &str,
        credential: Option<&str>,
        message: &str,
    ) -> Result<String, Error> {
        let adapter = ProviderIdentifier::from_str(provider)
            .ok()
            .and_then(|id| self.adapters.get(&id))
            .ok_or_else(|| {
                Error::from_kind(ErrorKind::UnsupportedProvider).with_detail(provider)
            })?;

        debug!(provider, model, "dispatching chat request");

        adapter.complete(model, credential, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher_for(server: &MockServer) -> Dispatcher {
        let mut config = Config::default();

        config.providers.groq = Endpoint {
            api_base: Some(format!("{}/groq/v1", server.uri())),
        };
        config.providers.openai = Endpoint {
            api_base: Some(format!("{}/openai/v1", server.uri())),
        };
        config.providers.huggingface = Endpoint {
            api_base: Some(format!("{}/hf/models", server.uri())),
        };

        Dispatcher::from_settings(&config).unwrap()
    }

    #[tokio::test]
    async fn test_routes_by_provider() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/groq/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "from groq"}}],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-openai"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "from openai"}}],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hf/models/gpt2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"generated_text": "from hf"}])),
            )
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server);

        assert_eq!(
            dispatcher
                .call("groq", "llama-3.1-8b-instant", Some("sk-groq"), "hi")
                .await
                .unwrap(),
            "from groq"
        );
        assert_eq!(
            dispatcher
                .call("openai", "gpt-4o", Some("sk-openai"), "hi")
                .await
                .unwrap(),
            "from openai"
        );
        assert_eq!(
            dispatcher
                .call("huggingface", "gpt2", Some("hf"), "hi")
                .await
                .unwrap(),
            "from hf"
        );
    }

    #[tokio::test]
    async fn test_unsupported_providers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&server);

        for provider in ["anthropic", "custom-openai", "Groq", ""] {
            let err = dispatcher
                .call(provider, "model", Some("sk"), "hi")
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::UnsupportedProvider);
        }
    }

    #[tokio::test]
    async fn test_local_is_not_implemented() {
        let dispatcher = Dispatcher::from_settings(&Config::default()).unwrap();

        let err = dispatcher
            .call("local", "llama3", None, "hi")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = Config::default();
        config.providers.openai = Endpoint {
            api_base: Some(format!("http://{}/v1", addr)),
        };

        let dispatcher = Dispatcher::from_settings(&config).unwrap();

        let err = dispatcher
            .call("openai", "gpt-4o", Some("sk"), "hi")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unreachable);
    }

    #[test]
    #[should_panic]
    fn test_duplicate_adapter() {
        let mut dispatcher = Dispatcher::new();

        dispatcher.register(Box::new(LocalProvider));
        dispatcher.register(Box::new(LocalProvider));
    }
}
