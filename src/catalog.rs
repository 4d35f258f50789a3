//! Read-only catalogs of known providers and their built-in models.
//!
//! The built-in model list of a provider is merged with the models the user added through
//! [`Catalog::add_model`]; those are kept in the custom model store.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::providers::providers::ProviderIdentifier;
use crate::store::{self, CustomModelStore};

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("unknown provider \"{0}\"")]
    UnknownProvider(String),
    #[error("missing required field \"{0}\"")]
    MissingField(&'static str),
    #[error(transparent)]
    Store(#[from] store::Error),
}

/// A provider the user can choose during setup.
#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct ProviderInfo {
    pub id: ProviderIdentifier,
    pub name: &'static str,
}

/// A model offered for a provider, either built in or added by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ModelDescriptor {
    pub provider: String,
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

const PROVIDERS: [ProviderInfo; 4] = [
    ProviderInfo {
        id: ProviderIdentifier::Groq,
        name: "Groq",
    },
    ProviderInfo {
        id: ProviderIdentifier::OpenAI,
        name: "OpenAI",
    },
    ProviderInfo {
        id: ProviderIdentifier::HuggingFace,
        name: "HuggingFace",
    },
    ProviderInfo {
        id: ProviderIdentifier::Local,
        name: "Local / Ollama",
    },
];

fn builtin(provider: ProviderIdentifier, id: &str, name: &str) -> ModelDescriptor {
    ModelDescriptor {
        provider: provider.to_string(),
        id: id.to_string(),
        name: name.to_string(),
        base_url: None,
    }
}

lazy_static! {
    // Every provider with a model listing has an entry here, even when it has no
    // built-in models. Models can only be added for providers listed here.
    static ref BUILTIN_MODELS: HashMap<ProviderIdentifier, Vec<ModelDescriptor>> = HashMap::from([
        (
            ProviderIdentifier::Groq,
            vec![
                builtin(ProviderIdentifier::Groq, "llama-3.1-8b-instant", "LLaMA 3.1 (8B Instant)"),
                builtin(ProviderIdentifier::Groq, "llama-3.1-70b-versatile", "LLaMA 3.1 (70B Versatile)"),
            ],
        ),
        (
            ProviderIdentifier::OpenAI,
            vec![
                builtin(ProviderIdentifier::OpenAI, "gpt-4o-mini", "GPT-4o Mini"),
                builtin(ProviderIdentifier::OpenAI, "gpt-4o", "GPT-4o"),
            ],
        ),
        (ProviderIdentifier::HuggingFace, Vec::new()),
        (ProviderIdentifier::Local, Vec::new()),
        (ProviderIdentifier::CustomOpenAI, Vec::new()),
    ]);
}

/// Providers offered during setup.
pub(crate) fn providers() -> &'static [ProviderInfo] {
    &PROVIDERS
}

/// Returns the provider with the given identifier if it is offered during setup.
pub(crate) fn provider(id: &str) -> Option<&'static ProviderInfo> {
    PROVIDERS.iter().find(|info| info.id.to_string() == id)
}

pub(crate) fn builtin_models(provider: &str) -> Result<&'static [ModelDescriptor], Error> {
    ProviderIdentifier::from_str(provider)
        .ok()
        .and_then(|id| BUILTIN_MODELS.get(&id))
        .map(|models| models.as_slice())
        .ok_or_else(|| Error::UnknownProvider(provider.to_string()))
}

fn required(value: String, field: &'static str) -> Result<String, Error> {
    let value = value.trim();

    if value.is_empty() {
        Err(Error::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

pub(crate) struct Catalog {
    custom: CustomModelStore,
}

impl Catalog {
    pub(crate) fn new(custom: CustomModelStore) -> Catalog {
        Catalog { custom }
    }

    /// Built-in models for `provider` followed by the ones the user added.
    pub(crate) fn models(&self, provider: &str) -> Result<Vec<ModelDescriptor>, Error> {
        let mut models = builtin_models(provider)?.to_vec();

        models.extend(
            self.custom
                .load()
                .into_iter()
                .filter(|model| model.provider == provider),
        );

        Ok(models)
    }

    pub(crate) fn add_model(&self, model: ModelDescriptor) -> Result<(), Error> {
        let provider = required(model.provider, "provider")?;
        let id = required(model.id, "id")?;
        let name = required(model.name, "name")?;

        builtin_models(&provider)?;

        let base_url = model
            .base_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        self.custom.append(ModelDescriptor {
            provider,
            id,
            name,
            base_url,
        })?;

        Ok(())
    }
}
