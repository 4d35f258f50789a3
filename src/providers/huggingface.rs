//! The HuggingFace inference API.
//!
//! Models are addressed by path (`POST {api_base}/{model}`) and take the message as a bare
//! `inputs` string. Text generation models answer with a list of generations.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::providers::apireq::{self, ReqwestError, Url};
use crate::providers::providers::ProviderIdentifier;
use crate::providers::{require_credential, ChatProvider, Error, ErrorKind};

pub(crate) const HUGGINGFACE_API_BASE: &str = "https://api-inference.huggingface.co/models/";

#[derive(Serialize, Debug)]
struct InferenceRequest<'m> {
    inputs: &'m str,
}

#[derive(Deserialize, Debug)]
struct Generation {
    generated_text: String,
}

pub(crate) struct HuggingFaceProvider {
    api_base: Url,
    client: Client,
}

impl HuggingFaceProvider {
    pub(crate) fn new(api_base: &str, timeout: Duration) -> Result<HuggingFaceProvider, Error> {
        let api_base = apireq::parse_api_base(api_base)
            .map_err(|e| Error::from_source(ErrorKind::RequestFailed, Box::new(e)))?;

        Ok(HuggingFaceProvider {
            api_base,
            client: apireq::build_client(timeout)?,
        })
    }

    /// The inference endpoint of `model`. Each part of the model id becomes one path
    /// segment under the API base.
    fn model_url(&self, model: &str) -> Result<Url, Error> {
        let mut url = self.api_base.clone();

        url.path_segments_mut()
            .map_err(|()| {
                Error::from_kind(ErrorKind::RequestFailed)
                    .with_detail("the API base cannot carry a model path")
            })?
            .pop_if_empty()
            .extend(model.split('/').filter(|segment| !segment.is_empty()));

        Ok(url)
    }
}

#[async_trait]
impl ChatProvider for HuggingFaceProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::HuggingFace
    }

    async fn complete(
        &self,
        model: &str,
        credential: Option<&str>,
        message: &str,
    ) -> Result<String, Error> {
        let api_key = require_credential(credential)?;

        let url = self.model_url(model)?;

        debug!(model, "requesting inference");

        let res = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&InferenceRequest { inputs: message })
            .send()
            .await
            .map_err(ReqwestError::from)?;

        let status = res.status();

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();

            let kind = match status {
                StatusCode::UNAUTHORIZED => ErrorKind::InvalidCredential,
                _ => ErrorKind::Upstream,
            };

            return Err(Error::from_kind(kind).with_detail(body));
        }

        let body = res.text().await.map_err(ReqwestError::from)?;

        let generations: Vec<Generation> = serde_json::from_str(&body)
            .map_err(|e| Error::from_source(ErrorKind::MalformedResponse, Box::new(e)))?;

        generations
            .into_iter()
            .next()
            .map(|generation| generation.generated_text)
            .ok_or_else(|| Error::from_kind(ErrorKind::MalformedResponse))
    }
}
