use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::apireq;
use crate::providers::apireq::Url;

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    /// The API Base is not a URL that can be used in a network request
    #[error("invalid api base")]
    InvalidApiBase(#[source] url::ParseError),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Some issue with the request
    #[error("{}", .0)]
    RequestFailed(#[from] apireq::ReqwestError),

    /// The API key was rejected
    #[error("authentication failed: {body}")]
    Authentication { body: String },

    /// Any other non-success status, along with the raw response body
    #[error("status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// A success response which is not a chat completion
    #[error("unexpected response")]
    UnexpectedResponse(#[source] serde_json::Error),

    /// A chat completion without any message content
    #[error("the completion contained no message")]
    EmptyCompletion,
}

#[derive(Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum Role {
    User,
}

/* Structures to serialize /chat/completions */

#[derive(Serialize, Debug)]
struct RequestMessage<'m> {
    role: Role,
    content: &'m str,
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'o> {
    model: &'o str,
    messages: [RequestMessage<'o>; 1],
}

/* Structures to deseralize /chat/completions */

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

/// A client for an OpenAI-compatible chat completions API.
pub(super) struct OpenAIApi {
    api_base: Url,
    client: Client,
}

impl OpenAIApi {
    pub(super) fn new(api_base: &str, timeout: Duration) -> Result<OpenAIApi, Error> {
        let api_base = apireq::parse_api_base(api_base).map_err(Error::InvalidApiBase)?;

        Ok(OpenAIApi {
            api_base,
            client: apireq::build_client(timeout)?,
        })
    }

    /// Sends `message` as the only user turn and returns the content of the first choice.
    pub(super) async fn chat_completion(
        &self,
        api_key: &str,
        model: &str,
        message: &str,
    ) -> Result<String, Error> {
        let url = self.api_base.join("chat/completions")?;

        let res = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&ChatCompletionRequest {
                model,
                messages: [RequestMessage {
                    role: Role::User,
                    content: message,
                }],
            })
            .send()
            .await
            .map_err(apireq::ReqwestError::from)?;

        let status = res.status();

        if !status.is_success() {
            // The status alone decides the failure, the body is only a detail
            let body = res.text().await.unwrap_or_default();

            return Err(match status {
                StatusCode::UNAUTHORIZED => Error::Authentication { body },
                _ => Error::Status { status, body },
            });
        }

        let body = res.text().await.map_err(apireq::ReqwestError::from)?;

        let completion: ChatCompletion =
            serde_json::from_str(&body).map_err(Error::UnexpectedResponse)?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(Error::EmptyCompletion)
    }
}
