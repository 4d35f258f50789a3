//! An umbrella module for OpenAI-compatible chat completion providers

mod api;
mod provider;

pub(crate) use self::provider::{OpenAIProvider, GROQ_API_BASE, OPENAI_API_BASE};
