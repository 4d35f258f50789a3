//! Provider identifiers along with the concrete adapter types

use serde::Serialize;
use strum_macros;

/// The `ProviderIdentifier` is a unique per-provider identifier. Its string form is what the
/// model registry and the catalogs store, so the `to_string` and `FromStr` forms must remain
/// stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub(crate) enum ProviderIdentifier {
    Groq,
    OpenAI,
    HuggingFace,
    Local,
    /// OpenAI-compatible endpoints added by the user. Catalog only.
    #[strum(serialize = "custom-openai")]
    #[serde(rename = "custom-openai")]
    CustomOpenAI,
}

pub(crate) use super::huggingface::HuggingFaceProvider;
pub(crate) use super::local::LocalProvider;
pub(crate) use super::openai::OpenAIProvider;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_identifiers_are_stable() {
        let ids: Vec<String> = ProviderIdentifier::iter().map(|p| p.to_string()).collect();

        assert_eq!(ids, ["groq", "openai", "huggingface", "local", "custom-openai"]);

        for id in ProviderIdentifier::iter() {
            assert_eq!(ProviderIdentifier::from_str(&id.to_string()).unwrap(), id);
            assert_eq!(
                serde_json::to_value(id).unwrap(),
                serde_json::Value::String(id.to_string())
            );
        }

        assert!(ProviderIdentifier::from_str("Groq").is_err());
    }
}
