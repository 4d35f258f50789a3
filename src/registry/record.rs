use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::store::RawRecord;

pub(crate) const MODELS_KEY: &str = "models";
pub(crate) const ACTIVE_KEY: &str = "active_model_id";

const LEGACY_KEYS: [&str; 5] = ["provider", "model", "model_id", "api_key", "auth_ok"];

/// The result of the last authenticated call made with an entry's credential.
///
/// Persisted as `null`, `true`, or `false`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub(crate) enum AuthState {
    /// Never verified since the credential was last changed
    #[default]
    #[strum(serialize = "unknown")]
    Unknown,
    /// The last call succeeded
    #[strum(serialize = "ok")]
    Valid,
    /// The last call failed
    #[strum(serialize = "failed")]
    Invalid,
}

impl From<Option<bool>> for AuthState {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => AuthState::Unknown,
            Some(true) => AuthState::Valid,
            Some(false) => AuthState::Invalid,
        }
    }
}

impl From<AuthState> for Option<bool> {
    fn from(value: AuthState) -> Self {
        match value {
            AuthState::Unknown => None,
            AuthState::Valid => Some(true),
            AuthState::Invalid => Some(false),
        }
    }
}

/// Empty credentials are the same as no credential.
pub(crate) fn normalize_credential(credential: Option<String>) -> Option<String> {
    credential
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// One configured model endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ModelEntry {
    pub provider: String,
    pub model: String,
    #[serde(rename = "api_key", default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(rename = "auth_ok", default)]
    pub auth: AuthState,
}

impl ModelEntry {
    pub(crate) fn new(provider: &str, model: &str, credential: Option<String>) -> ModelEntry {
        ModelEntry {
            provider: provider.to_string(),
            model: model.to_string(),
            credential: normalize_credential(credential),
            auth: AuthState::Unknown,
        }
    }

    pub(crate) fn credential(&self) -> Option<&str> {
        self.credential.as_deref().filter(|key| !key.is_empty())
    }

    pub(crate) fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    /// Whether `other` targets the same endpoint with the same credential.
    pub(crate) fn same_target(&self, other: &ModelEntry) -> bool {
        self.provider == other.provider
            && self.model == other.model
            && self.credential() == other.credential()
    }
}

// The credential must never end up in logs.
impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field(
                "credential",
                &self.credential().map(|_| "<redacted>"),
            )
            .field("auth", &self.auth)
            .finish()
    }
}

/// Generates a fresh, opaque registry key.
pub(crate) fn new_model_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// The canonical configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub(crate) struct Registry {
    pub models: BTreeMap<String, ModelEntry>,
    pub active_model_id: Option<String>,
}

impl Registry {
    pub(crate) fn empty() -> Registry {
        Registry::default()
    }

    /// A registry holding only `entry`, which is active.
    pub(crate) fn single(entry: ModelEntry) -> Registry {
        let id = new_model_id();

        Registry {
            models: BTreeMap::from([(id.clone(), entry)]),
            active_model_id: Some(id),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// The active entry. A dangling active id means there is no active entry.
    pub(crate) fn active(&self) -> Option<(&str, &ModelEntry)> {
        let id = self.active_model_id.as_deref()?;

        self.models.get(id).map(|entry| (id, entry))
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut ModelEntry> {
        let id = self.active_model_id.as_deref()?;

        self.models.get_mut(id)
    }

    pub(crate) fn to_raw(&self) -> Result<RawRecord, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(record) => Ok(record),
            // A struct always serializes to an object
            _ => unreachable!("registry serialized to a non-object"),
        }
    }
}

/// The single-model record written by older versions.
#[derive(Deserialize)]
pub(crate) struct LegacyRecord {
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    auth_ok: Option<bool>,
}

impl LegacyRecord {
    /// Converts the record into a registry entry. Records missing a provider or a model
    /// cannot describe an endpoint and yield `None`.
    pub(crate) fn into_entry(self) -> Option<ModelEntry> {
        let provider = self.provider.filter(|p| !p.trim().is_empty())?;
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .or(self.model_id.filter(|m| !m.trim().is_empty()))?;

        Some(ModelEntry {
            provider,
            model,
            credential: normalize_credential(self.api_key),
            auth: self.auth_ok.into(),
        })
    }
}

/// A decoded configuration record.
pub(crate) enum StoredRecord {
    Registry(Registry),
    Legacy(LegacyRecord),
    /// Carries neither registry nor legacy fields
    Unrecognized,
    /// Carries registry or legacy fields that failed to decode, or only half of the
    /// registry fields
    Corrupt,
}

impl StoredRecord {
    pub(crate) fn decode(raw: &RawRecord) -> StoredRecord {
        if raw.contains_key(MODELS_KEY) && raw.contains_key(ACTIVE_KEY) {
            return match serde_json::from_value(Value::Object(raw.clone())) {
                Ok(registry) => StoredRecord::Registry(registry),
                Err(err) => {
                    warn!(error = %err, "failed to decode the model registry");
                    StoredRecord::Corrupt
                }
            };
        }

        if LEGACY_KEYS.iter().any(|&key| raw.contains_key(key)) {
            return match serde_json::from_value(Value::Object(raw.clone())) {
                Ok(legacy) => StoredRecord::Legacy(legacy),
                Err(err) => {
                    warn!(error = %err, "failed to decode the legacy configuration record");
                    StoredRecord::Corrupt
                }
            };
        }

        if raw.contains_key(MODELS_KEY) || raw.contains_key(ACTIVE_KEY) {
            warn!("model registry record is incomplete");
            return StoredRecord::Corrupt;
        }

        StoredRecord::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn entry(provider: &str, model: &str) -> ModelEntry {
        ModelEntry::new(provider, model, Some("sk-test".to_string()))
    }

    #[test]
    fn test_auth_state_persists_as_nullable_bool() {
        let mut e = entry("groq", "llama-3.1-8b-instant");

        assert_eq!(serde_json::to_value(&e).unwrap()["auth_ok"], Value::Null);

        e.auth = AuthState::Invalid;
        assert_eq!(serde_json::to_value(&e).unwrap()["auth_ok"], json!(false));

        let decoded: ModelEntry =
            serde_json::from_value(json!({"provider": "openai", "model": "gpt-4o", "auth_ok": true}))
                .unwrap();
        assert_eq!(decoded.auth, AuthState::Valid);
        assert_eq!(decoded.credential, None);
    }

    #[test]
    fn test_debug_redacts_credential() {
        let e = ModelEntry::new("openai", "gpt-4o", Some("sk-very-secret".to_string()));

        let debug = format!("{:?}", e);

        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_blank_credential_is_absent() {
        let e = ModelEntry::new("groq", "llama-3.1-8b-instant", Some("   ".to_string()));

        assert_eq!(e.credential, None);
        assert!(!e.has_credential());
    }

    #[test]
    fn test_active_resolution() {
        let mut registry = Registry::single(entry("groq", "llama-3.1-8b-instant"));
        let (id, active) = registry.active().unwrap();
        assert_eq!(active.provider, "groq");
        assert!(registry.models.contains_key(id));

        registry.active_model_id = Some("dangling".to_string());
        assert!(registry.active().is_none());
        assert!(registry.active_mut().is_none());

        registry.active_model_id = None;
        assert!(registry.active().is_none());

        let empty = Registry {
            models: BTreeMap::new(),
            active_model_id: Some("ghost".to_string()),
        };
        assert!(empty.active().is_none());
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = new_model_id();
        let b = new_model_id();

        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_decode_registry() {
        let record = raw(json!({
            "models": {"abc": {"provider": "groq", "model": "llama-3.1-8b-instant", "auth_ok": true}},
            "active_model_id": "abc",
        }));

        match StoredRecord::decode(&record) {
            StoredRecord::Registry(registry) => {
                let (id, active) = registry.active().unwrap();
                assert_eq!(id, "abc");
                assert_eq!(active.auth, AuthState::Valid);
            }
            _ => panic!("expected a registry"),
        }
    }

    #[test]
    fn test_decode_empty_registry() {
        let record = raw(json!({"models": {}, "active_model_id": null}));

        assert!(matches!(
            StoredRecord::decode(&record),
            StoredRecord::Registry(r) if r.is_empty()
        ));
    }

    #[test]
    fn test_decode_requires_both_registry_keys() {
        let record = raw(json!({"models": {}}));

        assert!(matches!(StoredRecord::decode(&record), StoredRecord::Corrupt));
    }

    #[test]
    fn test_decode_legacy() {
        let record = raw(json!({
            "provider": "openai",
            "model_id": "gpt-4o",
            "api_key": "sk-legacy",
            "auth_ok": false,
        }));

        let legacy = match StoredRecord::decode(&record) {
            StoredRecord::Legacy(legacy) => legacy,
            _ => panic!("expected a legacy record"),
        };

        let entry = legacy.into_entry().unwrap();
        assert_eq!(entry.model, "gpt-4o");
        assert_eq!(entry.credential(), Some("sk-legacy"));
        assert_eq!(entry.auth, AuthState::Invalid);
    }

    #[test]
    fn test_legacy_prefers_model_over_model_id() {
        let legacy: LegacyRecord = serde_json::from_value(json!({
            "provider": "groq",
            "model": "llama-3.1-70b-versatile",
            "model_id": "llama-3.1-8b-instant",
        }))
        .unwrap();

        assert_eq!(legacy.into_entry().unwrap().model, "llama-3.1-70b-versatile");
    }

    #[test]
    fn test_legacy_without_model_has_no_entry() {
        let legacy: LegacyRecord =
            serde_json::from_value(json!({"provider": "groq", "api_key": "sk"})).unwrap();

        assert!(legacy.into_entry().is_none());
    }

    #[test]
    fn test_decode_corrupt() {
        let record = raw(json!({"models": [1, 2], "active_model_id": 7}));
        assert!(matches!(StoredRecord::decode(&record), StoredRecord::Corrupt));

        let record = raw(json!({"provider": ["groq"]}));
        assert!(matches!(StoredRecord::decode(&record), StoredRecord::Corrupt));
    }

    #[test]
    fn test_decode_unrecognized() {
        let record = raw(json!({"theme": "dark"}));

        assert!(matches!(
            StoredRecord::decode(&record),
            StoredRecord::Unrecognized
        ));
    }
}
