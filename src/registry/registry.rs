use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::migrate::ensure_registry;
use super::record::{normalize_credential, AuthState, ModelEntry, Registry, ACTIVE_KEY};
use crate::store::{self, ConfigStore, RawRecord};

#[derive(Error, Debug)]
pub(crate) enum Error {
    /// There is no record, the registry is empty, or the active id is dangling
    #[error("there is no active model")]
    ActiveModelNotFound,
    /// The id is not a key of the registry
    #[error("model \"{0}\" is not in the registry")]
    ModelNotFound(String),
    #[error(transparent)]
    Store(#[from] store::Error),
}

/// The active entry together with its registry key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActiveModel {
    pub id: String,
    pub entry: ModelEntry,
}

/// Fields of an entry to overwrite. `None` leaves the field as it is.
#[derive(Debug, Default, Clone)]
pub(crate) struct EntryPatch {
    pub model: Option<String>,
    pub credential: Option<String>,
}

impl EntryPatch {
    /// Applies the patch. A credential different from the current one resets the
    /// authentication state.
    ///
    /// Changing only the model keeps the authentication state.
    fn apply(self, entry: &mut ModelEntry) {
        if let Some(model) = self.model {
            entry.model = model;
        }

        if let Some(credential) = self.credential {
            let credential = normalize_credential(Some(credential));

            if credential != entry.credential {
                entry.credential = credential;
                entry.auth = AuthState::Unknown;
            }
        }
    }
}

/// All reads and writes of model entries go through here. Every mutation is a
/// load-modify-save of the whole record; nothing is cached between calls.
#[derive(Debug, Clone)]
pub(crate) struct ModelRegistry {
    store: ConfigStore,
}

impl ModelRegistry {
    pub(crate) fn new(store: ConfigStore) -> ModelRegistry {
        ModelRegistry { store }
    }

    /// Reads the registry, migrating older records. `None` when nothing was ever saved.
    pub(crate) fn load(&self) -> Result<Option<Registry>, Error> {
        let raw = match self.store.load() {
            Some(raw) => raw,
            None => return Ok(None),
        };

        Ok(Some(ensure_registry(&self.store, raw)?))
    }

    pub(crate) fn get_active(&self) -> Result<Option<ActiveModel>, Error> {
        let registry = match self.load()? {
            Some(registry) => registry,
            None => return Ok(None),
        };

        Ok(registry.active().map(|(id, entry)| ActiveModel {
            id: id.to_string(),
            entry: entry.clone(),
        }))
    }

    fn save(&self, registry: &Registry) -> Result<(), Error> {
        self.store.save(&registry.to_raw().map_err(store::Error::from)?)?;

        Ok(())
    }

    /// Replaces everything with a single active entry under a fresh id.
    pub(crate) fn setup(
        &self,
        provider: &str,
        model: &str,
        credential: Option<String>,
    ) -> Result<Registry, Error> {
        let registry = Registry::single(ModelEntry::new(provider, model, credential));

        info!(provider, model, "replacing the model registry");

        self.save(&registry)?;

        Ok(registry)
    }

    pub(crate) fn patch_active(&self, patch: EntryPatch) -> Result<Registry, Error> {
        let mut registry = self.load()?.ok_or(Error::ActiveModelNotFound)?;

        let entry = registry.active_mut().ok_or(Error::ActiveModelNotFound)?;

        patch.apply(entry);

        info!(provider = %entry.provider, model = %entry.model, auth = %entry.auth, "updated the active model");

        self.save(&registry)?;

        Ok(registry)
    }

    /// Makes an existing entry the active one.
    pub(crate) fn activate(&self, id: &str) -> Result<Registry, Error> {
        let mut registry = self
            .load()?
            .ok_or_else(|| Error::ModelNotFound(id.to_string()))?;

        if !registry.models.contains_key(id) {
            return Err(Error::ModelNotFound(id.to_string()));
        }

        info!(id, "activated model");

        // Only the active id changes, the entries are left as stored
        let mut fields = RawRecord::new();
        fields.insert(ACTIVE_KEY.to_string(), Value::String(id.to_string()));

        self.store.patch(fields)?;

        registry.active_model_id = Some(id.to_string());

        Ok(registry)
    }

    /// Records the outcome of a call made with `attempt`.
    ///
    /// The outcome is only written if the entry still targets the same provider, model,
    /// and credential as the attempt. Returns the updated registry, or `None` if the entry
    /// changed or disappeared while the call was in flight.
    pub(crate) fn record_auth(
        &self,
        attempt: &ActiveModel,
        auth: AuthState,
    ) -> Result<Option<Registry>, Error> {
        let mut registry = match self.load()? {
            Some(registry) => registry,
            None => return Ok(None),
        };

        match registry.models.get_mut(&attempt.id) {
            Some(entry) if entry.same_target(&attempt.entry) => entry.auth = auth,
            _ => {
                debug!(id = %attempt.id, "entry changed during the call, discarding the outcome");
                return Ok(None);
            }
        }

        debug!(id = %attempt.id, %auth, "recording authentication outcome");

        self.save(&registry)?;

        Ok(Some(registry))
    }

    /// Deletes the stored record.
    pub(crate) fn reset(&self) -> Result<(), Error> {
        info!("resetting the model registry");

        self.store.delete()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn temp_registry() -> (TempDir, ModelRegistry) {
        let dir = TempDir::new().unwrap();
        let registry = ModelRegistry::new(ConfigStore::new(dir.path().join("config.json")));
        (dir, registry)
    }

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn credential_patch(key: &str) -> EntryPatch {
        EntryPatch {
            credential: Some(key.to_string()),
            ..EntryPatch::default()
        }
    }

    fn set_active_auth(registry: &ModelRegistry, auth: AuthState) {
        let active = registry.get_active().unwrap().unwrap();
        registry.record_auth(&active, auth).unwrap().unwrap();
    }

    #[test]
    fn test_no_record_has_no_active_model() {
        let (_dir, registry) = temp_registry();

        assert!(registry.load().unwrap().is_none());
        assert!(registry.get_active().unwrap().is_none());
    }

    #[test]
    fn test_setup() {
        let (_dir, registry) = temp_registry();

        let setup = registry
            .setup("groq", "llama-3.1-8b-instant", Some("sk-abc".to_string()))
            .unwrap();

        let active = registry.get_active().unwrap().unwrap();

        assert_eq!(setup.models.len(), 1);
        assert_eq!(setup.active_model_id.as_deref(), Some(active.id.as_str()));
        assert_eq!(
            active.entry,
            ModelEntry {
                provider: "groq".to_string(),
                model: "llama-3.1-8b-instant".to_string(),
                credential: Some("sk-abc".to_string()),
                auth: AuthState::Unknown,
            }
        );
    }

    #[test]
    fn test_setup_discards_previous_entries() {
        let (_dir, registry) = temp_registry();

        let first = registry.setup("openai", "gpt-4o", Some("sk-1".to_string())).unwrap();
        let second = registry.setup("groq", "llama-3.1-70b-versatile", None).unwrap();

        let loaded = registry.load().unwrap().unwrap();

        assert_eq!(loaded, second);
        assert_eq!(loaded.models.len(), 1);
        assert_ne!(first.active_model_id, second.active_model_id);
    }

    #[test]
    fn test_dangling_active_id() {
        let (dir, registry) = temp_registry();

        ConfigStore::new(dir.path().join("config.json"))
            .save(&raw(json!({
                "models": {"a": {"provider": "groq", "model": "llama-3.1-8b-instant"}},
                "active_model_id": "b",
            })))
            .unwrap();

        assert!(registry.get_active().unwrap().is_none());
        assert!(matches!(
            registry.patch_active(credential_patch("sk")),
            Err(Error::ActiveModelNotFound)
        ));
    }

    #[test]
    fn test_patch_without_record() {
        let (_dir, registry) = temp_registry();

        assert!(matches!(
            registry.patch_active(credential_patch("sk")),
            Err(Error::ActiveModelNotFound)
        ));
        assert!(registry.load().unwrap().is_none());
    }

    #[test]
    fn test_credential_change_resets_auth() {
        for prior in [AuthState::Unknown, AuthState::Valid, AuthState::Invalid] {
            let (_dir, registry) = temp_registry();

            registry
                .setup("groq", "llama-3.1-8b-instant", Some("sk-abc".to_string()))
                .unwrap();
            set_active_auth(&registry, prior);

            registry.patch_active(credential_patch("sk-new")).unwrap();

            let active = registry.get_active().unwrap().unwrap();
            assert_eq!(active.entry.credential(), Some("sk-new"));
            assert_eq!(active.entry.auth, AuthState::Unknown);
        }
    }

    #[test]
    fn test_same_credential_keeps_auth() {
        let (_dir, registry) = temp_registry();

        registry
            .setup("groq", "llama-3.1-8b-instant", Some("sk-abc".to_string()))
            .unwrap();
        set_active_auth(&registry, AuthState::Valid);

        registry.patch_active(credential_patch(" sk-abc ")).unwrap();

        let active = registry.get_active().unwrap().unwrap();
        assert_eq!(active.entry.auth, AuthState::Valid);
    }

    #[test]
    fn test_model_change_keeps_auth() {
        let (_dir, registry) = temp_registry();

        registry
            .setup("groq", "llama-3.1-8b-instant", Some("sk-abc".to_string()))
            .unwrap();
        set_active_auth(&registry, AuthState::Valid);

        registry
            .patch_active(EntryPatch {
                model: Some("llama-3.1-70b-versatile".to_string()),
                credential: None,
            })
            .unwrap();

        let active = registry.get_active().unwrap().unwrap();
        assert_eq!(active.entry.model, "llama-3.1-70b-versatile");
        assert_eq!(active.entry.auth, AuthState::Valid);
    }

    #[test]
    fn test_patch_only_touches_active_entry() {
        let (dir, registry) = temp_registry();

        ConfigStore::new(dir.path().join("config.json"))
            .save(&raw(json!({
                "models": {
                    "a": {"provider": "groq", "model": "llama-3.1-8b-instant", "api_key": "sk-a", "auth_ok": true},
                    "b": {"provider": "openai", "model": "gpt-4o", "api_key": "sk-b", "auth_ok": true},
                },
                "active_model_id": "a",
            })))
            .unwrap();

        let patched = registry.patch_active(credential_patch("sk-a2")).unwrap();

        assert_eq!(patched.models["a"].auth, AuthState::Unknown);
        assert_eq!(patched.models["b"].auth, AuthState::Valid);
        assert_eq!(patched.models["b"].credential(), Some("sk-b"));
    }

    #[test]
    fn test_activate() {
        let (dir, registry) = temp_registry();

        ConfigStore::new(dir.path().join("config.json"))
            .save(&raw(json!({
                "models": {
                    "a": {"provider": "groq", "model": "llama-3.1-8b-instant"},
                    "b": {"provider": "openai", "model": "gpt-4o"},
                },
                "active_model_id": "a",
            })))
            .unwrap();

        registry.activate("b").unwrap();
        assert_eq!(registry.get_active().unwrap().unwrap().id, "b");

        assert!(matches!(
            registry.activate("c"),
            Err(Error::ModelNotFound(id)) if id == "c"
        ));
        assert_eq!(registry.load().unwrap().unwrap().models.len(), 2);
    }

    #[test]
    fn test_activate_keeps_other_fields() {
        let (dir, registry) = temp_registry();
        let store = ConfigStore::new(dir.path().join("config.json"));

        store
            .save(&raw(json!({
                "models": {
                    "a": {"provider": "groq", "model": "llama-3.1-8b-instant", "auth_ok": true},
                    "b": {"provider": "openai", "model": "gpt-4o", "auth_ok": false},
                },
                "active_model_id": "a",
                "theme": "dark",
            })))
            .unwrap();

        let activated = registry.activate("b").unwrap();
        assert_eq!(activated.active_model_id.as_deref(), Some("b"));

        let stored = store.load().unwrap();
        assert_eq!(stored["active_model_id"], json!("b"));
        assert_eq!(stored["theme"], json!("dark"));
        assert_eq!(stored["models"]["a"]["auth_ok"], json!(true));
        assert_eq!(stored["models"]["b"]["auth_ok"], json!(false));
    }

    #[test]
    fn test_activate_migrates_legacy_record() {
        let (dir, registry) = temp_registry();

        ConfigStore::new(dir.path().join("config.json"))
            .save(&raw(json!({"provider": "groq", "model": "llama-3.1-8b-instant"})))
            .unwrap();

        let id = registry.get_active().unwrap().unwrap().id;

        registry.activate(&id).unwrap();
        assert_eq!(registry.get_active().unwrap().unwrap().id, id);
    }

    #[test]
    fn test_record_auth_discarded_after_credential_change() {
        let (_dir, registry) = temp_registry();

        registry
            .setup("groq", "llama-3.1-8b-instant", Some("sk-abc".to_string()))
            .unwrap();
        let attempt = registry.get_active().unwrap().unwrap();

        registry.patch_active(credential_patch("sk-rotated")).unwrap();

        assert!(registry
            .record_auth(&attempt, AuthState::Valid)
            .unwrap()
            .is_none());
        assert_eq!(
            registry.get_active().unwrap().unwrap().entry.auth,
            AuthState::Unknown
        );
    }

    #[test]
    fn test_record_auth_after_reset() {
        let (_dir, registry) = temp_registry();

        registry.setup("openai", "gpt-4o", Some("sk".to_string())).unwrap();
        let attempt = registry.get_active().unwrap().unwrap();

        registry.reset().unwrap();

        assert!(registry
            .record_auth(&attempt, AuthState::Invalid)
            .unwrap()
            .is_none());
        assert!(registry.load().unwrap().is_none());
    }

    #[test]
    fn test_reset() {
        let (_dir, registry) = temp_registry();

        registry.setup("openai", "gpt-4o", Some("sk".to_string())).unwrap();
        registry.reset().unwrap();

        assert!(registry.load().unwrap().is_none());
        registry.reset().expect("resetting twice should succeed");
    }

    #[test]
    fn test_empty_registry_has_no_active_model() {
        let (dir, registry) = temp_registry();

        ConfigStore::new(dir.path().join("config.json"))
            .save(&raw(json!({"models": {}, "active_model_id": null})))
            .unwrap();

        let loaded = registry.load().unwrap().unwrap();
        assert_eq!(loaded.models, BTreeMap::new());
        assert!(registry.get_active().unwrap().is_none());
    }
}
