//! The runtime projection: a derived view of the active model, shared by every operation.

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::registry::{self, AuthState, ModelRegistry, Registry};

/// What `status` reports. Never the source of truth; always derivable from the stored registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct SystemState {
    pub configured: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub display_name: Option<String>,
    pub api_key_present: bool,
    pub auth_ok: AuthState,
}

impl SystemState {
    pub(crate) fn from_registry(registry: Option<&Registry>) -> SystemState {
        let entry = match registry.and_then(|registry| registry.active()) {
            Some((_, entry)) => entry,
            None => return SystemState::default(),
        };

        let provider = Some(entry.provider.clone()).filter(|p| !p.is_empty());
        let model = Some(entry.model.clone()).filter(|m| !m.is_empty());
        let api_key_present = entry.has_credential();

        SystemState {
            configured: provider.is_some() && model.is_some() && api_key_present,
            display_name: display_name(provider.as_deref(), model.as_deref()),
            provider,
            model,
            api_key_present,
            auth_ok: entry.auth,
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `groq` and `llama-3.1-8b-instant` become `Groq · Llama 3.1 8b Instant`.
pub(crate) fn display_name(provider: Option<&str>, model: Option<&str>) -> Option<String> {
    let (provider, model) = (provider?, model?);

    let model = model
        .split(|c| c == '-' || c == '_' || c == ' ')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");

    Some(format!("{} · {}", capitalize(provider), model))
}

/// Owns the projection. Whole values are swapped under the lock, so readers never observe a
/// partially updated state.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    current: RwLock<SystemState>,
}

impl SharedState {
    pub(crate) fn new() -> SharedState {
        SharedState::default()
    }

    pub(crate) fn snapshot(&self) -> SystemState {
        self.current.read().clone()
    }

    /// Recomputes every field from the stored registry.
    pub(crate) fn load(&self, registry: &ModelRegistry) -> Result<(), registry::Error> {
        let next = SystemState::from_registry(registry.load()?.as_ref());

        debug!(configured = next.configured, auth = %next.auth_ok, "reloaded system state");

        *self.current.write() = next;

        Ok(())
    }

    /// Back to the unconfigured baseline. Storage is not touched.
    pub(crate) fn reset(&self) {
        *self.current.write() = SystemState::default();
    }

    /// Mirrors an authentication outcome that was just persisted for the active entry.
    pub(crate) fn sync_auth(&self, auth: AuthState) {
        self.current.write().auth_ok = auth;
    }
}
