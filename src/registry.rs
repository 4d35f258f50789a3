//! The model registry holds every configured model endpoint and designates one of them as
//! active. It is persisted as a single JSON record by the [`ConfigStore`](crate::store::ConfigStore):
//!
//! ```json
//! {
//!   "models": {
//!     "3f2a...": { "provider": "groq", "model": "llama-3.1-8b-instant", "api_key": "...", "auth_ok": null }
//!   },
//!   "active_model_id": "3f2a..."
//! }
//! ```
//!
//! Older installations stored a single flat entry (`provider`, `model` or `model_id`, `api_key`,
//! `auth_ok`). Such a record is upgraded to the registry shape the first time it is read, see
//! [`migrate::ensure_registry`]. Nothing past the migrator ever sees the legacy shape.
//!
//! Each entry carries an authentication tri-state recording the result of the last real call
//! made with its credential. It only becomes valid right after a successful call with the exact
//! (provider, model, credential) triple, and changing the credential sets it back to unknown.

pub(crate) mod migrate;
pub(crate) mod record;
pub(crate) mod registry;

pub(crate) use record::{AuthState, ModelEntry, Registry};
pub(crate) use registry::{ActiveModel, EntryPatch, Error, ModelRegistry};
