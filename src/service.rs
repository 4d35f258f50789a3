//! The operations exposed to the command line.
//!
//! Every mutation of the registry runs under one async mutation guard, together with the reload
//! of the runtime projection that follows it. Provider calls never hold the guard: the active
//! entry is captured under the guard, the call is made without it, and the outcome is recorded
//! under the guard again once the call has returned. An outcome is only recorded if the entry
//! still targets the same provider, model, and credential as the call did.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::catalog::{self, Catalog, ModelDescriptor, ProviderInfo};
use crate::providers::{self, dispatch::Dispatcher, ErrorKind};
use crate::registry::{self, ActiveModel, AuthState, EntryPatch, ModelRegistry};
use crate::state::{SharedState, SystemState};
use crate::store;
use crate::utils::errors::with_sources;

/// The message sent to check that the active entry works.
const VERIFY_MESSAGE: &str = "ping";

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("the system is not configured, run setup first")]
    NotConfigured,
    #[error("there is no active model")]
    ActiveModelNotFound,
    #[error("requested model \"{requested}\" does not match the active model \"{active}\"")]
    ModelMismatch { requested: String, active: String },
    #[error("model \"{0}\" is not in the registry")]
    ModelNotFound(String),
    #[error("the message is empty")]
    EmptyMessage,
    #[error("unknown provider \"{0}\"")]
    UnknownProvider(String),
    #[error("missing required field \"{0}\"")]
    MissingField(&'static str),
    #[error(transparent)]
    Dispatch(#[from] providers::Error),
    #[error(transparent)]
    Store(#[from] store::Error),
}

impl Error {
    /// The provider error category, for failures raised by the dispatcher.
    pub(crate) fn dispatch_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Dispatch(err) => Some(err.kind()),
            _ => None,
        }
    }
}

impl From<registry::Error> for Error {
    fn from(value: registry::Error) -> Self {
        match value {
            registry::Error::ActiveModelNotFound => Error::ActiveModelNotFound,
            registry::Error::ModelNotFound(id) => Error::ModelNotFound(id),
            registry::Error::Store(err) => Error::Store(err),
        }
    }
}

impl From<catalog::Error> for Error {
    fn from(value: catalog::Error) -> Self {
        match value {
            catalog::Error::UnknownProvider(provider) => Error::UnknownProvider(provider),
            catalog::Error::MissingField(field) => Error::MissingField(field),
            catalog::Error::Store(err) => Error::Store(err),
        }
    }
}

/// How the projection follows a recorded outcome.
#[derive(Debug, Clone, Copy)]
enum Refresh {
    /// Mirror the outcome into the projection when the entry is still active
    Sync,
    /// Recompute the projection from the store
    Reload,
}

/// How a call outcome moves the authentication state. `None` leaves it as it is.
fn auth_outcome<T>(outcome: &Result<T, providers::Error>) -> Option<AuthState> {
    match outcome {
        Ok(_) => Some(AuthState::Valid),
        Err(err) if err.kind() == ErrorKind::NotImplemented => None,
        Err(_) => Some(AuthState::Invalid),
    }
}

fn required(value: &str, field: &'static str) -> Result<String, Error> {
    let value = value.trim();

    if value.is_empty() {
        Err(Error::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

/// One registry entry as listed to the user. The credential is reduced to whether one is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct EntrySummary {
    pub id: String,
    pub provider: String,
    pub model: String,
    pub api_key_present: bool,
    pub auth_ok: AuthState,
    pub active: bool,
}

pub(crate) struct ConfigService {
    registry: ModelRegistry,
    catalog: Catalog,
    dispatcher: Dispatcher,
    state: Arc<SharedState>,
    mutations: Mutex<()>,
}

impl ConfigService {
    /// Builds the service and loads the projection from the store.
    pub(crate) fn start(
        registry: ModelRegistry,
        catalog: Catalog,
        dispatcher: Dispatcher,
        state: Arc<SharedState>,
    ) -> Result<ConfigService, Error> {
        state.load(&registry)?;

        Ok(ConfigService {
            registry,
            catalog,
            dispatcher,
            state,
            mutations: Mutex::new(()),
        })
    }

    pub(crate) fn status(&self) -> SystemState {
        self.state.snapshot()
    }

    /// Replaces the whole registry with a single entry for `provider` and `model`.
    pub(crate) async fn setup(
        &self,
        provider: &str,
        model: &str,
        credential: Option<String>,
    ) -> Result<SystemState, Error> {
        let provider = required(provider, "provider")?;
        let model = required(model, "model")?;

        if catalog::provider(&provider).is_none() {
            return Err(Error::UnknownProvider(provider));
        }

        let _guard = self.mutations.lock().await;

        self.registry.setup(&provider, &model, credential)?;
        self.state.load(&self.registry)?;

        Ok(self.state.snapshot())
    }

    /// Changes the model and/or the credential of the active entry. A blank credential
    /// leaves the stored one in place.
    pub(crate) async fn update(
        &self,
        model: Option<String>,
        credential: Option<String>,
    ) -> Result<SystemState, Error> {
        let patch = EntryPatch {
            model: model.map(|m| required(&m, "model")).transpose()?,
            credential: credential.filter(|key| !key.trim().is_empty()),
        };

        let _guard = self.mutations.lock().await;

        self.registry.patch_active(patch)?;
        self.state.load(&self.registry)?;

        Ok(self.state.snapshot())
    }

    pub(crate) async fn activate(&self, id: &str) -> Result<SystemState, Error> {
        let _guard = self.mutations.lock().await;

        self.registry.activate(id)?;
        self.state.load(&self.registry)?;

        Ok(self.state.snapshot())
    }

    /// Deletes the stored record and returns to the unconfigured state.
    pub(crate) async fn reset(&self) -> Result<(), Error> {
        let _guard = self.mutations.lock().await;

        self.registry.reset()?;
        self.state.reset();

        Ok(())
    }

    fn active_for_dispatch(&self) -> Result<ActiveModel, Error> {
        self.registry.get_active()?.ok_or(Error::NotConfigured)
    }

    async fn dispatch(&self, attempt: &ActiveModel, message: &str) -> Result<String, providers::Error> {
        let entry = &attempt.entry;

        self.dispatcher
            .call(&entry.provider, &entry.model, entry.credential(), message)
            .await
    }

    async fn try_record_outcome(
        &self,
        attempt: &ActiveModel,
        auth: AuthState,
        refresh: Refresh,
    ) -> Result<(), Error> {
        let _guard = self.mutations.lock().await;

        let recorded = self.registry.record_auth(attempt, auth)?;

        let still_active = recorded
            .as_ref()
            .and_then(|registry| registry.active_model_id.as_deref())
            == Some(attempt.id.as_str());

        match refresh {
            Refresh::Sync if still_active => self.state.sync_auth(auth),
            _ => self.state.load(&self.registry)?,
        }

        Ok(())
    }

    /// Records how a call went. A failure to record is logged and does not replace the
    /// outcome of the call, which the caller still returns.
    async fn record_outcome(
        &self,
        attempt: &ActiveModel,
        auth: Option<AuthState>,
        refresh: Refresh,
    ) {
        let auth = match auth {
            Some(auth) => auth,
            None => return,
        };

        if let Err(err) = self.try_record_outcome(attempt, auth, refresh).await {
            error!(id = %attempt.id, %auth, error = %with_sources(&err), "failed to record the authentication outcome");
        }
    }

    /// Makes one call with the active entry and records whether it worked.
    pub(crate) async fn verify(&self) -> Result<SystemState, Error> {
        let attempt = {
            let _guard = self.mutations.lock().await;
            self.active_for_dispatch()?
        };

        info!(provider = %attempt.entry.provider, model = %attempt.entry.model, "verifying active model");

        let outcome = self.dispatch(&attempt, VERIFY_MESSAGE).await;

        self.record_outcome(&attempt, auth_outcome(&outcome), Refresh::Reload)
            .await;

        outcome?;

        Ok(self.state.snapshot())
    }

    /// Sends `message` to the active model, which must be `model_id`.
    ///
    /// A request for another model is rejected before anything else and leaves the active
    /// entry alone. An empty message counts as a failed call on the active entry.
    pub(crate) async fn chat(&self, model_id: &str, message: &str) -> Result<String, Error> {
        let attempt = {
            let _guard = self.mutations.lock().await;

            let active = self.active_for_dispatch()?;

            if active.id != model_id {
                return Err(Error::ModelMismatch {
                    requested: model_id.to_string(),
                    active: active.id,
                });
            }

            if message.trim().is_empty() {
                if self.registry.record_auth(&active, AuthState::Invalid)?.is_some() {
                    self.state.sync_auth(AuthState::Invalid);
                }

                return Err(Error::EmptyMessage);
            }

            active
        };

        debug!(id = %attempt.id, "sending chat message");

        let outcome = self.dispatch(&attempt, message).await;

        self.record_outcome(&attempt, auth_outcome(&outcome), Refresh::Sync)
            .await;

        Ok(outcome?)
    }

    /// The id of the active entry, if there is one.
    pub(crate) fn active_id(&self) -> Result<Option<String>, Error> {
        Ok(self.registry.get_active()?.map(|active| active.id))
    }

    pub(crate) fn entries(&self) -> Result<Vec<EntrySummary>, Error> {
        let registry = match self.registry.load()? {
            Some(registry) if !registry.is_empty() => registry,
            _ => return Ok(Vec::new()),
        };

        let active = registry.active().map(|(id, _)| id.to_string());

        Ok(registry
            .models
            .into_iter()
            .map(|(id, entry)| EntrySummary {
                active: active.as_deref() == Some(id.as_str()),
                api_key_present: entry.has_credential(),
                auth_ok: entry.auth,
                provider: entry.provider,
                model: entry.model,
                id,
            })
            .collect())
    }

    pub(crate) fn providers(&self) -> &'static [ProviderInfo] {
        catalog::providers()
    }

    pub(crate) fn models(&self, provider: &str) -> Result<Vec<ModelDescriptor>, Error> {
        Ok(self.catalog.models(provider)?)
    }

    pub(crate) fn add_model(&self, model: ModelDescriptor) -> Result<(), Error> {
        Ok(self.catalog.add_model(model)?)
    }
}
