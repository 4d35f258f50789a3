use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{read_json, try_read_json, write_json, Error};
use crate::catalog::ModelDescriptor;

/// Append-only list of model descriptors added by the user.
#[derive(Debug, Clone)]
pub(crate) struct CustomModelStore {
    path: PathBuf,
}

impl CustomModelStore {
    pub(crate) fn new<P: Into<PathBuf>>(path: P) -> CustomModelStore {
        CustomModelStore { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored descriptors. Entries that do not decode are skipped.
    pub(crate) fn load(&self) -> Vec<ModelDescriptor> {
        let entries: Vec<Value> = read_json(&self.path).unwrap_or_default();

        let models: Vec<ModelDescriptor> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(model) => Some(model),
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "skipping undecodable custom model");
                    None
                }
            })
            .collect();

        debug!(path = %self.path.display(), count = models.len(), "loaded custom models");

        models
    }

    /// Appends `model`. Stored entries are kept as they are, including the ones `load`
    /// skips, and a file that cannot be read or is not a list is left untouched.
    pub(crate) fn append(&self, model: ModelDescriptor) -> Result<(), Error> {
        let mut entries: Vec<Value> = try_read_json(&self.path)?.unwrap_or_default();

        info!(provider = %model.provider, model = %model.id, "adding custom model");

        entries.push(serde_json::to_value(&model)?);

        write_json(&self.path, &entries)
    }
}
