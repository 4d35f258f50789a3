use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{read_json, remove_file, write_json, Error};

/// The undecoded configuration record: the top-level JSON object.
pub(crate) type RawRecord = serde_json::Map<String, Value>;

/// Single-record, single-file store for the configuration record.
#[derive(Debug, Clone)]
pub(crate) struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub(crate) fn new<P: Into<PathBuf>>(path: P) -> ConfigStore {
        ConfigStore { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored record, or `None` if nothing usable has been saved.
    pub(crate) fn load(&self) -> Option<RawRecord> {
        match read_json::<Value>(&self.path)? {
            Value::Object(record) => Some(record),
            _ => {
                warn!(path = %self.path.display(), "configuration record is not a JSON object, treating it as absent");
                None
            }
        }
    }

    /// Overwrites the record.
    pub(crate) fn save(&self, record: &RawRecord) -> Result<(), Error> {
        debug!(path = %self.path.display(), "saving configuration record");

        write_json(&self.path, record)
    }

    /// Removes the record. Removing an absent record is not an error.
    pub(crate) fn delete(&self) -> Result<(), Error> {
        debug!(path = %self.path.display(), "deleting configuration record");

        remove_file(&self.path)
    }

    /// Shallow-merges `fields` into the top level of the stored record.
    ///
    /// Nested values are replaced wholesale. In particular, patching `models` through here
    /// discards every entry not present in the patch; registry mutations must go through
    /// the registry instead.
    pub(crate) fn patch(&self, fields: RawRecord) -> Result<RawRecord, Error> {
        let mut record = self.load().ok_or(Error::NotInitialized)?;

        record.extend(fields);

        self.save(&record)?;

        Ok(record)
    }
}
