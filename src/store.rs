//! Durable persistence for the model configuration.
//!
//! Two files back the configuration: the configuration record, a single JSON object holding
//! either the model registry or the older single-model shape, and the list of user-added model
//! descriptors. The stores here know nothing about those shapes beyond "a JSON object" and
//! "a JSON array"; decoding happens one layer up, in the registry.
//!
//! Reads fail open: a missing, unreadable, or corrupt file is reported as absent. Writes
//! propagate every failure and replace the target atomically (a sibling temporary file is
//! written and then renamed over the target). A write that has to merge with the current
//! content of a file, such as appending a custom model, fails instead of replacing a file
//! it could not read.

mod custom_models;
mod record;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error as StdError;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub(crate) use custom_models::CustomModelStore;
pub(crate) use record::{ConfigStore, RawRecord};

#[derive(Error, Debug)]
pub(crate) enum Error {
    /// A patch was requested before any record was saved
    #[error("the configuration record has not been initialized")]
    NotInitialized,
    #[error("failed to read \"{}\"", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("\"{}\" does not hold a valid document", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write \"{}\"", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove \"{}\"", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize the record")]
    Serialize(#[from] serde_json::Error),
}

/// Reads and decodes a JSON document. `None` when the file does not exist.
fn try_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, Error> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| Error::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads and decodes a JSON document. Anything other than a successfully decoded
/// document is treated as absent.
fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match try_read_json(path) {
        Ok(value) => value,
        Err(err) => {
            let cause = StdError::source(&err)
                .map(ToString::to_string)
                .unwrap_or_default();

            warn!(error = %err, %cause, "unusable store file, treating it as absent");
            None
        }
    }
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");

    PathBuf::from(tmp)
}

/// Serializes `value` and atomically replaces `path` with it.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');

    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let tmp = temporary_sibling(path);

    fs::write(&tmp, &bytes).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(write_err)?;

    Ok(())
}

fn remove_file(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}
