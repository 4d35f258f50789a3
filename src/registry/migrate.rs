//! Upgrades stored records to the registry shape.

use tracing::{info, warn};

use super::record::{Registry, StoredRecord};
use crate::store::{self, ConfigStore, RawRecord};

/// Normalizes `raw` into a [`Registry`], persisting the upgrade when one was needed.
///
/// - A registry is returned as is and nothing is written.
/// - A legacy record becomes a single-entry registry under a fresh id, with that entry active.
///   A legacy record without a provider or a model becomes an empty registry.
/// - A record carrying neither shape becomes an empty registry.
/// - A corrupt record reads as an empty registry but is left on disk untouched.
///
/// Because the upgraded record carries the registry fields, a second run is a no-op.
pub(crate) fn ensure_registry(store: &ConfigStore, raw: RawRecord) -> Result<Registry, store::Error> {
    let registry = match StoredRecord::decode(&raw) {
        StoredRecord::Registry(registry) => return Ok(registry),
        StoredRecord::Corrupt => {
            warn!(path = %store.path().display(), "ignoring corrupt configuration record");
            return Ok(Registry::empty());
        }
        StoredRecord::Legacy(legacy) => match legacy.into_entry() {
            Some(entry) => {
                info!(provider = %entry.provider, model = %entry.model, "migrating legacy configuration record");
                Registry::single(entry)
            }
            None => {
                info!("legacy configuration record has no usable entry, migrating to an empty registry");
                Registry::empty()
            }
        },
        StoredRecord::Unrecognized => {
            info!("unrecognized configuration record, migrating to an empty registry");
            Registry::empty()
        }
    };

    store.save(&registry.to_raw()?)?;

    Ok(registry)
}
