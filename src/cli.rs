use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::config::read_config;
use crate::providers::dispatch::Dispatcher;
use crate::registry::ModelRegistry;
use crate::service::ConfigService;
use crate::state::SharedState;
use crate::store::{ConfigStore, CustomModelStore};
use crate::utils::errors::with_sources;
use crate::{die, ListingFormat, RequestedColorMode};
use table::IntoTable;

pub(crate) mod chat;
pub(crate) mod configure;
pub(crate) mod list;
pub(crate) mod table;

#[derive(Clone, Copy, strum_macros::Display)]
pub(crate) enum ColorMode {
    On,
    Off,
}

impl ColorMode {
    /// Returns whether ANSI color should be used
    /// If the user has specified a preference, this is honored. This preference
    /// can be specified through the command line or the "NO_COLOR" environment
    /// variable If the user hasn't stated a preference, color is enabled if the
    /// output is a terminal.
    pub(crate) fn resolve_auto(cm: RequestedColorMode) -> ColorMode {
        match cm {
            RequestedColorMode::Auto => {
                let disable_color =
                    std::env::var_os("NO_COLOR").is_some() || !io::stdout().is_terminal();

                if disable_color {
                    ColorMode::Off
                } else {
                    ColorMode::On
                }
            }
            RequestedColorMode::On => ColorMode::On,
            RequestedColorMode::Off => ColorMode::Off,
        }
    }
}

/// Reads the settings and wires the stores, the dispatcher, and the projection into a service.
pub(crate) fn open_service(config_path: Option<PathBuf>) -> ConfigService {
    let config = match read_config(config_path) {
        Ok(config) => config,
        Err(err) => die!("{}", with_sources(&err)),
    };

    let dispatcher = match Dispatcher::from_settings(&config) {
        Ok(dispatcher) => dispatcher,
        Err(err) => die!("invalid provider settings: {}", with_sources(&err)),
    };

    let registry = ModelRegistry::new(ConfigStore::new(config.record_path()));
    let catalog = Catalog::new(CustomModelStore::new(config.models_path()));

    match ConfigService::start(registry, catalog, dispatcher, Arc::new(SharedState::new())) {
        Ok(service) => service,
        Err(err) => die!("failed to load the configuration: {}", with_sources(&err)),
    }
}

pub(crate) fn format_output<O: IntoTable + Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => match serde_json::to_string_pretty(&object) {
            Ok(output) => println!("{}", output),
            Err(err) => die!("failed to serialize output: {}", err),
        },
        ListingFormat::Table => {
            let tab = object.into_table();

            print!("{}", tab);
        }
        ListingFormat::HeaderlessTable => {
            let mut tab = object.into_table();

            tab.print_header(false);

            print!("{}", tab);
        }
    }
}
