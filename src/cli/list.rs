use serde::Serialize;

use super::format_output;
use super::table::Table;
use crate::catalog::{ModelDescriptor, ProviderInfo};
use crate::service::{ConfigService, EntrySummary};
use crate::utils::errors::with_sources;
use crate::{die, ListArgs, ListObject};

#[derive(Serialize)]
struct Providers(Vec<ProviderInfo>);

impl From<Providers> for Table {
    fn from(value: Providers) -> Self {
        let mut tab = Table::with_header(vec!["PROVIDER", "NAME"]);

        for provider in value.0 {
            tab.add_row(vec![provider.id.to_string(), provider.name.to_string()]);
        }

        tab
    }
}

#[derive(Serialize)]
struct Models(Vec<ModelDescriptor>);

impl From<Models> for Table {
    fn from(value: Models) -> Self {
        let mut tab = Table::with_header(vec!["MODEL", "NAME", "BASE_URL"]);

        for model in value.0 {
            tab.add_row(vec![model.id, model.name, model.base_url.unwrap_or_default()]);
        }

        tab
    }
}

#[derive(Serialize)]
struct Entries(Vec<EntrySummary>);

impl From<Entries> for Table {
    fn from(value: Entries) -> Self {
        let mut tab = Table::with_header(vec!["ACTIVE", "ID", "PROVIDER", "MODEL", "KEY", "AUTH"]);

        for entry in value.0 {
            tab.add_row(vec![
                if entry.active { "*" } else { "" }.to_string(),
                entry.id,
                entry.provider,
                entry.model,
                if entry.api_key_present { "set" } else { "unset" }.to_string(),
                entry.auth_ok.to_string(),
            ]);
        }

        tab
    }
}

pub(crate) fn list_cmd(service: &ConfigService, args: &ListArgs) {
    let format = args.format;

    match &args.object {
        ListObject::Providers => {
            format_output(Providers(service.providers().to_vec()), format);
        }
        ListObject::Models(args) => match service.models(&args.provider) {
            Ok(models) => format_output(Models(models), format),
            Err(err) => die!("failed to list models: {}", with_sources(&err)),
        },
        ListObject::Entries => match service.entries() {
            Ok(entries) => format_output(Entries(entries), format),
            Err(err) => die!("failed to list entries: {}", with_sources(&err)),
        },
    }
}
