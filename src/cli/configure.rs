use nu_ansi_term::{AnsiGenericString, Style};

use super::format_output;
use super::table::Table;
use crate::catalog::ModelDescriptor;
use crate::color::{self, MaybePaint};
use crate::providers::ErrorKind;
use crate::registry::AuthState;
use crate::service::{ConfigService, Error};
use crate::state::SystemState;
use crate::utils::errors::with_sources;
use crate::{die, warning};
use crate::{ActivateArgs, AddModelArgs, ListingFormat, SetupArgs, StatusArgs, UpdateArgs};

fn optional(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

impl From<SystemState> for Table {
    fn from(value: SystemState) -> Self {
        let mut tab = Table::with_header(vec!["FIELD", "VALUE"]);

        tab.add_row(vec!["configured".to_string(), value.configured.to_string()]);
        tab.add_row(vec!["provider".to_string(), optional(&value.provider)]);
        tab.add_row(vec!["model".to_string(), optional(&value.model)]);
        tab.add_row(vec!["display_name".to_string(), optional(&value.display_name)]);
        tab.add_row(vec![
            "api_key_present".to_string(),
            value.api_key_present.to_string(),
        ]);
        tab.add_row(vec!["auth_ok".to_string(), value.auth_ok.to_string()]);

        tab
    }
}

/// A hint on how to get out of a failure, if there is an obvious one.
fn remedy(err: &Error) -> Option<&'static str> {
    match err {
        Error::NotConfigured | Error::ActiveModelNotFound => {
            Some("run `modelgate setup <provider> <model> --api-key <key>` first")
        }
        Error::ModelMismatch { .. } | Error::ModelNotFound(_) => {
            Some("`modelgate list entries` shows the configured models")
        }
        _ => match err.dispatch_kind() {
            Some(ErrorKind::MissingCredential | ErrorKind::InvalidCredential) => {
                Some("set a new key with `modelgate update --api-key <key>`")
            }
            _ => None,
        },
    }
}

pub(crate) fn die_with(context: &str, err: Error) -> ! {
    if let Some(remedy) = remedy(&err) {
        warning!("{}", remedy);
    }

    die!("{}: {}", context, with_sources(&err))
}

fn print_auth(status: &SystemState) {
    let label: AnsiGenericString<'_, str> = match status.auth_ok {
        AuthState::Valid => color::AUTH_OK.maybe_paint("ok"),
        AuthState::Invalid => color::AUTH_FAILED.maybe_paint("failed"),
        AuthState::Unknown => Style::new().maybe_paint("unknown"),
    };

    match &status.display_name {
        Some(name) => println!("{}: {}", name, label),
        None => println!("{}", label),
    }
}

pub(crate) fn status_cmd(service: &ConfigService, args: &StatusArgs) {
    format_output(service.status(), args.format);
}

pub(crate) async fn setup_cmd(service: &ConfigService, args: &SetupArgs) {
    let status = match service
        .setup(&args.provider, &args.model, args.api_key.clone())
        .await
    {
        Ok(status) => status,
        Err(err) => die_with("setup failed", err),
    };

    if !status.api_key_present {
        warning!("no API key was given, requests to the provider will be rejected");
    }

    format_output(status, ListingFormat::Table);
}

pub(crate) async fn update_cmd(service: &ConfigService, args: &UpdateArgs) {
    if args.model.is_none() && args.api_key.is_none() {
        die!("nothing to update, pass --model or --api-key");
    }

    let status = match service.update(args.model.clone(), args.api_key.clone()).await {
        Ok(status) => status,
        Err(err) => die_with("update failed", err),
    };

    if !args.verify {
        format_output(status, ListingFormat::Table);
        return;
    }

    // The update stays applied even if the verification fails
    match service.verify().await {
        Ok(status) => print_auth(&status),
        Err(err) => die_with("the update was applied but verification failed", err),
    }
}

pub(crate) async fn verify_cmd(service: &ConfigService) {
    match service.verify().await {
        Ok(status) => print_auth(&status),
        Err(err) => die_with("verification failed", err),
    }
}

pub(crate) async fn reset_cmd(service: &ConfigService) {
    if let Err(err) = service.reset().await {
        die_with("reset failed", err);
    }
}

pub(crate) async fn activate_cmd(service: &ConfigService, args: &ActivateArgs) {
    match service.activate(&args.id).await {
        Ok(status) => format_output(status, ListingFormat::Table),
        Err(err) => die_with("failed to activate the model", err),
    }
}

pub(crate) fn add_model_cmd(service: &ConfigService, args: &AddModelArgs) {
    let model = ModelDescriptor {
        provider: args.provider.clone(),
        id: args.id.clone(),
        name: args.name.clone(),
        base_url: args.base_url.clone(),
    };

    if let Err(err) = service.add_model(model) {
        die_with("failed to add the model", err);
    }
}
