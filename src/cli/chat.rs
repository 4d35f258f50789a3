mod prompt;
mod repl;

use std::io::{self, IsTerminal, Read};

use self::repl::{Input, Repl};
use super::configure::die_with;
use crate::service::{ConfigService, Error};
use crate::utils::errors::with_sources;
use crate::{die, report, ChatArgs};
use prompt::model_prompt;

/// Resolves the registry id to chat with: the one given on the command line, or the active one.
fn resolve_model_id(service: &ConfigService, requested: Option<&str>) -> String {
    if let Some(id) = requested {
        return id.to_string();
    }

    match service.active_id() {
        Ok(Some(id)) => id,
        Ok(None) => die_with("cannot start a chat", Error::NotConfigured),
        Err(err) => die_with("cannot start a chat", err),
    }
}

pub(crate) async fn chat_cmd(service: &ConfigService, args: &ChatArgs) {
    let in_terminal = io::stdin().is_terminal();
    let out_terminal = io::stdout().is_terminal();

    // Without a prompt argument, chat interactively only when attached to a terminal.
    let interactive = if args.prompt.is_some() {
        args.interactive
    } else {
        in_terminal && out_terminal
    };

    if args.prompt.is_some() && !in_terminal {
        die!("it appears that a prompt is being provided both through standard input and the prompt argument");
    }

    let initial_prompt = if let Some(prompt) = &args.prompt {
        Some(prompt.clone())
    } else if !in_terminal {
        let mut buf = String::new();

        if let Err(err) = io::stdin().read_to_string(&mut buf) {
            die!("failed to read the prompt from standard input: {}", err);
        }

        Some(buf)
    } else {
        None
    };

    let model_id = resolve_model_id(service, args.model_id.as_deref());

    if !interactive {
        let prompt = initial_prompt.unwrap_or_default();

        match service.chat(&model_id, &prompt).await {
            Ok(reply) => println!("{}", reply),
            Err(err) => die_with("chat failed", err),
        }

        return;
    }

    let label = service
        .status()
        .display_name
        .unwrap_or_else(|| model_id.clone());

    let mut repl = Repl::new();
    let mut pending = initial_prompt;

    loop {
        let message = match pending.take() {
            Some(message) => message,
            None => match repl.read() {
                Input::Message(message) => message,
                Input::Status => {
                    println!("{}", service.status().auth_ok);
                    continue;
                }
                Input::Exit => break,
            },
        };

        match service.chat(&model_id, &message).await {
            Ok(reply) => println!("{}{}\n", model_prompt(&label), reply),
            Err(err) => {
                report!("{}", with_sources(&err));

                // Nothing else can succeed once the model is no longer the active one
                if matches!(err, Error::ModelMismatch { .. } | Error::NotConfigured) {
                    break;
                }
            }
        }
    }
}
